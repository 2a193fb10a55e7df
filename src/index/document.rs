//! 行 → テキスト文書への変換

use serde::{Deserialize, Serialize};

use crate::table::TableRecord;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub headers: Vec<String>,
}

/// 1行分を "ヘッダー: 値" の行で連結したテキスト
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub page_content: String,
    pub metadata: DocumentMetadata,
}

pub fn documents_from_table(record: &TableRecord) -> Vec<Document> {
    record
        .rows()
        .iter()
        .map(|row| Document {
            page_content: record
                .entries(row)
                .map(|(header, value)| format!("{}: {}", header, value))
                .collect::<Vec<_>>()
                .join("\n"),
            metadata: DocumentMetadata {
                headers: record.headers().to_vec(),
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_document_per_row() {
        let record = TableRecord::new(
            vec!["Name".into(), "Price".into()],
            vec![vec!["Apple".into(), "100".into()], vec!["Lemon".into()]],
        )
        .unwrap();

        let docs = documents_from_table(&record);
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].page_content, "Name: Apple\nPrice: 100");
        assert_eq!(docs[1].page_content, "Name: Lemon\nPrice: ");
        assert_eq!(docs[1].metadata.headers, vec!["Name", "Price"]);
    }

    #[test]
    fn test_empty_table_has_no_documents() {
        assert!(documents_from_table(&TableRecord::default()).is_empty());
    }
}
