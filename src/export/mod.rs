//! 出力モジュール
//!
//! - スナップショットJSON → CSV
//! - Google Sheets への追記

mod csv_file;
mod sheets;

pub use csv_file::{export_snapshot_csv, write_csv};
pub use sheets::{ServiceAccountKey, SheetsClient, SCOPES};

use crate::table::TableRecord;

/// スプレッドシートに追記する行（ヘッダー行 + データ行、列はヘッダー順）
pub fn sheet_rows(record: &TableRecord) -> Vec<Vec<String>> {
    std::iter::once(record.headers().to_vec())
        .chain(record.rows().iter().map(|row| row.cells().to_vec()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sheet_rows_start_with_headers() {
        let record = TableRecord::new(
            vec!["row 1".into(), "row 2".into(), "extra".into()],
            vec![vec!["a".into(), "b".into(), "c".into()], vec!["d".into()]],
        )
        .unwrap();

        assert_eq!(
            sheet_rows(&record),
            vec![
                vec!["row 1".to_string(), "row 2".to_string(), "extra".to_string()],
                vec!["a".to_string(), "b".to_string(), "c".to_string()],
                vec!["d".to_string(), String::new(), String::new()],
            ]
        );
    }
}
