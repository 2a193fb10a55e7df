//! メモリ上の類似度インデックス（全件走査のコサイン類似度）

use tracing::info;

use crate::error::ScraperError;
use crate::traits::Embedder;

use super::document::Document;

/// 検索結果
#[derive(Debug, Clone)]
pub struct ScoredDocument {
    pub document: Document,
    pub score: f32,
}

#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    documents: Vec<Document>,
    vectors: Vec<Vec<f32>>,
    norms: Vec<f32>,
}

impl VectorIndex {
    /// 文書を埋め込んでインデックスを作り直す
    pub async fn from_documents(
        documents: Vec<Document>,
        embedder: &dyn Embedder,
    ) -> Result<Self, ScraperError> {
        let texts: Vec<String> = documents.iter().map(|d| d.page_content.clone()).collect();
        let vectors = if texts.is_empty() {
            Vec::new()
        } else {
            embedder.embed(&texts).await?
        };

        let index = Self::from_vectors(documents, vectors)?;
        info!("インデックス作成完了: {}件", index.len());
        Ok(index)
    }

    /// 埋め込み済みベクトルから構築
    pub fn from_vectors(
        documents: Vec<Document>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<Self, ScraperError> {
        if documents.len() != vectors.len() {
            return Err(ScraperError::Embedding(format!(
                "文書数({})とベクトル数({})が一致しません",
                documents.len(),
                vectors.len()
            )));
        }
        if let Some(dim) = vectors.first().map(Vec::len) {
            if vectors.iter().any(|v| v.len() != dim) {
                return Err(ScraperError::Embedding("ベクトルの次元が揃っていません".into()));
            }
        }

        let norms = vectors.iter().map(|v| norm(v)).collect();
        Ok(Self {
            documents,
            vectors,
            norms,
        })
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// 類似度の高い順に最大 k 件
    pub fn search_by_vector(&self, query: &[f32], k: usize) -> Vec<ScoredDocument> {
        let query_norm = norm(query);
        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .zip(self.norms.iter())
            .enumerate()
            .map(|(i, (v, n))| (i, cosine(query, query_norm, v, *n)))
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored
            .into_iter()
            .take(k)
            .map(|(i, score)| ScoredDocument {
                document: self.documents[i].clone(),
                score,
            })
            .collect()
    }

    pub async fn similarity_search(
        &self,
        query: &str,
        k: usize,
        embedder: &dyn Embedder,
    ) -> Result<Vec<ScoredDocument>, ScraperError> {
        let vector = embedder.embed_query(query).await?;
        Ok(self.search_by_vector(&vector, k))
    }
}

fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

fn cosine(a: &[f32], norm_a: f32, b: &[f32], norm_b: f32) -> f32 {
    if norm_a == 0.0 || norm_b == 0.0 || a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::document::DocumentMetadata;
    use async_trait::async_trait;

    fn doc(text: &str) -> Document {
        Document {
            page_content: text.to_string(),
            metadata: DocumentMetadata { headers: vec![] },
        }
    }

    /// 文字 a/b/c の出現数を次元にする埋め込み
    struct LetterEmbedder;

    #[async_trait]
    impl Embedder for LetterEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ScraperError> {
            Ok(texts
                .iter()
                .map(|t| {
                    ['a', 'b', 'c']
                        .iter()
                        .map(|ch| t.chars().filter(|x| x == ch).count() as f32)
                        .collect()
                })
                .collect())
        }
    }

    #[test]
    fn test_search_by_vector_orders_by_cosine() {
        let index = VectorIndex::from_vectors(
            vec![doc("x"), doc("y"), doc("z")],
            vec![vec![1.0, 0.0], vec![0.7, 0.7], vec![0.0, 1.0]],
        )
        .unwrap();

        let hits = index.search_by_vector(&[0.0, 2.0], 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].document.page_content, "z");
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert_eq!(hits[1].document.page_content, "y");
    }

    #[test]
    fn test_mismatched_lengths_are_rejected() {
        assert!(VectorIndex::from_vectors(vec![doc("x")], vec![]).is_err());
        assert!(VectorIndex::from_vectors(
            vec![doc("x"), doc("y")],
            vec![vec![1.0], vec![1.0, 2.0]]
        )
        .is_err());
    }

    #[tokio::test]
    async fn test_similarity_search_with_embedder() {
        let index = VectorIndex::from_documents(
            vec![doc("aaa"), doc("bbb"), doc("ccc")],
            &LetterEmbedder,
        )
        .await
        .unwrap();

        let hits = index.similarity_search("bb", 1, &LetterEmbedder).await.unwrap();
        assert_eq!(hits[0].document.page_content, "bbb");
    }

    #[tokio::test]
    async fn test_empty_documents_skip_embedding() {
        let index = VectorIndex::from_documents(Vec::new(), &LetterEmbedder)
            .await
            .unwrap();
        assert!(index.is_empty());
        assert!(index.search_by_vector(&[1.0, 0.0, 0.0], 3).is_empty());
    }
}
