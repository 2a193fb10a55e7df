//! インデックスモジュール
//!
//! テーブルの各行を文書化し、埋め込みベクトルでメモリ上に索引する。
//! 永続化や差分更新は行わず、変化があるたびに作り直す。

mod document;
mod store;

pub use document::{documents_from_table, Document, DocumentMetadata};
pub use store::{ScoredDocument, VectorIndex};

use async_trait::async_trait;

use crate::config::OpenAiConfig;
use crate::error::ScraperError;
use crate::openai::OpenAiClient;
use crate::traits::Embedder;

/// OpenAI の embeddings API を使う Embedder
#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    client: OpenAiClient,
}

impl OpenAiEmbedder {
    pub fn new(config: OpenAiConfig) -> Self {
        Self {
            client: OpenAiClient::new(config),
        }
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ScraperError> {
        self.client.embeddings(texts).await
    }
}
