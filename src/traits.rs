use async_trait::async_trait;

use crate::error::ScraperError;
use crate::table::TableRecord;

#[async_trait]
pub trait TableExtractor: Send + Sync {
    /// URLから最初のテーブルを抽出（テーブルが無ければ None）
    async fn extract(&self, url: &str) -> Result<Option<TableRecord>, ScraperError>;
}

#[async_trait]
pub trait RowSink: Send + Sync {
    /// 行を末尾に追記し、追記した行数を返す
    async fn append_rows(&self, rows: Vec<Vec<String>>) -> Result<usize, ScraperError>;
}

#[async_trait]
pub trait Embedder: Send + Sync {
    /// テキストごとの埋め込みベクトル（入力と同じ順序）
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ScraperError>;

    /// 単一テキスト
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ScraperError> {
        self.embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ScraperError::Embedding("埋め込み結果が空です".into()))
    }
}
