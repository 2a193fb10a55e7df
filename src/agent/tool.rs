//! エージェントから呼び出すツール

use async_trait::async_trait;
use tower::ServiceExt;
use tracing::info;

use crate::error::ScraperError;
use crate::service::{ScrapeRequest, ScraperService};

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// ツール入力（文字列）を受け取り、観測結果（文字列）を返す
    async fn call(&self, input: &str) -> Result<String, ScraperError>;
}

/// URLを受け取ってテーブルを抽出し、JSONで返すツール
#[derive(Clone)]
pub struct TableExtractionTool {
    service: ScraperService,
}

impl TableExtractionTool {
    pub const NAME: &'static str = "Table Extraction";
    const DESCRIPTION: &'static str =
        "Extracts table data from the provided URL using a headless browser. Input should be a URL.";

    pub fn new(service: ScraperService) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Tool for TableExtractionTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        Self::DESCRIPTION
    }

    async fn call(&self, input: &str) -> Result<String, ScraperError> {
        let url = input.trim().trim_matches(|c| c == '"' || c == '\'');
        info!("Table Extraction tool: {}", url);

        let result = self
            .service
            .clone()
            .oneshot(ScrapeRequest::new(url))
            .await?;
        Ok(serde_json::to_string(&result.record)?)
    }
}
