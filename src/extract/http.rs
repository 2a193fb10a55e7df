//! ブラウザを使わない静的HTML取得によるテーブル抽出

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::table::{parse_first_table, TableRecord};
use crate::traits::TableExtractor;

/// サーバー側でテーブルが描画されるページ向けの抽出器
#[derive(Debug, Clone)]
pub struct HttpExtractor {
    client: Client,
}

impl HttpExtractor {
    pub fn new(config: &ScraperConfig) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("table-scraper/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    async fn fetch(&self, url: &str) -> Result<String, ScraperError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                ScraperError::Timeout(e.to_string())
            } else {
                ScraperError::Navigation(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScraperError::Navigation(format!("HTTP {}", status)));
        }

        let body = response.text().await?;
        debug!("取得完了: {} ({}bytes)", url, body.len());
        Ok(body)
    }

    async fn extract_from(&self, url: &str) -> Result<Option<TableRecord>, ScraperError> {
        let html = self.fetch(url).await?;
        match parse_first_table(&html)? {
            Some(raw) => raw.into_record().map(Some),
            None => {
                warn!("テーブル要素が見つかりません: {}", url);
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl TableExtractor for HttpExtractor {
    async fn extract(&self, url: &str) -> Result<Option<TableRecord>, ScraperError> {
        info!("テーブル抽出開始 (static): {}", url);

        self.extract_from(url).await.map_err(|e| e.for_url(url))
    }
}
