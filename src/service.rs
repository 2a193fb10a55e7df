use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tower::Service;
use tracing::info;

use crate::error::ScraperError;
use crate::table::TableRecord;
use crate::traits::TableExtractor;

/// テーブル抽出リクエスト
#[derive(Debug, Clone)]
pub struct ScrapeRequest {
    pub url: String,
}

impl ScrapeRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// テーブル抽出結果（テーブルが無ければ record は None）
#[derive(Debug, Clone)]
pub struct ScrapeResult {
    pub url: String,
    pub record: Option<TableRecord>,
}

/// tower::Serviceを実装したテーブル抽出サービス
#[derive(Clone)]
pub struct ScraperService {
    extractor: Arc<dyn TableExtractor>,
}

impl ScraperService {
    pub fn new(extractor: Arc<dyn TableExtractor>) -> Self {
        Self { extractor }
    }
}

impl Service<ScrapeRequest> for ScraperService {
    type Response = ScrapeResult;
    type Error = ScraperError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ScrapeRequest) -> Self::Future {
        info!("抽出リクエスト受信: url={}", req.url);
        let extractor = Arc::clone(&self.extractor);

        Box::pin(async move {
            let record = extractor.extract(&req.url).await?;

            info!(
                "抽出完了: url={}, rows={}",
                req.url,
                record.as_ref().map(TableRecord::len).unwrap_or(0)
            );

            Ok(ScrapeResult {
                url: req.url,
                record,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tower::ServiceExt;

    struct FixedExtractor;

    #[async_trait]
    impl TableExtractor for FixedExtractor {
        async fn extract(&self, url: &str) -> Result<Option<TableRecord>, ScraperError> {
            if url.ends_with("/empty") {
                return Ok(None);
            }
            Ok(Some(TableRecord::new(
                vec!["url".into()],
                vec![vec![url.to_string()]],
            )?))
        }
    }

    #[test]
    fn test_scrape_request_new() {
        let req = ScrapeRequest::new("https://example.com/table");
        assert_eq!(req.url, "https://example.com/table");
    }

    #[tokio::test]
    async fn test_service_returns_record() {
        let service = ScraperService::new(Arc::new(FixedExtractor));
        let result = service
            .oneshot(ScrapeRequest::new("https://example.com/a"))
            .await
            .unwrap();

        assert_eq!(result.url, "https://example.com/a");
        let record = result.record.unwrap();
        assert_eq!(record.cell(0, "url"), Some("https://example.com/a"));
    }

    #[tokio::test]
    async fn test_service_passes_through_missing_table() {
        let service = ScraperService::new(Arc::new(FixedExtractor));
        let result = service
            .oneshot(ScrapeRequest::new("https://example.com/empty"))
            .await
            .unwrap();
        assert!(result.record.is_none());
    }
}
