//! HTMLテーブルスクレイパーライブラリ
//!
//! - ページ内の最初の `<table>` をヘッドレスブラウザで抽出
//! - 前回のスナップショット (JSON) と比較し、変化があれば保存
//! - CSV / Google Sheets へ出力
//! - 行ごとの埋め込みでベクトルインデックスを構築
//! - ReAct エージェントから「Table Extraction」ツールとして呼び出し
//!
//! # 使用例
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use table_scraper::{BrowserExtractor, Pipeline, ScraperConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ScraperConfig::new()
//!         .with_snapshot_path("./table_data.json")
//!         .with_headless(true);
//!
//!     let extractor = Arc::new(BrowserExtractor::new(config.clone()));
//!     let pipeline = Pipeline::new(&config, extractor);
//!
//!     let report = pipeline.run("https://example.com/prices").await.unwrap();
//!     println!("changed: {}", report.changed);
//! }
//! ```
//!
//! # tower::Service として使う
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use table_scraper::{HttpExtractor, ScrapeRequest, ScraperConfig, ScraperService};
//! use tower::ServiceExt;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ScraperConfig::new();
//!     let service = ScraperService::new(Arc::new(HttpExtractor::new(&config).unwrap()));
//!
//!     let result = service.oneshot(ScrapeRequest::new("https://example.com")).await.unwrap();
//!     println!("{:?}", result.record);
//! }
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod export;
pub mod extract;
pub mod index;
pub mod openai;
pub mod pipeline;
pub mod service;
pub mod snapshot;
pub mod table;
pub mod traits;

// 主要な型をリエクスポート
pub use config::{OpenAiConfig, ScraperConfig, WaitUntil};
pub use error::ScraperError;
pub use extract::{BrowserExtractor, HttpExtractor};
pub use pipeline::{Pipeline, RunReport};
pub use service::{ScrapeRequest, ScrapeResult, ScraperService};
pub use snapshot::SnapshotStore;
pub use table::{Row, TableRecord};
pub use traits::{Embedder, RowSink, TableExtractor};

// エージェント・インデックス関連
pub use agent::{Agent, AgentOutcome, LanguageModel, OpenAiCompletion};
pub use export::SheetsClient;
pub use index::{Document, OpenAiEmbedder, VectorIndex};
