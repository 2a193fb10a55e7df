use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("ブラウザ初期化エラー: {0}")]
    BrowserInit(String),

    #[error("ナビゲーションエラー: {0}")]
    Navigation(String),

    #[error("タイムアウト: {0}")]
    Timeout(String),

    #[error("JavaScript実行エラー: {0}")]
    JavaScript(String),

    /// 抽出処理中の失敗をURL付きでラップしたもの
    #[error("テーブル抽出エラー ({url}): {source}")]
    Extraction {
        url: String,
        #[source]
        source: Box<ScraperError>,
    },

    #[error("不正なテーブルデータ: {0}")]
    InvalidRecord(String),

    #[error("スナップショットが壊れています ({path:?}): {source}")]
    CorruptSnapshot {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("JSONエラー: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSVエラー: {0}")]
    Csv(#[from] csv::Error),

    #[error("ファイル操作エラー: {0}")]
    FileIO(#[from] std::io::Error),

    #[error("HTTPエラー: {0}")]
    Http(#[from] reqwest::Error),

    #[error("認証エラー: {0}")]
    Auth(String),

    #[error("スプレッドシートエラー: {0}")]
    Sheets(String),

    #[error("埋め込みエラー: {0}")]
    Embedding(String),

    #[error("エージェントエラー: {0}")]
    Agent(String),

    #[error("設定エラー: {0}")]
    Config(String),
}

impl ScraperError {
    /// 抽出エラーとしてURLを付与する（二重ラップはしない）
    pub fn for_url(self, url: &str) -> Self {
        match self {
            e @ ScraperError::Extraction { .. } => e,
            e => ScraperError::Extraction {
                url: url.to_string(),
                source: Box::new(e),
            },
        }
    }

    /// タイムアウト起因かどうか（ラップされていても判定する）
    pub fn is_timeout(&self) -> bool {
        match self {
            ScraperError::Timeout(_) => true,
            ScraperError::Extraction { source, .. } => source.is_timeout(),
            _ => false,
        }
    }
}
