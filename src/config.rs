use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ScraperError;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// ページ準備完了とみなす条件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitUntil {
    /// ナビゲーション応答を受け取った時点
    Commit,
    /// DOMContentLoaded
    DomContentLoaded,
    /// load イベント
    Load,
    /// ネットワークが一定時間アイドル
    #[default]
    NetworkIdle,
}

impl FromStr for WaitUntil {
    type Err = ScraperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "commit" => Ok(WaitUntil::Commit),
            "domcontentloaded" => Ok(WaitUntil::DomContentLoaded),
            "load" => Ok(WaitUntil::Load),
            "networkidle" => Ok(WaitUntil::NetworkIdle),
            other => Err(ScraperError::Config(format!(
                "wait_until には commit / domcontentloaded / load / networkidle を指定してください: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for WaitUntil {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WaitUntil::Commit => "commit",
            WaitUntil::DomContentLoaded => "domcontentloaded",
            WaitUntil::Load => "load",
            WaitUntil::NetworkIdle => "networkidle",
        };
        f.write_str(s)
    }
}

/// OpenAI互換APIの接続設定（埋め込み・エージェント用）
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub embedding_model: String,
    pub completion_model: String,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: OPENAI_BASE_URL.to_string(),
            embedding_model: "text-embedding-ada-002".to_string(),
            completion_model: "gpt-3.5-turbo-instruct".to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[derive(Debug, Clone)]
pub struct ScraperConfig {
    pub snapshot_path: PathBuf,
    pub csv_path: PathBuf,
    pub spreadsheet_name: String,
    pub credentials_path: PathBuf,
    pub timeout: Duration,
    pub wait_until: WaitUntil,
    pub selector: String,
    pub headless: bool,
    /// Chrome 実行ファイル（未指定なら CHROME_PATH / CHROMIUM_PATH）
    pub chrome_path: Option<PathBuf>,
    pub debug: bool,
    pub openai: Option<OpenAiConfig>,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from("table_data.json"),
            csv_path: PathBuf::from("table_data.csv"),
            spreadsheet_name: "LangChain".to_string(),
            credentials_path: PathBuf::from("credentials.json"),
            timeout: Duration::from_millis(60_000),
            wait_until: WaitUntil::NetworkIdle,
            selector: "table".to_string(),
            headless: true,
            chrome_path: None,
            debug: false,
            openai: None,
        }
    }
}

impl ScraperConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = path.into();
        self
    }

    pub fn with_csv_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.csv_path = path.into();
        self
    }

    pub fn with_spreadsheet_name(mut self, name: impl Into<String>) -> Self {
        self.spreadsheet_name = name.into();
        self
    }

    pub fn with_credentials_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials_path = path.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_wait_until(mut self, wait_until: WaitUntil) -> Self {
        self.wait_until = wait_until;
        self
    }

    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = selector.into();
        self
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn with_chrome_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.chrome_path = Some(path.into());
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_openai(mut self, openai: OpenAiConfig) -> Self {
        self.openai = Some(openai);
        self
    }
}
