//! ヘッドレスブラウザによるテーブル抽出
//!
//! 呼び出しごとに専用のブラウザ（一時プロファイル）を起動し、終了時に必ず閉じる。

use std::path::PathBuf;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::{ScraperConfig, WaitUntil};
use crate::error::ScraperError;
use crate::table::{RawTable, TableRecord};
use crate::traits::TableExtractor;

/// readyState / セレクタ確認のポーリング間隔（ミリ秒）
const POLL_INTERVAL_MS: u64 = 100;
/// ネットワークアイドル判定のインターバル（ミリ秒）
const NETWORK_IDLE_CHECK_INTERVAL_MS: u64 = 500;
/// 連続でアイドルと判定された回数がこれに達したら完了
const REQUIRED_IDLE_CHECKS: u32 = 3;

/// 最初のテーブルを RawTable 形式の JSON 文字列で返す（無ければ "null"）
const EXTRACT_TABLE_SCRIPT: &str = r#"
(function() {
    const table = document.querySelector('table');
    if (!table) return 'null';
    const cellsOf = (tr) => Array.from(tr.querySelectorAll('td, th')).map(cell => cell.innerText.trim());
    const thead = table.querySelector('thead');
    const explicitHeaders = thead
        ? Array.from(thead.querySelectorAll('tr')).flatMap(cellsOf)
        : null;
    const tbody = table.querySelector('tbody');
    const tableRows = tbody ? tbody.querySelectorAll('tr') : table.querySelectorAll('tr');
    return JSON.stringify({
        explicit_headers: explicitHeaders,
        rows: Array.from(tableRows).map(cellsOf)
    });
})()
"#;

const NETWORK_IDLE_SCRIPT: &str = r#"
(() => {
    // 直近500ms以内に開始され、まだ完了していないリクエストがあるか
    const entries = performance.getEntriesByType('resource');
    const now = performance.now();
    const recentRequests = entries.filter(e => (now - e.startTime) < 500 && e.duration === 0);
    return recentRequests.length === 0;
})()
"#;

/// 起動済みブラウザ一式（ブラウザ・イベントハンドラ・一時プロファイル）
struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
    _profile: TempDir,
}

impl BrowserSession {
    async fn launch(config: &ScraperConfig) -> Result<Self, ScraperError> {
        info!("ブラウザを初期化中...");

        // セッションを共有しないよう毎回ユニークなユーザーデータディレクトリを使う
        let profile = tempfile::Builder::new()
            .prefix("table-scraper-")
            .tempdir()?;

        let mut builder = BrowserConfig::builder()
            .user_data_dir(profile.path())
            .window_size(1280, 800)
            .no_sandbox()
            .request_timeout(config.timeout)
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu");

        if let Some(chrome_path) = chrome_executable(config) {
            builder = builder.chrome_executable(chrome_path);
        }

        if !config.headless {
            builder = builder.with_head();
        }

        if config.debug {
            builder = builder.arg("--enable-logging=stderr").arg("--v=1");
        }

        let browser_config = builder
            .build()
            .map_err(|e| ScraperError::BrowserInit(format!("ブラウザ設定エラー: {}", e)))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| ScraperError::BrowserInit(e.to_string()))?;

        // ブラウザイベントハンドラをバックグラウンドで実行
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                debug!("Browser event: {:?}", event);
            }
        });

        info!("ブラウザ初期化完了");
        Ok(Self {
            browser,
            handler,
            _profile: profile,
        })
    }

    async fn close(mut self) {
        info!("ブラウザを終了中...");
        if let Err(e) = self.browser.close().await {
            debug!("ブラウザのクローズに失敗: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            debug!("ブラウザプロセスの終了待機に失敗: {}", e);
        }
        self.handler.abort();
        info!("ブラウザ終了完了");
    }
}

fn chrome_executable(config: &ScraperConfig) -> Option<PathBuf> {
    config.chrome_path.clone().or_else(|| {
        std::env::var("CHROME_PATH")
            .or_else(|_| std::env::var("CHROMIUM_PATH"))
            .ok()
            .map(PathBuf::from)
    })
}

/// Chrome DevTools Protocol 経由でテーブルを抽出する
#[derive(Debug, Clone)]
pub struct BrowserExtractor {
    config: ScraperConfig,
}

impl BrowserExtractor {
    pub fn new(config: ScraperConfig) -> Self {
        Self { config }
    }

    async fn extract_with(
        &self,
        session: &BrowserSession,
        url: &str,
    ) -> Result<Option<TableRecord>, ScraperError> {
        let page = session
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| ScraperError::BrowserInit(e.to_string()))?;

        self.navigate(&page, url).await?;
        self.wait_for_selector(&page).await?;

        let raw = evaluate_table(&page).await?;
        match raw {
            Some(raw) => {
                let record = raw.into_record()?;
                info!(
                    "テーブル抽出完了: headers={}, rows={}",
                    record.headers().len(),
                    record.len()
                );
                Ok(Some(record))
            }
            None => {
                warn!("テーブル要素が見つかりません: {}", url);
                Ok(None)
            }
        }
    }

    /// URLへ遷移し wait_until の条件まで待つ（全体を timeout で制限）
    async fn navigate(&self, page: &Page, url: &str) -> Result<(), ScraperError> {
        let wait_until = self.config.wait_until;
        info!("ページに遷移中: {} (wait_until={})", url, wait_until);

        tokio::time::timeout(self.config.timeout, navigate_and_wait(page, url, wait_until))
            .await
            .map_err(|_| {
                ScraperError::Timeout(format!(
                    "ページが{}ms以内に{}になりませんでした",
                    self.config.timeout.as_millis(),
                    wait_until
                ))
            })?
    }

    /// セレクタに一致する要素が現れるまで待機
    async fn wait_for_selector(&self, page: &Page) -> Result<(), ScraperError> {
        let selector = &self.config.selector;
        let literal = serde_json::to_string(selector)?;
        let script = format!("document.querySelector({}) !== null", literal);
        let start = Instant::now();

        while start.elapsed() < self.config.timeout {
            match page.evaluate(script.as_str()).await {
                Ok(result) => {
                    if result.into_value::<bool>().unwrap_or(false) {
                        debug!("セレクタ検出: {} ({:?})", selector, start.elapsed());
                        return Ok(());
                    }
                }
                Err(e) => debug!("セレクタ確認エラー: {}", e),
            }
            sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
        }

        if self.config.debug {
            self.log_screenshot(page).await;
        }

        Err(ScraperError::Timeout(format!(
            "セレクタ '{}' が{}ms以内に見つかりませんでした",
            selector,
            self.config.timeout.as_millis()
        )))
    }

    async fn log_screenshot(&self, page: &Page) {
        match page
            .screenshot(ScreenshotParams::builder().full_page(true).build())
            .await
        {
            Ok(screenshot) => {
                use base64::Engine;
                let encoded = base64::engine::general_purpose::STANDARD.encode(&screenshot);
                debug!("Timeout screenshot: data:image/png;base64,{}", encoded);
            }
            Err(e) => debug!("スクリーンショット取得失敗: {}", e),
        }
    }
}

async fn navigate_and_wait(
    page: &Page,
    url: &str,
    wait_until: WaitUntil,
) -> Result<(), ScraperError> {
    let response = page
        .execute(NavigateParams::new(url))
        .await
        .map_err(|e| ScraperError::Navigation(e.to_string()))?;
    if let Some(error_text) = response.result.error_text.as_ref() {
        return Err(ScraperError::Navigation(error_text.clone()));
    }

    match wait_until {
        WaitUntil::Commit => Ok(()),
        WaitUntil::DomContentLoaded => wait_ready_state(page, &["interactive", "complete"]).await,
        WaitUntil::Load => wait_ready_state(page, &["complete"]).await,
        WaitUntil::NetworkIdle => {
            wait_ready_state(page, &["complete"]).await?;
            wait_network_idle(page).await
        }
    }
}

async fn wait_ready_state(page: &Page, accepted: &[&str]) -> Result<(), ScraperError> {
    loop {
        match page.evaluate("document.readyState").await {
            Ok(state) => {
                let state = state.into_value::<String>().unwrap_or_default();
                if accepted.contains(&state.as_str()) {
                    debug!("readyState={}", state);
                    return Ok(());
                }
            }
            // 遷移中はコンテキストが破棄されることがあるので再試行する
            Err(e) => debug!("readyState確認エラー: {}", e),
        }
        sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
    }
}

async fn wait_network_idle(page: &Page) -> Result<(), ScraperError> {
    let start = Instant::now();
    let mut idle_count = 0;

    loop {
        match page.evaluate(NETWORK_IDLE_SCRIPT).await {
            Ok(val) => {
                if val.into_value::<bool>().unwrap_or(false) {
                    idle_count += 1;
                    if idle_count >= REQUIRED_IDLE_CHECKS {
                        debug!(
                            "Network idle after {:?} ({} consecutive checks)",
                            start.elapsed(),
                            idle_count
                        );
                        return Ok(());
                    }
                } else {
                    idle_count = 0;
                }
            }
            Err(e) => {
                debug!("Network idle check error: {}", e);
                idle_count = 0;
            }
        }
        sleep(Duration::from_millis(NETWORK_IDLE_CHECK_INTERVAL_MS)).await;
    }
}

async fn evaluate_table(page: &Page) -> Result<Option<RawTable>, ScraperError> {
    let json: String = page
        .evaluate(EXTRACT_TABLE_SCRIPT)
        .await
        .map_err(|e| ScraperError::JavaScript(e.to_string()))?
        .into_value()
        .map_err(|e| ScraperError::JavaScript(e.to_string()))?;

    debug!("抽出スクリプト結果: {}bytes", json.len());
    Ok(serde_json::from_str(&json)?)
}

#[async_trait]
impl TableExtractor for BrowserExtractor {
    async fn extract(&self, url: &str) -> Result<Option<TableRecord>, ScraperError> {
        info!("テーブル抽出開始: {}", url);

        let session = BrowserSession::launch(&self.config)
            .await
            .map_err(|e| e.for_url(url))?;

        let result = self.extract_with(&session, url).await;

        // 成功・失敗どちらでもブラウザを解放する
        session.close().await;

        result.map_err(|e| e.for_url(url))
    }
}
