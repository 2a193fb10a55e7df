//! table-scraper CLI
//!
//! 実行方法:
//! ```
//! cargo run -- https://example.com/prices
//! RUST_LOG=debug cargo run -- --static --no-sheets https://example.com/prices
//! ```

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use table_scraper::{
    Agent, BrowserExtractor, HttpExtractor, OpenAiCompletion, OpenAiConfig, OpenAiEmbedder,
    Pipeline, ScraperConfig, ScraperError, ScraperService, SheetsClient, TableExtractor, WaitUntil,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "ページ内の最初のテーブルを抽出し、変化があれば保存・出力する")]
struct Args {
    /// 対象URL（省略時は対話入力）
    url: Option<String>,

    #[arg(long, env = "TABLE_SCRAPER_SNAPSHOT", default_value = "table_data.json")]
    snapshot: PathBuf,

    #[arg(long, env = "TABLE_SCRAPER_CSV", default_value = "table_data.csv")]
    csv: PathBuf,

    #[arg(long, env = "TABLE_SCRAPER_SPREADSHEET", default_value = "LangChain")]
    spreadsheet: String,

    #[arg(long, env = "GOOGLE_APPLICATION_CREDENTIALS", default_value = "credentials.json")]
    credentials: PathBuf,

    #[arg(long, env = "TABLE_SCRAPER_TIMEOUT_MS", default_value_t = 60_000)]
    timeout_ms: u64,

    /// commit / domcontentloaded / load / networkidle
    #[arg(long, env = "TABLE_SCRAPER_WAIT_UNTIL", default_value = "networkidle")]
    wait_until: WaitUntil,

    #[arg(long, env = "TABLE_SCRAPER_SELECTOR", default_value = "table")]
    selector: String,

    /// ブラウザを使わず静的HTMLから抽出
    #[arg(long = "static", env = "TABLE_SCRAPER_STATIC")]
    static_html: bool,

    /// ブラウザを表示する
    #[arg(long, env = "TABLE_SCRAPER_HEADED")]
    headed: bool,

    #[arg(long, env = "CHROME_PATH")]
    chrome_path: Option<PathBuf>,

    /// デバッグ用スクリーンショットをログに出す
    #[arg(long, env = "TABLE_SCRAPER_DEBUG")]
    debug: bool,

    /// Google Sheets への追記をしない
    #[arg(long, env = "TABLE_SCRAPER_NO_SHEETS")]
    no_sheets: bool,

    /// パイプラインの代わりにエージェントを実行
    #[arg(long, value_name = "INSTRUCTION")]
    agent: Option<String>,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    #[arg(long, env = "OPENAI_BASE_URL")]
    openai_base_url: Option<String>,
}

impl Args {
    fn config(&self) -> ScraperConfig {
        let mut config = ScraperConfig::new()
            .with_snapshot_path(&self.snapshot)
            .with_csv_path(&self.csv)
            .with_spreadsheet_name(&self.spreadsheet)
            .with_credentials_path(&self.credentials)
            .with_timeout(Duration::from_millis(self.timeout_ms))
            .with_wait_until(self.wait_until)
            .with_selector(&self.selector)
            .with_headless(!self.headed)
            .with_debug(self.debug);

        if let Some(path) = &self.chrome_path {
            config = config.with_chrome_path(path);
        }
        if let Some(key) = &self.openai_api_key {
            let mut openai = OpenAiConfig::new(key);
            if let Some(base_url) = &self.openai_base_url {
                openai = openai.with_base_url(base_url);
            }
            config = config.with_openai(openai);
        }
        config
    }
}

#[tokio::main]
async fn main() {
    // ログ設定
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    if let Err(e) = run(args).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), ScraperError> {
    let config = args.config();
    let extractor = build_extractor(&args, &config)?;

    if let Some(instruction) = &args.agent {
        return run_agent(instruction, args.url.as_deref(), &config, extractor).await;
    }

    let url = match args.url {
        Some(url) => url,
        None => prompt_url()?,
    };

    let mut pipeline = Pipeline::new(&config, extractor);
    if let Some(openai) = &config.openai {
        pipeline = pipeline.with_embedder(Box::new(OpenAiEmbedder::new(openai.clone())));
    }
    if args.no_sheets {
        info!("Sheets への追記はスキップ (--no-sheets)");
    } else if config.credentials_path.exists() {
        let sheets = SheetsClient::from_credentials_file(
            &config.credentials_path,
            &config.spreadsheet_name,
        )?;
        pipeline = pipeline.with_sink(Box::new(sheets));
    } else {
        warn!(
            "認証情報が見つからないため Sheets への追記をスキップ: {}",
            config.credentials_path.display()
        );
    }

    let mut report = pipeline.detect(&url).await?;

    // 出力に失敗しても抽出結果は表示する
    println!("{}", serde_json::to_string_pretty(&report.record)?);
    if report.record.is_some() {
        if report.changed {
            println!("The table data has changed!");
        } else {
            println!("No changes in the table data.");
        }
    } else {
        println!("No table found on the page.");
    }

    pipeline.export(&mut report).await?;
    if let Some(path) = &report.csv_path {
        println!("Table data exported to {}", path.display());
    }
    if report.appended_rows > 0 {
        println!("Table data exported to spreadsheet: {}", config.spreadsheet_name);
    }
    if report.indexed_documents > 0 {
        println!("Indexed {} documents", report.indexed_documents);
    }
    Ok(())
}

fn build_extractor(
    args: &Args,
    config: &ScraperConfig,
) -> Result<Arc<dyn TableExtractor>, ScraperError> {
    if args.static_html {
        Ok(Arc::new(HttpExtractor::new(config)?))
    } else {
        Ok(Arc::new(BrowserExtractor::new(config.clone())))
    }
}

async fn run_agent(
    instruction: &str,
    url: Option<&str>,
    config: &ScraperConfig,
    extractor: Arc<dyn TableExtractor>,
) -> Result<(), ScraperError> {
    let openai = config.openai.clone().ok_or_else(|| {
        ScraperError::Config("エージェントには OPENAI_API_KEY が必要です".into())
    })?;

    let agent = Agent::table_extraction(
        Box::new(OpenAiCompletion::new(openai)),
        ScraperService::new(extractor),
    )?
    .with_verbose(true);

    let input = match url {
        Some(url) => format!("{} {}", instruction, url),
        None => instruction.to_string(),
    };
    let outcome = agent.run(&input).await?;
    println!("{}", outcome.output);
    Ok(())
}

fn prompt_url() -> Result<String, ScraperError> {
    print!("Enter the URL to scrape: ");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let url = line.trim().to_string();
    if url.is_empty() {
        return Err(ScraperError::Config("URL が入力されていません".into()));
    }
    Ok(url)
}
