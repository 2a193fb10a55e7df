//! Google Sheets への行追記（サービスアカウント認証）

use std::path::Path;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info};
use url::Url;

use crate::error::ScraperError;
use crate::traits::RowSink;

/// スプレッドシート・ドライブへのアクセススコープ
pub const SCOPES: [&str; 2] = [
    "https://spreadsheets.google.com/feeds",
    "https://www.googleapis.com/auth/drive",
];

const SHEETS_BASE_URL: &str = "https://sheets.googleapis.com/v4";
const DRIVE_BASE_URL: &str = "https://www.googleapis.com/drive/v3";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const SPREADSHEET_MIME_TYPE: &str = "application/vnd.google-apps.spreadsheet";
const JWT_LIFETIME_SECS: u64 = 3600;
/// 期限切れ直前のトークンは使わない
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// サービスアカウントの鍵ファイル（credentials.json）
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    pub fn from_file(path: &Path) -> Result<Self, ScraperError> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| ScraperError::Auth(format!("鍵ファイル {:?} を読めません: {}", path, e)))
    }
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: String,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    JWT_LIFETIME_SECS
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Debug, Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
    #[serde(default)]
    index: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendResponse {
    #[serde(default)]
    updates: Option<AppendUpdates>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendUpdates {
    #[serde(default)]
    updated_rows: Option<usize>,
}

/// 名前で指定したスプレッドシートの先頭ワークシートに行を追記する
pub struct SheetsClient {
    http: Client,
    key: ServiceAccountKey,
    spreadsheet_name: String,
    sheets_base_url: String,
    drive_base_url: String,
    token: Mutex<Option<CachedToken>>,
}

impl SheetsClient {
    pub fn new(key: ServiceAccountKey, spreadsheet_name: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            key,
            spreadsheet_name: spreadsheet_name.into(),
            sheets_base_url: SHEETS_BASE_URL.to_string(),
            drive_base_url: DRIVE_BASE_URL.to_string(),
            token: Mutex::new(None),
        }
    }

    pub fn from_credentials_file(
        path: &Path,
        spreadsheet_name: impl Into<String>,
    ) -> Result<Self, ScraperError> {
        Ok(Self::new(ServiceAccountKey::from_file(path)?, spreadsheet_name))
    }

    /// API のベースURLを差し替える（ローカル検証用）
    pub fn with_base_urls(
        mut self,
        sheets_base_url: impl Into<String>,
        drive_base_url: impl Into<String>,
    ) -> Self {
        self.sheets_base_url = sheets_base_url.into();
        self.drive_base_url = drive_base_url.into();
        self
    }

    /// アクセストークン（キャッシュが有効ならそれを返す）
    async fn access_token(&self) -> Result<String, ScraperError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() + TOKEN_REFRESH_MARGIN {
                return Ok(token.access_token.clone());
            }
        }

        let assertion = self.signed_assertion()?;
        debug!("アクセストークンを取得中: {}", self.key.token_uri);

        let response = self
            .http
            .post(&self.key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;
        let response = ensure_success(response)
            .await
            .map_err(|e| ScraperError::Auth(e.to_string()))?;
        let token: TokenResponse = response.json().await?;

        let access_token = token.access_token.clone();
        *cached = Some(CachedToken {
            access_token: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        });
        Ok(access_token)
    }

    fn signed_assertion(&self) -> Result<String, ScraperError> {
        let iat = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let claims = Claims {
            iss: &self.key.client_email,
            scope: SCOPES.join(" "),
            aud: &self.key.token_uri,
            iat,
            exp: iat + JWT_LIFETIME_SECS,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();

        let key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())
            .map_err(|e| ScraperError::Auth(format!("秘密鍵が不正です: {}", e)))?;
        jsonwebtoken::encode(&header, &claims, &key)
            .map_err(|e| ScraperError::Auth(format!("JWT署名エラー: {}", e)))
    }

    /// ドライブから名前でスプレッドシートIDを探す
    async fn find_spreadsheet_id(&self, token: &str) -> Result<String, ScraperError> {
        let query = format!(
            "name = '{}' and mimeType = '{}' and trashed = false",
            self.spreadsheet_name.replace('\\', "\\\\").replace('\'', "\\'"),
            SPREADSHEET_MIME_TYPE
        );

        let response = self
            .http
            .get(format!("{}/files", self.drive_base_url))
            .bearer_auth(token)
            .query(&[
                ("q", query.as_str()),
                ("fields", "files(id,name)"),
                ("supportsAllDrives", "true"),
                ("includeItemsFromAllDrives", "true"),
            ])
            .send()
            .await?;
        let list: FileList = ensure_success(response).await?.json().await?;

        list.files.into_iter().next().map(|f| f.id).ok_or_else(|| {
            ScraperError::Sheets(format!(
                "スプレッドシートが見つかりません: {}",
                self.spreadsheet_name
            ))
        })
    }

    /// 先頭ワークシートのタイトル
    async fn first_sheet_title(
        &self,
        token: &str,
        spreadsheet_id: &str,
    ) -> Result<String, ScraperError> {
        let response = self
            .http
            .get(format!("{}/spreadsheets/{}", self.sheets_base_url, spreadsheet_id))
            .bearer_auth(token)
            .query(&[("fields", "sheets.properties")])
            .send()
            .await?;
        let meta: SpreadsheetMeta = ensure_success(response).await?.json().await?;

        meta.sheets
            .into_iter()
            .map(|s| s.properties)
            .min_by_key(|p| p.index)
            .map(|p| p.title)
            .ok_or_else(|| ScraperError::Sheets("ワークシートがありません".into()))
    }

    fn append_url(&self, spreadsheet_id: &str, sheet_title: &str) -> Result<Url, ScraperError> {
        let mut url = Url::parse(&self.sheets_base_url)
            .map_err(|e| ScraperError::Config(format!("Sheets URL: {}", e)))?;
        let range = format!("'{}':append", sheet_title.replace('\'', "''"));
        url.path_segments_mut()
            .map_err(|_| ScraperError::Config("Sheets URL にパスを追加できません".into()))?
            .pop_if_empty()
            .extend(["spreadsheets", spreadsheet_id, "values", range.as_str()]);
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");
        Ok(url)
    }
}

#[async_trait]
impl RowSink for SheetsClient {
    async fn append_rows(&self, rows: Vec<Vec<String>>) -> Result<usize, ScraperError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let token = self.access_token().await?;
        let spreadsheet_id = self.find_spreadsheet_id(&token).await?;
        let sheet_title = self.first_sheet_title(&token, &spreadsheet_id).await?;
        info!(
            "スプレッドシートに追記中: {} / {} ({}行)",
            self.spreadsheet_name,
            sheet_title,
            rows.len()
        );

        let row_count = rows.len();
        let response = self
            .http
            .post(self.append_url(&spreadsheet_id, &sheet_title)?)
            .bearer_auth(&token)
            .json(&json!({ "majorDimension": "ROWS", "values": rows }))
            .send()
            .await?;
        let appended: AppendResponse = ensure_success(response).await?.json().await?;

        let updated = appended
            .updates
            .and_then(|u| u.updated_rows)
            .unwrap_or(row_count);
        info!("スプレッドシート追記完了: {}行", updated);
        Ok(updated)
    }
}

async fn ensure_success(response: Response) -> Result<Response, ScraperError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ScraperError::Sheets(format!("HTTP {}: {}", status, body)))
}
