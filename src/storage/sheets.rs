//! Google Sheets storage for the notified set.
//!
//! Rows live in columns `A:C` of one worksheet as `name, poster, detail`.
//! A rewrite overwrites `A1:C{n}` first and only then clears the rows
//! below, so a failed write never leaves the sheet emptier than before.
//! Authentication uses a service-account key: an RS256-signed JWT is
//! exchanged for a bearer token, which is cached until shortly before it
//! expires.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{ListingRecord, StateConfig};
use crate::storage::NotifiedStore;
use crate::utils::http::check_status;
use crate::utils::retry::{RetryPolicy, with_retry};

const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const TOKEN_LIFETIME_SECS: i64 = 3600;
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// The parts of a service-account JSON key we need.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.into()
}

impl ServiceAccountKey {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| AppError::config(format!("CREDENTIALS is not a service-account key: {e}")))
    }
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValueRangeBody<'a> {
    range: &'a str,
    major_dimension: &'static str,
    values: Vec<Vec<String>>,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Worksheet-backed notified set.
pub struct SheetsStore {
    client: Client,
    api_base: String,
    key: ServiceAccountKey,
    spreadsheet_id: String,
    worksheet: String,
    retry: RetryPolicy,
    token: Mutex<Option<CachedToken>>,
}

impl SheetsStore {
    pub fn new(
        client: Client,
        key: ServiceAccountKey,
        spreadsheet_id: impl Into<String>,
        worksheet: &str,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            client,
            api_base: StateConfig::default().api_base,
            key,
            spreadsheet_id: spreadsheet_id.into(),
            worksheet: worksheet.to_string(),
            retry,
            token: Mutex::new(None),
        }
    }

    /// Point the store at another Sheets API endpoint.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Build from configuration; both the spreadsheet ID and credentials are required.
    pub fn from_config(config: &StateConfig, client: Client, retry: RetryPolicy) -> Result<Self> {
        let spreadsheet_id = config
            .spreadsheet_id
            .as_deref()
            .ok_or_else(|| AppError::config("SPREADSHEET_ID is not set"))?;
        let credentials = config
            .credentials_json
            .as_deref()
            .ok_or_else(|| AppError::config("CREDENTIALS is not set"))?;
        let key = ServiceAccountKey::from_json(credentials)?;
        Ok(Self::new(client, key, spreadsheet_id, &config.worksheet, retry)
            .with_api_base(&config.api_base))
    }

    /// `{worksheet}!{cells}`
    fn range(&self, cells: &str) -> String {
        format!("{}!{}", self.worksheet, cells)
    }

    /// `.../spreadsheets/{id}/values/{range}{suffix}` with the range path-encoded.
    fn values_url(&self, range: &str, suffix: &str) -> Result<Url> {
        let mut url = Url::parse(&self.api_base)?;
        let range = format!("{range}{suffix}");
        url.path_segments_mut()
            .map_err(|_| AppError::config("invalid Sheets API base"))?
            .pop_if_empty()
            .extend([self.spreadsheet_id.as_str(), "values", range.as_str()]);
        Ok(url)
    }

    fn signed_assertion(&self, now: i64) -> Result<String> {
        let claims = Claims {
            iss: &self.key.client_email,
            scope: SHEETS_SCOPE,
            aud: &self.key.token_uri,
            iat: now,
            exp: now + TOKEN_LIFETIME_SECS,
        };
        let key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())
            .map_err(|e| AppError::auth("Sheets", format!("invalid private key: {e}")))?;
        encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|e| AppError::auth("Sheets", format!("cannot sign token request: {e}")))
    }

    async fn request_token(&self) -> Result<CachedToken> {
        let assertion = self.signed_assertion(chrono::Utc::now().timestamp())?;
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", JWT_GRANT)
            .append_pair("assertion", &assertion)
            .finish();

        let response = self
            .client
            .post(&self.key.token_uri)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await?;
        let status = response.status();
        if status.as_u16() == 400 || status.as_u16() == 401 {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::auth("Sheets", body));
        }
        let token: TokenResponse = check_status("Sheets", response).await?.json().await?;

        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(3600));
        Ok(CachedToken {
            value: token.access_token,
            expires_at: Instant::now() + lifetime.saturating_sub(TOKEN_REFRESH_MARGIN),
        })
    }

    async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() {
                return Ok(token.value.clone());
            }
        }
        let fresh = with_retry(&self.retry, "Sheets token", || self.request_token()).await?;
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }

    async fn read_rows(&self) -> Result<Vec<Vec<String>>> {
        let token = self.access_token().await?;
        let response = self
            .client
            .get(self.values_url(&self.range("A:C"), "")?)
            .bearer_auth(token)
            .send()
            .await?;
        let range: ValueRange = check_status("Sheets", response).await?.json().await?;
        Ok(range.values)
    }

    async fn write_rows(&self, rows: &[Vec<String>]) -> Result<()> {
        let token = self.access_token().await?;

        if !rows.is_empty() {
            let range = self.range(&format!("A1:C{}", rows.len()));
            let mut url = self.values_url(&range, "")?;
            url.query_pairs_mut().append_pair("valueInputOption", "RAW");
            let body = ValueRangeBody {
                range: &range,
                major_dimension: "ROWS",
                values: rows.to_vec(),
            };
            let response = self
                .client
                .put(url)
                .bearer_auth(&token)
                .json(&body)
                .send()
                .await?;
            check_status("Sheets", response).await?;
        }

        // Rows left over from a longer previous set.
        let tail = self.range(&format!("A{}:C", rows.len() + 1));
        let response = self
            .client
            .post(self.values_url(&tail, ":clear")?)
            .bearer_auth(&token)
            .json(&serde_json::json!({}))
            .send()
            .await?;
        check_status("Sheets", response).await?;
        Ok(())
    }
}

/// Records from raw rows; blank rows are skipped, short rows padded.
fn rows_to_records(rows: &[Vec<String>]) -> Vec<ListingRecord> {
    rows.iter()
        .filter_map(|row| ListingRecord::from_row(row))
        .collect()
}

#[async_trait]
impl NotifiedStore for SheetsStore {
    async fn load(&self) -> Result<Vec<ListingRecord>> {
        let rows = with_retry(&self.retry, "Sheets read", || self.read_rows()).await?;
        let records = rows_to_records(&rows);
        log::info!("Loaded {} records from {}", records.len(), self.describe());
        Ok(records)
    }

    async fn replace_all(&self, records: &[ListingRecord]) -> Result<()> {
        let rows: Vec<Vec<String>> = records.iter().map(ListingRecord::to_row).collect();
        with_retry(&self.retry, "Sheets write", || self.write_rows(&rows)).await?;
        log::info!("{} records written to {}", rows.len(), self.describe());
        Ok(())
    }

    fn describe(&self) -> String {
        format!("spreadsheet {} ({})", self.spreadsheet_id, self.range("A:C"))
    }
}
