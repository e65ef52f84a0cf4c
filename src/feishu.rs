//! Feishu Bitable client.
//!
//! Implements [`RecordSource`] against the Feishu Open Platform:
//!
//! | Call | Endpoint |
//! |------|----------|
//! | token | `POST /auth/v3/tenant_access_token/internal` |
//! | page | `GET /bitable/v1/apps/{app_token}/tables/{table_id}/records` |
//!
//! Both endpoints wrap their payload in an envelope carrying a business
//! `code`; anything other than `0` is a failure even when the HTTP status
//! is 200.
//!
//! # Environment Variables
//!
//! - `FEISHU_APP_ID`: overrides `feishu.app_id`
//! - `FEISHU_APP_SECRET`: overrides `feishu.app_secret`

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::config::FeishuConfig;
use crate::error::SourceError;
use crate::models::{Credential, Cursor, Page, RemoteRecord};
use crate::traits::RecordSource;

/// Records requested per page. Fixed by the protocol.
pub const PAGE_SIZE: u32 = 100;

// ============ App Credentials ============

/// The two static secrets exchanged for a tenant access token.
#[derive(Clone)]
pub struct AppCredentials {
    app_id: String,
    app_secret: String,
}

impl AppCredentials {
    pub fn new(app_id: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            app_secret: app_secret.into(),
        }
    }

    /// Resolve from `FEISHU_APP_ID` / `FEISHU_APP_SECRET`, falling back to config.
    pub fn resolve(config: &FeishuConfig) -> Result<Self> {
        let app_id = std::env::var("FEISHU_APP_ID")
            .ok()
            .or_else(|| config.app_id.clone())
            .context("FEISHU_APP_ID environment variable not set and feishu.app_id missing")?;
        let app_secret = std::env::var("FEISHU_APP_SECRET")
            .ok()
            .or_else(|| config.app_secret.clone())
            .context(
                "FEISHU_APP_SECRET environment variable not set and feishu.app_secret missing",
            )?;

        Ok(Self::new(app_id, app_secret))
    }
}

// ============ Client ============

pub struct FeishuClient {
    http: reqwest::Client,
    base_url: String,
    app_token: String,
    credentials: AppCredentials,
    auth_timeout: Duration,
    fetch_timeout: Duration,
}

impl FeishuClient {
    pub fn new(config: &FeishuConfig, credentials: AppCredentials) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            app_token: config.app_token.clone(),
            credentials,
            auth_timeout: Duration::from_secs(config.auth_timeout_secs),
            fetch_timeout: Duration::from_secs(config.fetch_timeout_secs),
        })
    }

    /// Build a client from config, resolving credentials from the environment.
    pub fn from_config(config: &FeishuConfig) -> Result<Self> {
        let credentials = AppCredentials::resolve(config)?;
        Self::new(config, credentials)
    }

    fn records_url(&self, table_id: &str) -> String {
        format!(
            "{}/bitable/v1/apps/{}/tables/{}/records",
            self.base_url, self.app_token, table_id
        )
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    code: i64,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    tenant_access_token: Option<String>,
}

#[derive(Deserialize)]
struct ListResponse {
    code: i64,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    data: Option<ListData>,
}

#[derive(Deserialize)]
struct ListData {
    #[serde(default)]
    items: Option<Vec<RemoteRecord>>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    page_token: Option<String>,
}

/// Anything carrying the Feishu `code` / `msg` envelope.
trait Envelope {
    fn code(&self) -> i64;
    fn msg(&self) -> &str;
}

impl Envelope for TokenResponse {
    fn code(&self) -> i64 {
        self.code
    }
    fn msg(&self) -> &str {
        &self.msg
    }
}

impl Envelope for ListResponse {
    fn code(&self) -> i64 {
        self.code
    }
    fn msg(&self) -> &str {
        &self.msg
    }
}

/// Decode a response body into an envelope and check its business code.
///
/// A body that fails to decode is a transport failure when the HTTP status
/// was not a success, and a decode failure otherwise.
async fn read_envelope<T>(response: reqwest::Response) -> Result<T, SourceError>
where
    T: DeserializeOwned + Envelope,
{
    let status = response.status();
    let body = response.text().await?;

    match serde_json::from_str::<T>(&body) {
        Ok(envelope) if envelope.code() == 0 => Ok(envelope),
        Ok(envelope) => Err(SourceError::Api {
            code: envelope.code(),
            msg: envelope.msg().to_string(),
        }),
        Err(_) if !status.is_success() => Err(SourceError::Transport(format!(
            "HTTP {}: {}",
            status,
            snippet(&body)
        ))),
        Err(e) => Err(SourceError::Decode(e.to_string())),
    }
}

fn snippet(body: &str) -> String {
    body.chars().take(200).collect()
}

#[async_trait]
impl RecordSource for FeishuClient {
    async fn acquire_token(&self) -> Result<Credential, SourceError> {
        let url = format!("{}/auth/v3/tenant_access_token/internal", self.base_url);
        let body = serde_json::json!({
            "app_id": self.credentials.app_id,
            "app_secret": self.credentials.app_secret,
        });

        let response = self
            .http
            .post(url)
            .timeout(self.auth_timeout)
            .json(&body)
            .send()
            .await?;

        let envelope: TokenResponse = read_envelope(response).await?;
        envelope
            .tenant_access_token
            .filter(|t| !t.is_empty())
            .map(Credential::new)
            .ok_or_else(|| SourceError::Decode("response has no tenant_access_token".to_string()))
    }

    async fn fetch_page(
        &self,
        token: &Credential,
        table_id: &str,
        cursor: Option<&Cursor>,
    ) -> Result<Page, SourceError> {
        let mut query = vec![("page_size", PAGE_SIZE.to_string())];
        if let Some(cursor) = cursor {
            query.push(("page_token", cursor.as_str().to_string()));
        }

        let response = self
            .http
            .get(self.records_url(table_id))
            .timeout(self.fetch_timeout)
            .bearer_auth(token.bearer())
            .query(&query)
            .send()
            .await?;

        let envelope: ListResponse = read_envelope(response).await?;
        let data = envelope
            .data
            .ok_or_else(|| SourceError::Decode("response has no data".to_string()))?;

        let page = Page {
            records: data.items.unwrap_or_default(),
            has_more: data.has_more,
            next_cursor: data
                .page_token
                .filter(|t| !t.is_empty())
                .map(Cursor::new),
        };
        debug!(
            table_id,
            records = page.records.len(),
            has_more = page.has_more,
            "fetched page"
        );
        Ok(page)
    }
}
