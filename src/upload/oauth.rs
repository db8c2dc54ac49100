//! Google OAuth plumbing for the Drive sink.
//!
//! The client file is the "installed app" JSON downloaded from the Cloud
//! console. The token file holds the long-lived refresh token written by
//! `recwatch auth`; access tokens are refreshed from it on demand.

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::sync::Mutex;
use tracing::{debug, info};

pub const DRIVE_FILE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_REDIRECT_URI: &str = "http://localhost";
/// Refresh this long before the access token actually expires.
const REFRESH_MARGIN_MS: i64 = 60_000;

#[derive(Debug, Deserialize)]
struct ClientFile {
    installed: Option<OAuthClient>,
    web: Option<OAuthClient>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OAuthClient {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// Token file contents, compatible with the googleapis client layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoredToken {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// Access token expiry, epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

impl OAuthClient {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read OAuth client file {:?}", path))?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let file: ClientFile =
            serde_json::from_str(content).context("Failed to parse OAuth client file")?;
        file.installed
            .or(file.web)
            .ok_or_else(|| anyhow!("OAuth client file has neither \"installed\" nor \"web\" section"))
    }

    pub fn redirect_uri(&self) -> &str {
        self.redirect_uris
            .first()
            .map(String::as_str)
            .unwrap_or(DEFAULT_REDIRECT_URI)
    }

    /// URL the operator opens to grant offline Drive access.
    pub fn consent_url(&self) -> Result<reqwest::Url> {
        reqwest::Url::parse_with_params(
            &self.auth_uri,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri()),
                ("response_type", "code"),
                ("scope", DRIVE_FILE_SCOPE),
                ("access_type", "offline"),
                ("prompt", "consent"),
            ],
        )
        .context("Invalid auth_uri in OAuth client file")
    }

    /// Trade an authorization code for a token set.
    pub async fn exchange_code(&self, http: &reqwest::Client, code: &str) -> Result<StoredToken> {
        let response = self
            .token_request(
                http,
                &[
                    ("grant_type", "authorization_code"),
                    ("code", code.trim()),
                    ("redirect_uri", self.redirect_uri()),
                    ("client_id", self.client_id.as_str()),
                    ("client_secret", self.client_secret.as_str()),
                ],
            )
            .await?;

        if response.refresh_token.is_none() {
            bail!("Token endpoint did not return a refresh token; revoke access and retry");
        }

        Ok(StoredToken {
            expiry_date: response
                .expires_in
                .map(|secs| now_ms() + secs * 1000),
            access_token: Some(response.access_token),
            refresh_token: response.refresh_token,
            scope: response.scope,
            token_type: response.token_type,
        })
    }

    async fn refresh(&self, http: &reqwest::Client, refresh_token: &str) -> Result<AccessToken> {
        let response = self
            .token_request(
                http,
                &[
                    ("grant_type", "refresh_token"),
                    ("refresh_token", refresh_token),
                    ("client_id", self.client_id.as_str()),
                    ("client_secret", self.client_secret.as_str()),
                ],
            )
            .await?;

        Ok(AccessToken {
            expires_at_ms: response
                .expires_in
                .map(|secs| now_ms() + secs * 1000)
                .unwrap_or(i64::MAX),
            token: response.access_token,
        })
    }

    async fn token_request(
        &self,
        http: &reqwest::Client,
        form: &[(&str, &str)],
    ) -> Result<TokenResponse> {
        let response = http
            .post(&self.token_uri)
            .form(form)
            .send()
            .await
            .context("Failed to reach OAuth token endpoint")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read token response body")?;

        if !status.is_success() {
            if let Ok(err) = serde_json::from_str::<TokenErrorResponse>(&body) {
                bail!(
                    "OAuth token request failed ({}): {} {}",
                    status,
                    err.error,
                    err.error_description.unwrap_or_default()
                );
            }
            bail!("OAuth token request failed ({}): {}", status, body);
        }

        serde_json::from_str(&body).context("Failed to parse token response")
    }
}

impl StoredToken {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read OAuth token file {:?}", path))?;
        serde_json::from_str(&content).context("Failed to parse OAuth token file")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create token directory")?;
        }
        let content = serde_json::to_string_pretty(self).context("Failed to serialize token")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write OAuth token file {:?}", path))?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct AccessToken {
    token: String,
    expires_at_ms: i64,
}

impl AccessToken {
    fn is_fresh(&self, now_ms: i64) -> bool {
        now_ms < self.expires_at_ms.saturating_sub(REFRESH_MARGIN_MS)
    }
}

/// Hands out bearer tokens, refreshing them when close to expiry.
pub struct TokenSource {
    client: OAuthClient,
    refresh_token: String,
    http: reqwest::Client,
    cached: Mutex<Option<AccessToken>>,
}

impl TokenSource {
    pub fn new(client: OAuthClient, token: StoredToken, http: reqwest::Client) -> Result<Self> {
        let refresh_token = token
            .refresh_token
            .ok_or_else(|| anyhow!("OAuth token file has no refresh_token; run `recwatch auth`"))?;

        let cached = token.access_token.map(|access| AccessToken {
            token: access,
            expires_at_ms: token.expiry_date.unwrap_or(0),
        });

        Ok(Self {
            client,
            refresh_token,
            http,
            cached: Mutex::new(cached),
        })
    }

    pub async fn access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(now_ms())) {
            return Ok(token.token.clone());
        }

        debug!("Refreshing Google access token");
        let fresh = self
            .client
            .refresh(&self.http, &self.refresh_token)
            .await
            .context("Failed to refresh Google access token")?;
        info!("Google access token refreshed");

        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
