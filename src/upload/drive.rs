//! Google Drive remote sink.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use serde::Serialize;
use std::path::Path;
use tokio_util::io::ReaderStream;
use tracing::{error, info};

use super::oauth::{OAuthClient, StoredToken, TokenSource};
use super::{RemoteObject, RemoteSink};
use crate::config::DriveConfig;

const DEFAULT_UPLOAD_BASE: &str = "https://www.googleapis.com";

#[derive(Debug, Serialize)]
struct FileMetadata<'a> {
    name: &'a str,
    parents: [&'a str; 1],
}

pub struct DriveClient {
    http: reqwest::Client,
    tokens: TokenSource,
    folder_id: String,
    mime_type: String,
    upload_base: String,
}

impl DriveClient {
    pub fn new(
        http: reqwest::Client,
        tokens: TokenSource,
        folder_id: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            http,
            tokens,
            folder_id: folder_id.into(),
            mime_type: mime_type.into(),
            upload_base: DEFAULT_UPLOAD_BASE.to_string(),
        }
    }

    pub fn with_upload_base(mut self, base: impl Into<String>) -> Self {
        self.upload_base = base.into().trim_end_matches('/').to_string();
        self
    }

    /// Build a client from config. Returns `None` (uploads disabled) when the
    /// folder or OAuth files are missing or unreadable.
    pub fn from_config(config: &DriveConfig) -> Option<Self> {
        if config.folder_id.trim().is_empty() {
            info!("[GDRIVE] No folder_id configured, auto-upload disabled");
            return None;
        }

        let (client_path, token_path) = match (config.client_secret_path(), config.token_path()) {
            (Ok(client), Ok(token)) => (client, token),
            (Err(e), _) | (_, Err(e)) => {
                error!("[GDRIVE] Cannot resolve OAuth file paths: {:#}", e);
                return None;
            }
        };

        if !client_path.exists() || !token_path.exists() {
            info!(
                "[GDRIVE] OAuth files missing ({:?}, {:?}), auto-upload disabled",
                client_path, token_path
            );
            return None;
        }

        match Self::load(config, &client_path, &token_path) {
            Ok(client) => {
                info!("[GDRIVE] OAuth initialized, auto-upload enabled");
                Some(client)
            }
            Err(e) => {
                error!("[GDRIVE] Init error: {:#}", e);
                None
            }
        }
    }

    fn load(config: &DriveConfig, client_path: &Path, token_path: &Path) -> Result<Self> {
        let oauth = OAuthClient::load(client_path)?;
        let token = StoredToken::load(token_path)?;
        let http = reqwest::Client::builder()
            .build()
            .context("Failed to create HTTP client")?;
        let tokens = TokenSource::new(oauth, token, http.clone())?;
        Ok(Self::new(
            http,
            tokens,
            config.folder_id.clone(),
            config.mime_type.clone(),
        ))
    }

    /// Open a resumable upload session and return its URL.
    async fn start_session(&self, token: &str, name: &str, size: u64) -> Result<String> {
        let url = format!(
            "{}/upload/drive/v3/files?uploadType=resumable&fields=id,name",
            self.upload_base
        );

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .header("X-Upload-Content-Type", &self.mime_type)
            .header("X-Upload-Content-Length", size)
            .json(&FileMetadata {
                name,
                parents: [self.folder_id.as_str()],
            })
            .send()
            .await
            .context("Failed to start Drive upload session")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "Drive upload session failed with status {}: {}",
                status,
                body
            ));
        }

        response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Drive upload session response has no Location header"))
    }
}

#[async_trait]
impl RemoteSink for DriveClient {
    fn name(&self) -> &'static str {
        "Google Drive"
    }

    async fn upload(&self, path: &Path) -> Result<RemoteObject> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow!("Upload path {:?} has no file name", path))?;

        let file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("Failed to open {:?}", path))?;
        let size = file
            .metadata()
            .await
            .context("Failed to read file metadata")?
            .len();

        info!(
            "[GDRIVE] Uploading {} ({:.2} MB)",
            file_name,
            size as f64 / (1024.0 * 1024.0)
        );

        let token = self.tokens.access_token().await?;
        let session_url = self.start_session(&token, &file_name, size).await?;

        let response = self
            .http
            .put(&session_url)
            .bearer_auth(&token)
            .header(CONTENT_TYPE, &self.mime_type)
            .header(CONTENT_LENGTH, size)
            .body(reqwest::Body::wrap_stream(ReaderStream::new(file)))
            .send()
            .await
            .context("Failed to upload file bytes to Drive")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read Drive upload response body")?;

        if !status.is_success() {
            return Err(anyhow!(
                "Drive upload failed with status {}: {}",
                status,
                body
            ));
        }

        let object: RemoteObject =
            serde_json::from_str(&body).context("Failed to parse Drive upload response")?;
        Ok(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_folder_disables_upload() {
        let config = DriveConfig::default();
        assert!(DriveClient::from_config(&config).is_none());
    }

    #[test]
    fn test_missing_oauth_files_disable_upload() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = DriveConfig {
            folder_id: "folder".to_string(),
            client_secret_path: Some(dir.path().join("client.json")),
            token_path: Some(dir.path().join("token.json")),
            ..Default::default()
        };
        assert!(DriveClient::from_config(&config).is_none());
    }

    #[test]
    fn test_malformed_token_disables_upload() {
        let dir = tempfile::TempDir::new().unwrap();
        let client = dir.path().join("client.json");
        let token = dir.path().join("token.json");
        std::fs::write(
            &client,
            r#"{"installed":{"client_id":"id","client_secret":"s","redirect_uris":["http://localhost"]}}"#,
        )
        .unwrap();
        std::fs::write(&token, "not json").unwrap();

        let config = DriveConfig {
            folder_id: "folder".to_string(),
            client_secret_path: Some(client),
            token_path: Some(token),
            ..Default::default()
        };
        assert!(DriveClient::from_config(&config).is_none());
    }

    #[test]
    fn test_metadata_shape() {
        let json = serde_json::to_value(FileMetadata {
            name: "rec1.mp4",
            parents: ["folder"],
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"name": "rec1.mp4", "parents": ["folder"]}));
    }
}
