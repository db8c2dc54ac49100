use crate::global;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub watcher: WatcherConfig,
    pub conversion: ConversionConfig,
    pub drive: DriveConfig,
    pub server: ServerConfig,
    pub ledger: LedgerConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Directory the recorder writes into. May not exist yet.
    pub recordings_dir: PathBuf,
    /// Recording file extension, without the dot.
    pub extension: String,
    pub poll_interval_ms: u64,
    /// A file modified more recently than this is considered growing.
    /// Keep it comfortably above `poll_interval_ms`.
    pub growth_window_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    pub enabled: bool,
    pub ffmpeg_path: String,
    pub output_extension: String,
    /// Kill the remux process after this many seconds (0 = wait forever)
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    /// Target Drive folder. Uploads are disabled while empty.
    pub folder_id: String,
    pub mime_type: String,
    pub client_secret_path: Option<PathBuf>,
    pub token_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Keep processed filenames in SQLite so restarts don't re-upload.
    pub persist: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub shutdown_grace_seconds: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            recordings_dir: PathBuf::from("/var/recordings"),
            extension: "flv".to_string(),
            poll_interval_ms: 3000,
            growth_window_ms: 5000,
        }
    }
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ffmpeg_path: "ffmpeg".to_string(),
            output_extension: "mp4".to_string(),
            timeout_seconds: 0,
        }
    }
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            folder_id: String::new(),
            mime_type: "video/mp4".to_string(),
            client_secret_path: None,
            token_path: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self { persist: true }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            shutdown_grace_seconds: 30,
        }
    }
}

impl WatcherConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn growth_window(&self) -> Duration {
        Duration::from_millis(self.growth_window_ms)
    }
}

impl ConversionConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_seconds > 0).then(|| Duration::from_secs(self.timeout_seconds))
    }
}

impl DriveConfig {
    pub fn client_secret_path(&self) -> Result<PathBuf> {
        match &self.client_secret_path {
            Some(path) => Ok(path.clone()),
            None => global::oauth_client_file(),
        }
    }

    pub fn token_path(&self) -> Result<PathBuf> {
        match &self.token_path {
            Some(path) => Ok(path.clone()),
            None => global::oauth_token_file(),
        }
    }
}

impl PipelineConfig {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_seconds)
    }
}

impl Config {
    /// Load the config from `path`, or the default location when `None`.
    /// A missing file is created with defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => global::config_file()?,
        };

        if !config_path.exists() {
            info!(
                "Config file not found, creating default at {:?}",
                config_path
            );
            let config = Self::default();
            config.save(&config_path)?;
            return Ok(config);
        }

        let content =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;

        let config: Self = toml::from_str(&content).context("Failed to parse config file")?;
        config.validate()?;

        info!("Loaded config from {:?}", config_path);
        Ok(config)
    }

    pub fn save(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.watcher.poll_interval_ms == 0 {
            bail!("watcher.poll_interval_ms must be greater than zero");
        }
        if self.watcher.growth_window_ms == 0 {
            bail!("watcher.growth_window_ms must be greater than zero");
        }
        if self.watcher.extension.trim().is_empty() {
            bail!("watcher.extension must not be empty");
        }
        if self.watcher.extension == self.conversion.output_extension {
            bail!(
                "conversion.output_extension must differ from watcher.extension ({})",
                self.watcher.extension
            );
        }
        if self.watcher.growth_window_ms <= self.watcher.poll_interval_ms {
            warn!(
                "growth window ({}ms) is not larger than the poll interval ({}ms); \
                 a single late tick may end a session early",
                self.watcher.growth_window_ms, self.watcher.poll_interval_ms
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.watcher.recordings_dir, PathBuf::from("/var/recordings"));
        assert_eq!(config.watcher.extension, "flv");
        assert_eq!(config.watcher.poll_interval(), Duration::from_secs(3));
        assert_eq!(config.watcher.growth_window(), Duration::from_secs(5));
        assert_eq!(config.conversion.output_extension, "mp4");
        assert!(config.conversion.timeout().is_none());
        assert_eq!(config.drive.mime_type, "video/mp4");
        assert!(config.ledger.persist);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [watcher]
            recordings_dir = "/srv/rec"
            growth_window_ms = 4000

            [drive]
            folder_id = "abc"
            "#,
        )
        .unwrap();

        assert_eq!(config.watcher.recordings_dir, PathBuf::from("/srv/rec"));
        assert_eq!(config.watcher.growth_window_ms, 4000);
        assert_eq!(config.watcher.poll_interval_ms, 3000);
        assert_eq!(config.drive.folder_id, "abc");
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut config = Config::default();
        config.watcher.poll_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_same_extension() {
        let mut config = Config::default();
        config.conversion.output_extension = "flv".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_conversion_timeout() {
        let mut config = ConversionConfig::default();
        config.timeout_seconds = 90;
        assert_eq!(config.timeout(), Some(Duration::from_secs(90)));
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load(Some(&path)).unwrap();
        assert!(path.exists());
        assert_eq!(config.server.port, 3000);

        let reloaded = Config::load(Some(&path)).unwrap();
        assert_eq!(reloaded.watcher.extension, "flv");
    }
}
