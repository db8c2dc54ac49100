//! Post-recording remux stage.
//!
//! Repackages a finished recording into a streaming-friendly container
//! without re-encoding. The source file is never touched.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("remux exited with {status}: {stderr}")]
    ExitStatus {
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("remux reported success but {0:?} was not written")]
    MissingOutput(PathBuf),
    #[error("remux timed out after {}s", .0.as_secs())]
    TimedOut(Duration),
}

/// What the upload stage should use for a finished recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionOutcome {
    Converted(PathBuf),
    /// Conversion is disabled; upload the original file.
    Skipped,
    /// Conversion failed; upload the original file.
    Failed { reason: String },
}

impl ConversionOutcome {
    pub fn upload_path<'a>(&'a self, original: &'a Path) -> &'a Path {
        match self {
            Self::Converted(path) => path,
            Self::Skipped | Self::Failed { .. } => original,
        }
    }

    pub fn is_converted(&self) -> bool {
        matches!(self, Self::Converted(_))
    }
}

#[async_trait]
pub trait Converter: Send + Sync {
    async fn convert(&self, source: &Path) -> Result<PathBuf, ConversionError>;
}

/// Run `converter` and fold any failure into `ConversionOutcome::Failed`.
/// Failures are logged here and never retried.
pub async fn conversion_outcome(converter: &dyn Converter, source: &Path) -> ConversionOutcome {
    match converter.convert(source).await {
        Ok(path) if path.as_path() == source => ConversionOutcome::Skipped,
        Ok(path) => ConversionOutcome::Converted(path),
        Err(e) => {
            warn!(
                "[CONVERT] {:?} failed, falling back to original: {}",
                source, e
            );
            ConversionOutcome::Failed {
                reason: e.to_string(),
            }
        }
    }
}

/// Remuxes with ffmpeg: `-c copy -movflags +faststart`.
pub struct FfmpegRemuxer {
    program: String,
    output_extension: String,
    timeout: Option<Duration>,
}

impl FfmpegRemuxer {
    pub fn new(program: impl Into<String>, output_extension: impl Into<String>) -> Self {
        let output_extension = output_extension.into();
        Self {
            program: program.into(),
            output_extension: output_extension.trim_start_matches('.').to_string(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Whether the configured program can be found on PATH (or exists as given).
    pub fn is_available(&self) -> bool {
        which::which(&self.program).is_ok()
    }

    pub fn output_path(&self, source: &Path) -> PathBuf {
        source.with_extension(&self.output_extension)
    }

    fn command(&self, source: &Path, output: &Path) -> tokio::process::Command {
        // -y: overwrite a leftover output from an interrupted run
        // -c copy: no re-encode
        // -movflags +faststart: move the moov atom to the front for progressive playback
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(["-y", "-loglevel", "error", "-i"])
            .arg(source)
            .args(["-c", "copy", "-movflags", "+faststart"])
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Converter for FfmpegRemuxer {
    async fn convert(&self, source: &Path) -> Result<PathBuf, ConversionError> {
        let output = self.output_path(source);
        info!(
            "[CONVERT] {:?} -> {:?}",
            source.file_name().unwrap_or_default(),
            output.file_name().unwrap_or_default()
        );

        let child = self
            .command(source, &output)
            .spawn()
            .map_err(|source| ConversionError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        // kill_on_drop reaps the child if the timeout fires
        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| ConversionError::TimedOut(limit))?,
            None => child.wait_with_output().await,
        };

        let result = result.map_err(|source| ConversionError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        if !result.status.success() {
            return Err(ConversionError::ExitStatus {
                status: result.status,
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }

        if !output.exists() {
            return Err(ConversionError::MissingOutput(output));
        }

        info!("[CONVERT] Done: {:?}", output);
        Ok(output)
    }
}

/// Used when conversion is disabled in config. Its result folds into
/// `ConversionOutcome::Skipped`.
pub struct PassthroughConverter;

#[async_trait]
impl Converter for PassthroughConverter {
    async fn convert(&self, source: &Path) -> Result<PathBuf, ConversionError> {
        Ok(source.to_path_buf())
    }
}
