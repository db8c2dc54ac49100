//! Best-effort upload of finished recordings to a remote sink.
//!
//! Nothing here is retried or queued: a network outage must never hold up
//! detection of the next recording.

pub mod drive;
pub mod oauth;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info};

pub use drive::DriveClient;

/// Identity of an uploaded object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteObject {
    pub id: String,
    pub name: String,
}

#[async_trait]
pub trait RemoteSink: Send + Sync {
    fn name(&self) -> &'static str;

    async fn upload(&self, path: &Path) -> Result<RemoteObject>;
}

/// Wraps an optional sink. Without one every upload is a silent no-op so
/// the service keeps working offline.
#[derive(Clone, Default)]
pub struct UploadStage {
    sink: Option<Arc<dyn RemoteSink>>,
}

impl UploadStage {
    pub fn new(sink: Option<Arc<dyn RemoteSink>>) -> Self {
        Self { sink }
    }

    pub fn disabled() -> Self {
        Self { sink: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    pub async fn upload_best_effort(&self, path: &Path) -> Option<RemoteObject> {
        let Some(sink) = &self.sink else {
            debug!("[UPLOAD] No remote sink configured, keeping {:?} local", path);
            return None;
        };

        match sink.upload(path).await {
            Ok(object) => {
                info!(
                    "[UPLOAD] {} done: {} ({})",
                    sink.name(),
                    object.name,
                    object.id
                );
                Some(object)
            }
            Err(e) => {
                error!("[UPLOAD] {} upload of {:?} failed: {:#}", sink.name(), path, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FailingSink {
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl RemoteSink for FailingSink {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn upload(&self, _path: &Path) -> Result<RemoteObject> {
            *self.calls.lock().unwrap() += 1;
            anyhow::bail!("network unreachable")
        }
    }

    struct OkSink;

    #[async_trait]
    impl RemoteSink for OkSink {
        fn name(&self) -> &'static str {
            "ok"
        }

        async fn upload(&self, path: &Path) -> Result<RemoteObject> {
            Ok(RemoteObject {
                id: "id-1".to_string(),
                name: path.file_name().unwrap().to_string_lossy().into_owned(),
            })
        }
    }

    #[tokio::test]
    async fn test_disabled_stage_is_noop() {
        let stage = UploadStage::disabled();
        assert!(!stage.is_enabled());
        assert!(stage
            .upload_best_effort(Path::new("/tmp/rec.mp4"))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_failure_is_swallowed() {
        let sink = Arc::new(FailingSink {
            calls: Mutex::new(0),
        });
        let stage = UploadStage::new(Some(sink.clone()));

        assert!(stage
            .upload_best_effort(Path::new("/tmp/rec.mp4"))
            .await
            .is_none());
        assert_eq!(*sink.calls.lock().unwrap(), 1, "no retry on failure");
    }

    #[tokio::test]
    async fn test_success_returns_remote_object() {
        let stage = UploadStage::new(Some(Arc::new(OkSink)));
        let object = stage
            .upload_best_effort(Path::new("/tmp/rec.mp4"))
            .await
            .unwrap();
        assert_eq!(object.name, "rec.mp4");
    }
}
