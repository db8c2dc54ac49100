//! Per-session work: convert, then upload.

use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::conversion::{conversion_outcome, Converter};
use crate::upload::{RemoteObject, UploadStage};

/// A finished recording handed to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingJob {
    pub filename: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineOutcome {
    pub filename: String,
    /// The converted artifact, or the original when conversion failed.
    pub uploaded_path: PathBuf,
    pub converted: bool,
    pub remote: Option<RemoteObject>,
}

/// Stages shared by every session's background task.
#[derive(Clone)]
pub struct SessionPipeline {
    converter: Arc<dyn Converter>,
    upload: UploadStage,
}

impl SessionPipeline {
    pub fn new(converter: Arc<dyn Converter>, upload: UploadStage) -> Self {
        Self { converter, upload }
    }

    pub fn remote_sink_enabled(&self) -> bool {
        self.upload.is_enabled()
    }

    /// Convert then upload. A conversion failure never prevents the upload
    /// attempt, and neither stage's failure escapes this function.
    pub async fn run(&self, job: RecordingJob) -> PipelineOutcome {
        let conversion = conversion_outcome(self.converter.as_ref(), &job.path).await;
        let upload_path = conversion.upload_path(&job.path).to_path_buf();

        let remote = self.upload.upload_best_effort(&upload_path).await;

        info!(
            "[PIPELINE] {} finished (converted: {}, uploaded: {})",
            job.filename,
            conversion.is_converted(),
            remote.is_some()
        );

        PipelineOutcome {
            filename: job.filename,
            uploaded_path: upload_path,
            converted: conversion.is_converted(),
            remote,
        }
    }
}
