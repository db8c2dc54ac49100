use crate::api::ApiServer;
use crate::config::Config;
use crate::conversion::{Converter, FfmpegRemuxer, PassthroughConverter};
use crate::db;
use crate::pipeline::{Orchestrator, ProcessedLedger, SessionPipeline, StatusHandle};
use crate::relay::TelemetryRelay;
use crate::upload::{DriveClient, RemoteSink, UploadStage};
use crate::watcher::SnapshotReader;
use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

pub async fn run_service(config_path: Option<&Path>) -> Result<()> {
    info!("Starting recwatch service");

    let config = Config::load(config_path)?;

    let converter = build_converter(&config);
    let upload = UploadStage::new(
        DriveClient::from_config(&config.drive).map(|client| Arc::new(client) as Arc<dyn RemoteSink>),
    );
    let pipeline = SessionPipeline::new(converter, upload);

    let status = StatusHandle::new(pipeline.remote_sink_enabled());
    let reader = SnapshotReader::new(
        config.watcher.recordings_dir.clone(),
        config.watcher.extension.clone(),
    );
    let mut orchestrator = Orchestrator::new(
        reader,
        config.watcher.growth_window(),
        build_ledger(&config),
        pipeline,
        status.clone(),
    );

    let api_server = ApiServer::new(status, TelemetryRelay::new(), &config.server);
    tokio::spawn(async move {
        if let Err(e) = api_server.start().await {
            error!("API server failed: {:#}", e);
        }
    });

    info!(
        "[RECORD] Watching {:?} for *.{} every {}ms",
        config.watcher.recordings_dir,
        config.watcher.extension,
        config.watcher.poll_interval_ms
    );

    let mut ticker = tokio::time::interval(config.watcher.poll_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => orchestrator.tick().await,
            _ = &mut shutdown => break,
        }
    }

    info!("Shutting down");
    orchestrator.shutdown(config.pipeline.shutdown_grace()).await;
    info!("recwatch stopped");

    Ok(())
}

fn build_converter(config: &Config) -> Arc<dyn Converter> {
    if !config.conversion.enabled {
        info!("[CONVERT] Conversion disabled, originals are uploaded as-is");
        return Arc::new(PassthroughConverter);
    }

    let remuxer = FfmpegRemuxer::new(
        config.conversion.ffmpeg_path.clone(),
        config.conversion.output_extension.clone(),
    )
    .with_timeout(config.conversion.timeout());

    if !remuxer.is_available() {
        warn!(
            "[CONVERT] {} not found in PATH; every conversion will fall back to the original",
            config.conversion.ffmpeg_path
        );
    }

    Arc::new(remuxer)
}

fn build_ledger(config: &Config) -> ProcessedLedger {
    if !config.ledger.persist {
        info!("Ledger persistence disabled; processed recordings are forgotten on restart");
        return ProcessedLedger::in_memory();
    }

    match db::init_db().and_then(ProcessedLedger::persistent) {
        Ok(ledger) => ledger,
        Err(e) => {
            error!("Failed to open ledger database, using in-memory ledger: {:#}", e);
            ProcessedLedger::in_memory()
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
