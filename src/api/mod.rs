//! HTTP server for recwatch.
//!
//! Provides endpoints for:
//! - Pipeline status
//! - Live telemetry relay (WebSocket)

pub mod error;
pub mod routes;

use crate::config::ServerConfig;
use crate::pipeline::StatusHandle;
use crate::relay::TelemetryRelay;
use anyhow::{Context, Result};
use axum::{response::Json, routing::get, Router};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tracing::info;

pub use routes::relay::RelayState;

pub struct ApiServer {
    host: String,
    port: u16,
    status: StatusHandle,
    relay: TelemetryRelay,
}

impl ApiServer {
    pub fn new(status: StatusHandle, relay: TelemetryRelay, config: &ServerConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            status,
            relay,
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            // Root and version endpoints
            .route("/", get(service_info))
            .route("/version", get(version))
            .merge(routes::status::router(self.status.clone()))
            .nest(
                "/relay",
                routes::relay::router(RelayState::new(self.relay.clone())),
            )
            .layer(ServiceBuilder::new())
    }

    pub async fn start(self) -> Result<()> {
        let app = self.router();
        let addr = format!("{}:{}", self.host, self.port);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind API server to {}", addr))?;

        info!("[TELEMETRY] Server running on http://{}", addr);
        info!("Endpoints:");
        info!("  GET  /                - Service info");
        info!("  GET  /version         - Version info");
        info!("  GET  /status          - Recording and upload status");
        info!("  WS   /relay/publish   - Telemetry producer");
        info!("  WS   /relay/subscribe - Telemetry viewer");

        axum::serve(listener, app).await?;

        Ok(())
    }
}

async fn service_info() -> Json<Value> {
    Json(json!({
        "service": "recwatch",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

async fn version() -> Json<Value> {
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "name": "recwatch"
    }))
}
