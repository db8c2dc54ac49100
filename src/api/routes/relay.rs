//! WebSocket endpoints for the live telemetry relay.
//!
//! - `GET /relay/publish`   - producer socket (one at a time)
//! - `GET /relay/subscribe` - viewer socket

use crate::api::error::{ApiError, ApiResult};
use crate::relay::{is_valid_record, TelemetryRelay};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct RelayState {
    pub relay: TelemetryRelay,
    producer_connected: Arc<AtomicBool>,
}

impl RelayState {
    pub fn new(relay: TelemetryRelay) -> Self {
        Self {
            relay,
            producer_connected: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// Held for the lifetime of a producer connection. Dropping it frees the
/// producer slot, including when the upgrade never completes.
struct ProducerClaim(Arc<AtomicBool>);

impl ProducerClaim {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag.clone()))
    }
}

impl Drop for ProducerClaim {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Creates the relay router.
pub fn router(state: RelayState) -> Router {
    Router::new()
        .route("/publish", get(publish))
        .route("/subscribe", get(subscribe))
        .with_state(state)
}

async fn publish(ws: WebSocketUpgrade, State(state): State<RelayState>) -> ApiResult<Response> {
    let claim = ProducerClaim::acquire(&state.producer_connected)
        .ok_or_else(|| ApiError::conflict("A telemetry producer is already connected"))?;

    Ok(ws.on_upgrade(move |socket| producer_session(socket, state.relay, claim)))
}

async fn subscribe(ws: WebSocketUpgrade, State(state): State<RelayState>) -> Response {
    ws.on_upgrade(move |socket| viewer_session(socket, state.relay))
}

async fn producer_session(mut socket: WebSocket, relay: TelemetryRelay, _claim: ProducerClaim) {
    info!("[RELAY] Producer connected");

    while let Some(message) = socket.recv().await {
        match message {
            Ok(Message::Text(text)) => {
                if is_valid_record(&text) {
                    let delivered = relay.publish(&text);
                    debug!("[RELAY] Record relayed to {} viewer(s)", delivered);
                } else {
                    warn!("[RELAY] Dropping non-JSON record ({} bytes)", text.len());
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                warn!("[RELAY] Producer socket error: {}", e);
                break;
            }
        }
    }

    info!("[RELAY] Producer disconnected");
}

async fn viewer_session(mut socket: WebSocket, relay: TelemetryRelay) {
    let (last, mut records) = relay.subscribe();
    debug!("[RELAY] Viewer connected ({} total)", relay.subscriber_count());

    if let Some(record) = last {
        if socket.send(Message::Text(record.to_string())).await.is_err() {
            return;
        }
    }

    loop {
        tokio::select! {
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            record = records.recv() => match record {
                Ok(record) => {
                    if socket.send(Message::Text(record.to_string())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("[RELAY] Viewer fell behind, skipped {} record(s)", skipped);
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    debug!("[RELAY] Viewer disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_producer_claim() {
        let flag = Arc::new(AtomicBool::new(false));
        let first = ProducerClaim::acquire(&flag);
        assert!(first.is_some());
        assert!(ProducerClaim::acquire(&flag).is_none());

        drop(first);
        assert!(ProducerClaim::acquire(&flag).is_some());
    }
}
