//! Live telemetry relay.
//!
//! One producer publishes JSON records; every subscriber gets the last known
//! record on connect and then each new record verbatim, in arrival order.
//! Subscribers that fall behind skip what they missed.

use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct TelemetryRelay {
    tx: broadcast::Sender<Arc<str>>,
    last: Arc<RwLock<Option<Arc<str>>>>,
}

impl Default for TelemetryRelay {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryRelay {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            tx,
            last: Arc::new(RwLock::new(None)),
        }
    }

    /// Store `record` as the latest and broadcast it. Returns the number of
    /// subscribers it was sent to.
    pub fn publish(&self, record: &str) -> usize {
        let record: Arc<str> = Arc::from(record);
        // Hold the write lock across the send so a concurrent subscribe sees
        // either the old last record plus this one, or this one as last.
        let mut last = self.last.write().unwrap_or_else(|p| p.into_inner());
        *last = Some(record.clone());
        self.tx.send(record).unwrap_or(0)
    }

    /// The last known record and a receiver for everything after it.
    pub fn subscribe(&self) -> (Option<Arc<str>>, broadcast::Receiver<Arc<str>>) {
        let last = self.last.read().unwrap_or_else(|p| p.into_inner());
        (last.clone(), self.tx.subscribe())
    }

    pub fn last(&self) -> Option<Arc<str>> {
        self.last.read().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Producer frames must be JSON; they are forwarded unmodified.
pub fn is_valid_record(text: &str) -> bool {
    serde_json::from_str::<serde::de::IgnoredAny>(text).is_ok()
}
