//! Shared state handed to every route handler.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::hub::BroadcastHub;
use crate::source::StatusSource;
use crate::transport::TransportClient;

#[derive(Clone)]
pub struct AppState {
    pub hub: BroadcastHub,
    pub source: Arc<dyn StatusSource>,
    pub transport: TransportClient,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(hub: BroadcastHub, source: Arc<dyn StatusSource>, transport: TransportClient) -> Self {
        Self {
            hub,
            source,
            transport,
            startup_time: Utc::now(),
        }
    }

    pub fn uptime_secs(&self) -> i64 {
        (Utc::now() - self.startup_time).num_seconds()
    }
}
