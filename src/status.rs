//! Status record shared between the backend feed, the point-query path and
//! the WebSocket broadcast.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One point-in-time health snapshot of a monitored host/service.
///
/// Constructed by the status source from raw backend bytes and never mutated
/// afterwards; the hub shares it read-only (behind `Arc`) with every
/// subscriber. The percentage fields are expected to be in `[0, 100]` but the
/// range is not validated here; that is the producer's job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    /// Logical service/machine identifier, non-empty by convention.
    pub service_name: String,
    /// Reporting host identifier.
    pub host_name: String,
    /// Human-readable span the sample covers. Free-form, never parsed.
    pub window: String,
    pub memory_usage: f64,
    pub disk_usage: f64,
    pub cpu_usage: f64,
    /// Sample capture time on the backend.
    pub timestamp: DateTime<Utc>,
}
