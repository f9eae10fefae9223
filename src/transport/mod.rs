//! Resilient QUIC transport to the monitoring backend.
//!
//! One [`TransportClient`] owns at most one live connection. Request/response
//! exchanges each use a fresh bidirectional stream multiplexed over that
//! connection, so independent calls never interfere with each other.

mod client;
mod tls;

pub use client::{TransportClient, TransportOptions};
