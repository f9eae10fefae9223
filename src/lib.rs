//! hostpulse — real-time host health feed.
//!
//! A resilient QUIC client pulls machine health metrics from a monitoring
//! backend; a broadcast hub fans each [`StatusRecord`] out to every connected
//! dashboard viewer over WebSocket. A plain HTTP endpoint serves point
//! queries for one service's current status.
//!
//! Pipeline: transport client ⇄ backend → status source → hub queue →
//! dispatch loop → N subscribers.

pub mod config;
pub mod errors;
pub mod feed;
pub mod hub;
pub mod server;
pub mod source;
pub mod status;
pub mod transport;

pub use hub::{BroadcastHub, HubConfig};
pub use status::StatusRecord;
pub use transport::{TransportClient, TransportOptions};
