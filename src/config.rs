//! Construction-time configuration.
//!
//! Loaded once at startup from a JSON file (path from `--config` or the
//! `HOSTPULSE_CONFIG` environment variable, defaulting to `hostpulse.json`).
//! A missing file yields the compiled-in defaults; a present-but-invalid file
//! is an error. Nothing re-reads configuration at runtime.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::hub::HubConfig;
use crate::transport::TransportOptions;

pub const DEFAULT_CONFIG_PATH: &str = "hostpulse.json";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub server: ServerConfig,
}

/// Settings for the QUIC connection to the monitoring backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Backend `host:port`.
    pub address: String,
    /// TLS server name presented during the handshake.
    pub server_name: String,
    /// Dial attempts per `connect()` call.
    pub retry_attempts: u32,
    /// Fixed sleep between dial attempts (linear backoff).
    pub retry_delay_ms: u64,
    /// Deadline for one dial attempt, independent of the retry delay.
    pub connect_timeout_ms: u64,
    /// Deadline for one request/response exchange.
    pub request_timeout_ms: u64,
    /// Size of the single-read response buffer. Responses larger than this
    /// are truncated.
    pub read_buffer_size: usize,
    /// Accept any backend certificate. Meant for lab deployments where the
    /// backend uses a self-signed certificate.
    pub insecure_skip_verify: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:4433".into(),
            server_name: "localhost".into(),
            retry_attempts: 3,
            retry_delay_ms: 1_000,
            connect_timeout_ms: 10_000,
            request_timeout_ms: 5_000,
            read_buffer_size: 1024,
            insecure_skip_verify: false,
        }
    }
}

/// Settings for the HTTP/WebSocket surface and the broadcast hub.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Queue depth per subscriber. A subscriber that falls this far behind
    /// starts eating into the dispatch timeout.
    pub subscriber_queue: usize,
    /// How long the dispatch loop waits on one stalled subscriber before
    /// dropping it.
    pub dispatch_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8080,
            subscriber_queue: 64,
            dispatch_timeout_ms: 5_000,
        }
    }
}

impl Config {
    /// Load configuration from `path`, falling back to `HOSTPULSE_CONFIG` and
    /// then to [`DEFAULT_CONFIG_PATH`]. A missing file is not an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let fallback = std::env::var("HOSTPULSE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        let path = path.map(Path::to_path_buf).unwrap_or_else(|| fallback.into());

        if !path.exists() {
            log::info!("no config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn transport_options(&self) -> TransportOptions {
        TransportOptions {
            address: self.backend.address.clone(),
            server_name: self.backend.server_name.clone(),
            retry_attempts: self.backend.retry_attempts,
            retry_delay: Duration::from_millis(self.backend.retry_delay_ms),
            connect_timeout: Duration::from_millis(self.backend.connect_timeout_ms),
            request_timeout: Duration::from_millis(self.backend.request_timeout_ms),
            read_buffer_size: self.backend.read_buffer_size,
            insecure_skip_verify: self.backend.insecure_skip_verify,
        }
    }

    pub fn hub_config(&self) -> HubConfig {
        HubConfig {
            subscriber_queue: self.server.subscriber_queue,
            dispatch_timeout: Duration::from_millis(self.server.dispatch_timeout_ms),
        }
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.server.host, self.server.port);
        addr.parse().map_err(|source| ConfigError::BindAddr { addr, source })
    }
}
