//! Status source: the boundary that turns backend bytes into
//! [`StatusRecord`] values.

use async_trait::async_trait;
use serde::Serialize;

use crate::errors::SourceError;
use crate::status::StatusRecord;
use crate::transport::TransportClient;

/// Boundary between the transport layer and the domain. The hub and the HTTP
/// surface only ever see this trait: it either produces a record or fails.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Point lookup of one service's current status. No caching; every call
    /// reaches the backend.
    async fn service_status(&self, service_name: &str) -> Result<StatusRecord, SourceError>;

    /// Decode one broadcast frame received from the backend.
    fn decode_frame(&self, frame: &[u8]) -> Result<StatusRecord, SourceError>;
}

#[derive(Serialize)]
struct StatusQuery<'a> {
    service: &'a str,
}

/// Status source backed by the QUIC transport. Point queries are one JSON
/// request/response exchange; broadcast frames are JSON-encoded records.
pub struct QuicStatusSource {
    transport: TransportClient,
}

impl QuicStatusSource {
    pub fn new(transport: TransportClient) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl StatusSource for QuicStatusSource {
    async fn service_status(&self, service_name: &str) -> Result<StatusRecord, SourceError> {
        let request = serde_json::to_vec(&StatusQuery { service: service_name })?;
        let response = self.transport.send_message(&request).await?;
        self.decode_frame(&response)
    }

    fn decode_frame(&self, frame: &[u8]) -> Result<StatusRecord, SourceError> {
        if frame.is_empty() {
            return Err(SourceError::Backend("empty status payload".into()));
        }
        Ok(serde_json::from_slice(frame)?)
    }
}
