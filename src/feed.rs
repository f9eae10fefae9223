//! Pump task: inbound backend streams → decoded records → hub.

use std::sync::Arc;

use log::warn;
use tokio::task::JoinHandle;

use crate::hub::BroadcastHub;
use crate::source::StatusSource;
use crate::transport::TransportClient;

/// Spawn the background task feeding the hub from the backend connection.
///
/// Each accepted stream carries one status frame. Undecodable frames are
/// logged and dropped — a bad producer must not take the feed down. When the
/// connection is gone the task keeps trying to reconnect, pausing for the
/// transport's retry delay between failed rounds, for the life of the
/// process.
pub fn spawn(
    transport: TransportClient,
    source: Arc<dyn StatusSource>,
    hub: BroadcastHub,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match transport.receive_message().await {
                Ok(frame) => match source.decode_frame(&frame) {
                    Ok(record) => hub.publish(record),
                    Err(e) => warn!("discarding undecodable status frame: {e}"),
                },
                Err(e) => {
                    warn!("status feed interrupted: {e}");
                    if !transport.is_connected().await {
                        if let Err(e) = transport.connect().await {
                            warn!("backend unreachable: {e}");
                            tokio::time::sleep(transport.retry_delay().await).await;
                        }
                    }
                }
            }
        }
    })
}
