//! WebSocket subscriber lifecycle.
//!
//! One task per upgraded viewer. The socket is output-only by design: the
//! read half exists solely to detect peer close or error, and any inbound
//! application data is discarded. On any failure the subscriber is
//! deregistered; there is no goodbye frame and no reconnect state — a
//! dropped viewer re-upgrades to rejoin.

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, warn};

use crate::hub::BroadcastHub;

pub async fn handle_socket(socket: WebSocket, hub: BroadcastHub) {
    let Ok((id, mut feed)) = hub.register().await else {
        return;
    };
    debug!("subscriber {id} connected");

    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        tokio::select! {
            // Records fanned out by the hub.
            maybe_record = feed.recv() => {
                match maybe_record {
                    Some(record) => {
                        let text = match serde_json::to_string(&*record) {
                            Ok(text) => text,
                            Err(e) => {
                                // Keep the connection; only this frame is lost.
                                error!("subscriber {id}: failed to serialize record: {e}");
                                continue;
                            }
                        };
                        if let Err(e) = ws_tx.send(Message::Text(text)).await {
                            warn!("subscriber {id}: send failed: {e}");
                            break;
                        }
                    }
                    // The hub already dropped us (stalled or shutdown).
                    None => break,
                }
            }

            // Read loop: close/error detection only.
            inbound = ws_rx.next() => {
                match inbound {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("subscriber {id}: closed by peer");
                        break;
                    }
                    Some(Ok(_)) => {} // inbound data discarded
                    Some(Err(e)) => {
                        warn!("subscriber {id}: read error: {e}");
                        break;
                    }
                }
            }
        }
    }

    hub.deregister(id);
    debug!("subscriber {id} disconnected");
}
