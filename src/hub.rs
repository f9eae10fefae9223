//! Broadcast hub: single fan-out point from "one record produced" to "all
//! live subscribers notified".
//!
//! The subscriber set is owned by one dispatch task. Registration,
//! deregistration and publishes all travel over the same command queue, so
//! set mutation is serialized with dispatch and no lock is needed. Records
//! are delivered to each subscriber through a bounded per-subscriber queue;
//! a subscriber that cannot drain its queue within the dispatch timeout is
//! dropped, and its failure is never visible to the publisher or to other
//! subscribers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use thiserror::Error;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::sync::{mpsc, oneshot};

use crate::status::StatusRecord;

/// Identity of one registered subscriber.
pub type SubscriberId = u64;

#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Queue depth per subscriber.
    pub subscriber_queue: usize,
    /// Patience for one stalled subscriber during a dispatch pass.
    pub dispatch_timeout: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            subscriber_queue: 64,
            dispatch_timeout: Duration::from_secs(5),
        }
    }
}

/// The dispatch task has stopped; only possible once the process is shutting
/// down and the hub handles are being dropped.
#[derive(Debug, Error)]
#[error("hub dispatch loop stopped")]
pub struct HubStopped;

enum Command {
    Register {
        reply: oneshot::Sender<(SubscriberId, mpsc::Receiver<Arc<StatusRecord>>)>,
    },
    Deregister {
        id: SubscriberId,
    },
    Publish {
        record: Arc<StatusRecord>,
    },
    SubscriberCount {
        reply: oneshot::Sender<usize>,
    },
}

/// Cloneable handle to the dispatch task.
#[derive(Clone)]
pub struct BroadcastHub {
    commands: mpsc::UnboundedSender<Command>,
}

impl BroadcastHub {
    /// Start the dispatch task and return a handle to it. The task runs until
    /// every handle has been dropped.
    pub fn spawn(config: HubConfig) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        tokio::spawn(dispatch_loop(config, rx));
        Self { commands }
    }

    /// Add a subscriber and get its record feed. The subscriber stays in the
    /// set until it is deregistered or fails a delivery; once removed, its
    /// receiver yields `None`.
    pub async fn register(&self) -> Result<(SubscriberId, mpsc::Receiver<Arc<StatusRecord>>), HubStopped> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Register { reply })
            .map_err(|_| HubStopped)?;
        rx.await.map_err(|_| HubStopped)
    }

    /// Remove a subscriber. Removal drops the hub side of its queue, which
    /// closes the feed — removal and closing are one step.
    pub fn deregister(&self, id: SubscriberId) {
        let _ = self.commands.send(Command::Deregister { id });
    }

    /// Enqueue a record for fan-out. Never blocks on subscriber I/O; records
    /// are dispatched in publish order by the single dispatch task.
    pub fn publish(&self, record: StatusRecord) {
        if self.commands.send(Command::Publish { record: Arc::new(record) }).is_err() {
            warn!("hub stopped, dropping status record");
        }
    }

    /// Number of currently registered subscribers.
    pub async fn subscriber_count(&self) -> usize {
        let (reply, rx) = oneshot::channel();
        if self.commands.send(Command::SubscriberCount { reply }).is_err() {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

async fn dispatch_loop(config: HubConfig, mut commands: mpsc::UnboundedReceiver<Command>) {
    let mut subscribers: HashMap<SubscriberId, mpsc::Sender<Arc<StatusRecord>>> = HashMap::new();
    let mut next_id: SubscriberId = 1;

    while let Some(command) = commands.recv().await {
        match command {
            Command::Register { reply } => {
                let id = next_id;
                next_id += 1;
                let (tx, rx) = mpsc::channel(config.subscriber_queue);
                // Only track the subscriber if the caller is still there to
                // take the receiving end.
                if reply.send((id, rx)).is_ok() {
                    subscribers.insert(id, tx);
                    debug!("subscriber {id} registered ({} active)", subscribers.len());
                }
            }
            Command::Deregister { id } => {
                if subscribers.remove(&id).is_some() {
                    debug!("subscriber {id} deregistered ({} active)", subscribers.len());
                }
            }
            Command::Publish { record } => {
                let mut failed: Vec<SubscriberId> = Vec::new();
                for (id, tx) in subscribers.iter() {
                    match tx.send_timeout(record.clone(), config.dispatch_timeout).await {
                        Ok(()) => {}
                        Err(SendTimeoutError::Timeout(_)) => {
                            warn!(
                                "subscriber {id} stalled past {:?}, dropping it",
                                config.dispatch_timeout
                            );
                            failed.push(*id);
                        }
                        Err(SendTimeoutError::Closed(_)) => {
                            debug!("subscriber {id} gone, dropping it");
                            failed.push(*id);
                        }
                    }
                }
                for id in failed {
                    subscribers.remove(&id);
                }
            }
            Command::SubscriberCount { reply } => {
                let _ = reply.send(subscribers.len());
            }
        }
    }
}
