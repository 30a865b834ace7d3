//! Room implementation
//!
//! A room is a named broadcast group: a subscriber set, an append-only
//! history and a delivery mechanism. Delivery is either synchronous (the
//! publisher fans out inline) or batched through a bounded queue drained
//! by a per-room background task.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};

use crate::config::{DeliveryConfig, DeliveryMode};
use crate::error::{ChatError, SendError};
use crate::message::Message;
use crate::protocol::Response;
use crate::types::UserId;
use crate::user::User;

/// Outcome of delivering one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Subscribers present when the message was committed
    pub recipients: usize,
    /// Subscribers whose send failed
    pub failed: usize,
}

enum Delivery {
    Synchronous,
    Batched {
        queue: mpsc::Sender<Message>,
        enqueue_timeout: Duration,
    },
}

/// Chat room
pub struct Room {
    /// Room name, unique within the registry
    name: String,
    /// Current subscribers keyed by identity
    subscribers: RwLock<HashMap<UserId, Arc<User>>>,
    /// Delivered messages in commit order
    history: RwLock<Vec<Message>>,
    delivery: Delivery,
}

impl Room {
    /// Create a room with `creator` as its only subscriber.
    ///
    /// In batched mode this spawns the room's delivery loop, so it must be
    /// called from within a tokio runtime.
    pub fn new(name: impl Into<String>, creator: Arc<User>, config: &DeliveryConfig) -> Arc<Self> {
        let name = name.into();
        let mut subscribers = HashMap::new();
        subscribers.insert(creator.id(), creator);

        match config.mode {
            DeliveryMode::Synchronous => Arc::new(Self {
                name,
                subscribers: RwLock::new(subscribers),
                history: RwLock::new(Vec::new()),
                delivery: Delivery::Synchronous,
            }),
            DeliveryMode::Batched => {
                let (queue, receiver) = mpsc::channel(config.queue_capacity);
                let room = Arc::new(Self {
                    name,
                    subscribers: RwLock::new(subscribers),
                    history: RwLock::new(Vec::new()),
                    delivery: Delivery::Batched {
                        queue,
                        enqueue_timeout: config.enqueue_timeout,
                    },
                });
                tokio::spawn(run_batcher(
                    Arc::downgrade(&room),
                    room.name.clone(),
                    receiver,
                    config.queue_capacity,
                    config.flush_interval,
                ));
                room
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn delivery_mode(&self) -> DeliveryMode {
        match self.delivery {
            Delivery::Synchronous => DeliveryMode::Synchronous,
            Delivery::Batched { .. } => DeliveryMode::Batched,
        }
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    pub async fn is_subscribed(&self, user_id: UserId) -> bool {
        self.subscribers.read().await.contains_key(&user_id)
    }

    /// Snapshot of the delivered messages
    pub async fn history(&self) -> Vec<Message> {
        self.history.read().await.clone()
    }

    pub async fn history_len(&self) -> usize {
        self.history.read().await.len()
    }

    /// Add a subscriber and confirm to them.
    ///
    /// Idempotent for the set; the confirmation is sent on every call.
    pub async fn subscribe(&self, user: &Arc<User>) -> Result<(), ChatError> {
        {
            let mut subscribers = self.subscribers.write().await;
            if !subscribers.contains_key(&user.id()) {
                user.track_room(&self.name).await;
                subscribers.insert(user.id(), Arc::clone(user));
                debug!("User {} subscribed to room {}", user.id(), self.name);
            }
        }

        user.send_response(&Response::success(format!("Subscribed to room {}", self.name)))
            .await
    }

    /// Remove a subscriber and confirm to them.
    ///
    /// Unsubscribing a non-subscriber is not an error.
    pub async fn unsubscribe(&self, user: &Arc<User>) -> Result<(), ChatError> {
        if self.remove_subscriber(user.id()).await {
            user.untrack_room(&self.name).await;
            debug!("User {} unsubscribed from room {}", user.id(), self.name);
        }

        user.send_response(&Response::success(format!(
            "Unsubscribed from room {}",
            self.name
        )))
        .await
    }

    /// Remove a subscriber without notifying them.
    ///
    /// Returns true if the user was subscribed.
    pub async fn remove_subscriber(&self, user_id: UserId) -> bool {
        self.subscribers.write().await.remove(&user_id).is_some()
    }

    /// Hand a message to the room's delivery mechanism.
    ///
    /// Synchronous rooms deliver before returning. Batched rooms enqueue
    /// and return; a full queue blocks up to the enqueue timeout and then
    /// fails with `DeliveryFailure`.
    ///
    /// Returns the delivery report when delivery happened inline, `None`
    /// when the message was only queued.
    pub async fn publish(&self, message: Message) -> Result<Option<DeliveryReport>, ChatError> {
        match &self.delivery {
            Delivery::Synchronous => {
                let report = self.deliver(message).await?;
                self.log_partial(&report);
                Ok(Some(report))
            }
            Delivery::Batched {
                queue,
                enqueue_timeout,
            } => {
                queue
                    .send_timeout(message, *enqueue_timeout)
                    .await
                    .map_err(SendError::from)?;
                Ok(None)
            }
        }
    }

    /// Append a message to history and send it to every current subscriber.
    ///
    /// The subscriber set is copied out before any send, so no lock is held
    /// across I/O. A failed send to one subscriber is logged and skipped.
    pub async fn deliver(&self, message: Message) -> Result<DeliveryReport, ChatError> {
        let frame = serde_json::to_string(&message)?;
        let message_id = message.id();

        let recipients: Vec<Arc<User>> = {
            let mut history = self.history.write().await;
            let subscribers = self.subscribers.read().await;
            history.push(message);
            subscribers.values().cloned().collect()
        };

        let mut report = DeliveryReport {
            recipients: recipients.len(),
            failed: 0,
        };

        for user in recipients {
            if let Err(e) = user.send_frame(frame.clone()).await {
                warn!(
                    "Failed to deliver message {} to user {} in room {}: {}",
                    message_id,
                    user.id(),
                    self.name,
                    e
                );
                report.failed += 1;
            }
        }

        debug!(
            "Delivered message {} in room {} to {}/{} subscribers",
            message_id,
            self.name,
            report.recipients - report.failed,
            report.recipients
        );

        Ok(report)
    }

    async fn flush(&self, batch: &mut Vec<Message>) {
        debug!("Flushing {} messages in room {}", batch.len(), self.name);
        for message in batch.drain(..) {
            match self.deliver(message).await {
                Ok(report) => self.log_partial(&report),
                Err(e) => warn!("Problem during batch delivery in room {}: {}", self.name, e),
            }
        }
    }

    fn log_partial(&self, report: &DeliveryReport) {
        if report.failed > 0 {
            warn!(
                "Room {}: {} of {} subscribers missed a message",
                self.name, report.failed, report.recipients
            );
        }
    }
}

/// Per-room delivery loop for batched rooms.
///
/// Drains the queue into a batch; once the queue is momentarily empty (or
/// the batch reaches the queue capacity) the batch is delivered in drain
/// order. Sleeps `flush_interval` whenever the queue is empty. Stops when
/// the room is dropped.
async fn run_batcher(
    room: Weak<Room>,
    name: String,
    mut queue: mpsc::Receiver<Message>,
    max_batch: usize,
    flush_interval: Duration,
) {
    debug!("Delivery loop for room {} started", name);
    let mut batch = Vec::with_capacity(max_batch);

    loop {
        match queue.try_recv() {
            Ok(message) => {
                batch.push(message);
                if batch.len() >= max_batch {
                    let Some(room) = room.upgrade() else {
                        break;
                    };
                    room.flush(&mut batch).await;
                }
            }
            Err(TryRecvError::Empty) => {
                if !batch.is_empty() {
                    let Some(room) = room.upgrade() else {
                        break;
                    };
                    room.flush(&mut batch).await;
                }
                tokio::time::sleep(flush_interval).await;
            }
            Err(TryRecvError::Disconnected) => break,
        }
    }

    debug!("Delivery loop for room {} stopped", name);
}
