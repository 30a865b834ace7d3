//! User struct definition
//!
//! Represents a connected client: identity, liveness and the channel
//! used to push encoded frames to its connection.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, Mutex, RwLock};

use crate::error::{ChatError, SendError};
use crate::protocol::Response;
use crate::types::UserId;

/// Connected user
///
/// Shared as `Arc<User>` between its connection, the registry and the
/// rooms it subscribed to.
#[derive(Debug)]
pub struct User {
    /// Unique identifier for this user
    id: UserId,
    /// Last time an inbound frame was seen
    last_alive: RwLock<DateTime<Utc>>,
    /// Server → Client channel of encoded JSON frames
    sender: mpsc::Sender<String>,
    /// Upper bound for a single send
    send_timeout: Duration,
    /// Names of rooms this user is subscribed to
    subscriptions: Mutex<HashSet<String>>,
}

impl User {
    /// Create a new user with a fresh ID
    pub fn new(sender: mpsc::Sender<String>, send_timeout: Duration) -> Self {
        Self::with_id(UserId::new(), sender, send_timeout)
    }

    pub fn with_id(id: UserId, sender: mpsc::Sender<String>, send_timeout: Duration) -> Self {
        Self {
            id,
            last_alive: RwLock::new(Utc::now()),
            sender,
            send_timeout,
            subscriptions: Mutex::new(HashSet::new()),
        }
    }

    pub fn id(&self) -> UserId {
        self.id
    }

    /// Refresh the liveness timestamp
    pub async fn touch(&self) {
        *self.last_alive.write().await = Utc::now();
    }

    pub async fn last_alive(&self) -> DateTime<Utc> {
        *self.last_alive.read().await
    }

    /// Send an already-encoded frame to this user
    ///
    /// Fails if the connection is gone or its buffer stays full for the
    /// whole send timeout.
    pub async fn send_frame(&self, frame: String) -> Result<(), SendError> {
        self.sender
            .send_timeout(frame, self.send_timeout)
            .await
            .map_err(SendError::from)
    }

    /// Encode and send a response
    pub async fn send_response(&self, response: &Response) -> Result<(), ChatError> {
        let frame = serde_json::to_string(response)?;
        self.send_frame(frame).await?;
        Ok(())
    }

    /// Room names this user is currently subscribed to
    pub async fn subscribed_rooms(&self) -> Vec<String> {
        let mut rooms: Vec<String> = self.subscriptions.lock().await.iter().cloned().collect();
        rooms.sort();
        rooms
    }

    pub(crate) async fn track_room(&self, room: &str) {
        self.subscriptions.lock().await.insert(room.to_string());
    }

    pub(crate) async fn untrack_room(&self, room: &str) {
        self.subscriptions.lock().await.remove(room);
    }

    /// Drain the subscription index (used on disconnect)
    pub(crate) async fn take_subscriptions(&self) -> HashSet<String> {
        std::mem::take(&mut *self.subscriptions.lock().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::chat::Chat;

    #[tokio::test]
    async fn test_user_creation() {
        let (tx, _rx) = mpsc::channel(32);
        let before = Utc::now();
        let user = User::new(tx, Duration::from_millis(50));

        assert!(user.last_alive().await >= before);
        assert!(user.subscribed_rooms().await.is_empty());
    }

    #[tokio::test]
    async fn test_touch_refreshes_last_alive() {
        let (tx, _rx) = mpsc::channel(32);
        let user = User::new(tx, Duration::from_millis(50));
        let first = user.last_alive().await;

        tokio::time::sleep(Duration::from_millis(5)).await;
        user.touch().await;

        assert!(user.last_alive().await > first);
    }

    #[tokio::test]
    async fn test_send_response_encodes_json() {
        let (tx, mut rx) = mpsc::channel(32);
        let user = User::new(tx, Duration::from_millis(50));

        user.send_response(&Response::success("Room created"))
            .await
            .unwrap();

        let frame = rx.recv().await.unwrap();
        let resp: Response = serde_json::from_str(&frame).unwrap();
        assert!(resp.is_success());
        assert_eq!(resp.message, "Room created");
    }

    #[tokio::test]
    async fn test_send_to_closed_channel() {
        let (tx, rx) = mpsc::channel(32);
        let user = User::new(tx, Duration::from_millis(50));
        drop(rx);

        assert_eq!(
            user.send_frame("x".to_string()).await,
            Err(SendError::ChannelClosed)
        );
    }

    #[tokio::test]
    async fn test_send_to_full_channel_times_out() {
        let (tx, _rx) = mpsc::channel(1);
        let user = User::new(tx, Duration::from_millis(20));

        user.send_frame("first".to_string()).await.unwrap();
        assert_eq!(
            user.send_frame("second".to_string()).await,
            Err(SendError::Timeout)
        );
    }

    #[tokio::test]
    async fn test_subscription_index() {
        let (tx, _rx) = mpsc::channel(32);
        let user = User::new(tx, Duration::from_millis(50));

        user.track_room("b").await;
        user.track_room("a").await;
        user.track_room("a").await;
        assert_eq!(user.subscribed_rooms().await, vec!["a", "b"]);

        user.untrack_room("b").await;
        assert_eq!(user.take_subscriptions().await.len(), 1);
        assert!(user.subscribed_rooms().await.is_empty());
    }

    fn registered_user() -> (Arc<User>, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(32);
        (Arc::new(User::new(tx, Duration::from_millis(50))), rx)
    }

    #[tokio::test]
    async fn test_interrupted_create_room_leaves_no_stale_subscriber() {
        let chat = Arc::new(Chat::default());
        let (alice, _rx) = registered_user();
        chat.register_user(Arc::clone(&alice)).await;

        // Stall create_room on the subscription index, then cancel it
        let index = alice.subscriptions.lock().await;
        let task = {
            let chat = Arc::clone(&chat);
            let alice = Arc::clone(&alice);
            tokio::spawn(async move { chat.create_room("general", &alice).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        task.abort();
        let _ = task.await;
        drop(index);

        chat.on_disconnect(alice.id()).await;

        match chat.get_room("general").await {
            Ok(room) => assert!(!room.is_subscribed(alice.id()).await),
            Err(e) => assert!(matches!(e, ChatError::RoomNotFound(_))),
        }
        assert_eq!(chat.room_count().await, 0);
    }

    #[tokio::test]
    async fn test_interrupted_subscribe_leaves_no_stale_subscriber() {
        let chat = Chat::default();
        let (alice, _a) = registered_user();
        let (bob, _b) = registered_user();
        chat.register_user(Arc::clone(&bob)).await;
        let room = chat.create_room("general", &alice).await.unwrap();

        let index = bob.subscriptions.lock().await;
        let task = {
            let room = Arc::clone(&room);
            let bob = Arc::clone(&bob);
            tokio::spawn(async move { room.subscribe(&bob).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        task.abort();
        let _ = task.await;
        drop(index);

        chat.on_disconnect(bob.id()).await;

        assert!(!room.is_subscribed(bob.id()).await);
        assert_eq!(room.subscriber_count().await, 1);
    }
}
