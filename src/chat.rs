//! Chat registry
//!
//! Process-wide mapping from room name to `Room` and from user identity to
//! `User`. Created once at startup and shared by `Arc` with every
//! connection. Lookups take a shared lock; inserts take the exclusive lock
//! and check-then-insert under it, so a name never maps to two rooms.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::DeliveryConfig;
use crate::error::ChatError;
use crate::message::Message;
use crate::room::Room;
use crate::types::UserId;
use crate::user::User;

/// Longest accepted room name, in characters
const MAX_ROOM_NAME_LEN: usize = 64;

/// The room/user registry
pub struct Chat {
    /// All rooms: name -> Room
    rooms: RwLock<HashMap<String, Arc<Room>>>,
    /// All connected users: UserId -> User
    users: RwLock<HashMap<UserId, Arc<User>>>,
    /// Delivery settings applied to new rooms
    delivery: DeliveryConfig,
}

impl Chat {
    pub fn new(delivery: DeliveryConfig) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            users: RwLock::new(HashMap::new()),
            delivery,
        }
    }

    /// Create a room, or return the existing one under that name.
    ///
    /// A new room starts with `creator` as its only subscriber. An existing
    /// room is returned unchanged.
    pub async fn create_room(&self, name: &str, creator: &Arc<User>) -> Result<Arc<Room>, ChatError> {
        let name = validate_room_name(name)?;

        let room = {
            let mut rooms = self.rooms.write().await;
            if let Some(room) = rooms.get(name) {
                debug!("Room {} already exists", name);
                return Ok(Arc::clone(room));
            }

            // Index first: an interrupted create leaves at most an index
            // entry, which disconnect cleanup tolerates
            creator.track_room(name).await;
            let room = Room::new(name, Arc::clone(creator), &self.delivery);
            rooms.insert(name.to_string(), Arc::clone(&room));
            room
        };

        info!("User {} created room {}", creator.id(), name);
        Ok(room)
    }

    /// Get a room by name
    pub async fn get_room(&self, name: &str) -> Result<Arc<Room>, ChatError> {
        self.rooms
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| ChatError::RoomNotFound(name.to_string()))
    }

    /// Publish a message from `sender` to the named room
    pub async fn send_message(&self, room_name: &str, body: &str, sender: &User) -> Result<(), ChatError> {
        let room = self.get_room(room_name).await?;
        let message = Message::new(sender.id(), body);
        debug!("User {} publishing {} to room {}", sender.id(), message.id(), room_name);
        room.publish(message).await?;
        Ok(())
    }

    /// Register a newly connected user
    pub async fn register_user(&self, user: Arc<User>) {
        let mut users = self.users.write().await;
        users.insert(user.id(), user);
        debug!("Total users: {}", users.len());
    }

    pub async fn get_user(&self, id: UserId) -> Option<Arc<User>> {
        self.users.read().await.get(&id).cloned()
    }

    /// Remove a departing user from the registry and from every room it
    /// subscribed to.
    pub async fn on_disconnect(&self, id: UserId) {
        let Some(user) = self.users.write().await.remove(&id) else {
            return;
        };

        let room_names = user.take_subscriptions().await;
        for name in &room_names {
            if let Ok(room) = self.get_room(name).await {
                room.remove_subscriber(id).await;
            }
        }

        info!("User {} removed from registry and {} rooms", id, room_names.len());
    }

    pub async fn user_count(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}

impl Default for Chat {
    fn default() -> Self {
        Self::new(DeliveryConfig::default())
    }
}

fn validate_room_name(name: &str) -> Result<&str, ChatError> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.chars().count() > MAX_ROOM_NAME_LEN {
        return Err(ChatError::InvalidRoomName(name.to_string()));
    }
    Ok(trimmed)
}
