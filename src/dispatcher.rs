//! Request dispatcher
//!
//! Translates one client request into registry/room operations and a
//! response to the issuing user. Holds no per-request state; every branch
//! that fails a room lookup answers with an error and returns without
//! touching any room.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::chat::Chat;
use crate::error::ChatError;
use crate::protocol::{Action, Request, RequestData, Response};
use crate::user::User;

/// Dispatches requests against a shared `Chat` registry
#[derive(Clone)]
pub struct Dispatcher {
    chat: Arc<Chat>,
}

impl Dispatcher {
    pub fn new(chat: Arc<Chat>) -> Self {
        Self { chat }
    }

    pub fn chat(&self) -> &Arc<Chat> {
        &self.chat
    }

    /// Process a single request
    ///
    /// The returned error is for logging; the user has already been told
    /// about any client-facing failure.
    pub async fn dispatch(&self, request: Option<Request>, user: Option<&Arc<User>>) -> Result<(), ChatError> {
        let Some(request) = request else {
            if let Some(user) = user {
                return reject(user, ChatError::InvalidRequest).await;
            }
            return Err(ChatError::InvalidRequest);
        };
        let Some(user) = user else {
            return Err(ChatError::InvalidUser);
        };

        debug!("User {} requested {:?}", user.id(), request.action);

        if let Action::Unsupported(raw) = &request.action {
            return reject(user, ChatError::UnsupportedAction(raw.clone())).await;
        }

        let Some(data) = request.data else {
            return reject(user, ChatError::InvalidRequest).await;
        };

        match request.action {
            Action::Subscribe => self.handle_subscribe(user, data).await,
            Action::Unsubscribe => self.handle_unsubscribe(user, data).await,
            Action::Send => self.handle_send(user, data).await,
            Action::CreateRoom => self.handle_create_room(user, data).await,
            Action::Unsupported(raw) => reject(user, ChatError::UnsupportedAction(raw)).await,
        }
    }

    /// Handle SUBSCRIBE
    async fn handle_subscribe(&self, user: &Arc<User>, data: RequestData) -> Result<(), ChatError> {
        let room = match self.chat.get_room(&data.room).await {
            Ok(room) => room,
            Err(e) => return reject(user, e).await,
        };

        room.subscribe(user).await
    }

    /// Handle UNSUBSCRIBE
    async fn handle_unsubscribe(&self, user: &Arc<User>, data: RequestData) -> Result<(), ChatError> {
        let room = match self.chat.get_room(&data.room).await {
            Ok(room) => room,
            Err(e) => return reject(user, e).await,
        };

        room.unsubscribe(user).await
    }

    /// Handle SEND
    async fn handle_send(&self, user: &Arc<User>, data: RequestData) -> Result<(), ChatError> {
        if let Err(e) = self.chat.send_message(&data.room, &data.message, user).await {
            return reject(user, e).await;
        }

        user.send_response(&Response::success("Message sent")).await
    }

    /// Handle CREATE_ROOM
    async fn handle_create_room(&self, user: &Arc<User>, data: RequestData) -> Result<(), ChatError> {
        if let Err(e) = self.chat.create_room(&data.room, user).await {
            info!("User {} failed to create room {:?}: {}", user.id(), data.room, e);
            let response = Response::error("Error with room creation").with_cause(&e);
            if let Err(send_err) = user.send_response(&response).await {
                warn!("Could not report failure to user {}: {}", user.id(), send_err);
            }
            return Err(e);
        }

        user.send_response(&Response::success("Room created")).await
    }
}

/// Tell the user about a failure and hand the error back to the caller.
///
/// The caller always gets `err`, even if the user could not be told.
async fn reject(user: &User, err: ChatError) -> Result<(), ChatError> {
    if let Err(send_err) = user.send_response(&Response::from(&err)).await {
        warn!("Could not report failure to user {}: {}", user.id(), send_err);
    }
    Err(err)
}
