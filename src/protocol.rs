//! Wire protocol definitions
//!
//! JSON request/response shapes exchanged with clients. Requests carry an
//! action plus a room payload; every request is answered with a `Response`.

use serde::{Deserialize, Serialize};

use crate::error::ChatError;

/// Client → Server request
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Request {
    pub action: Action,
    /// Absent payloads are rejected with `InvalidRequest`
    pub data: Option<RequestData>,
}

impl Request {
    pub fn new(action: Action, room: impl Into<String>) -> Self {
        Self {
            action,
            data: Some(RequestData {
                room: room.into(),
                message: String::new(),
            }),
        }
    }

    /// Build a SEND request
    pub fn send(room: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            action: Action::Send,
            data: Some(RequestData {
                room: room.into(),
                message: message.into(),
            }),
        }
    }
}

/// Request payload
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RequestData {
    pub room: String,
    /// Only used by SEND
    #[serde(default)]
    pub message: String,
}

/// Requested action
///
/// Accepts either the numeric code (0..=3) or the upper-case name.
/// Anything else decodes to `Unsupported` so the dispatcher can reject it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawAction")]
pub enum Action {
    Subscribe,
    Unsubscribe,
    Send,
    CreateRoom,
    Unsupported(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAction {
    Code(i64),
    Name(String),
    Other(serde_json::Value),
}

impl From<RawAction> for Action {
    fn from(raw: RawAction) -> Self {
        match raw {
            RawAction::Code(0) => Action::Subscribe,
            RawAction::Code(1) => Action::Unsubscribe,
            RawAction::Code(2) => Action::Send,
            RawAction::Code(3) => Action::CreateRoom,
            RawAction::Code(code) => Action::Unsupported(code.to_string()),
            RawAction::Name(name) => match name.as_str() {
                "SUBSCRIBE" => Action::Subscribe,
                "UNSUBSCRIBE" => Action::Unsubscribe,
                "SEND" => Action::Send,
                "CREATE_ROOM" => Action::CreateRoom,
                _ => Action::Unsupported(name),
            },
            RawAction::Other(value) => Action::Unsupported(value.to_string()),
        }
    }
}

/// Response kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseType {
    Success,
    Error,
}

/// Server → Client response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    #[serde(rename = "type")]
    pub kind: ResponseType,
    pub message: String,
    /// Underlying cause, only present on errors that carry one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orig_error: Option<String>,
}

impl Response {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: ResponseType::Success,
            message: message.into(),
            orig_error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: ResponseType::Error,
            message: message.into(),
            orig_error: None,
        }
    }

    /// Attach the underlying cause
    pub fn with_cause(mut self, cause: &ChatError) -> Self {
        self.orig_error = Some(cause.to_string());
        self
    }

    pub fn is_success(&self) -> bool {
        self.kind == ResponseType::Success
    }
}

/// Convert ChatError to a client-facing Response
impl From<&ChatError> for Response {
    fn from(err: &ChatError) -> Self {
        match err {
            ChatError::InvalidRequest => Response::error("Invalid request"),
            ChatError::InvalidUser => Response::error("Invalid user"),
            ChatError::RoomNotFound(_) => Response::error("Room does not exist"),
            ChatError::UnsupportedAction(_) => Response::error("Unsupported action"),
            ChatError::InvalidRoomName(_) => {
                Response::error("Error with room creation").with_cause(err)
            }
            ChatError::DeliveryFailure(_) => {
                Response::error("Message could not be delivered").with_cause(err)
            }
            // Transport and encoding errors are not meant for the client
            _ => Response::error("Internal error"),
        }
    }
}
