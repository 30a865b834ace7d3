//! Error types for the chat server
//!
//! Defines dispatch-level errors and outbound send errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Application-level errors
///
/// Dispatch errors (`RoomNotFound`, `UnsupportedAction`, ...) are reported
/// to the issuing user and returned for logging; they never close the
/// connection. Transport errors (`WebSocket`, `Io`) end the connection.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Request was absent or could not be decoded
    #[error("Invalid request")]
    InvalidRequest,

    /// No user is bound to the connection
    #[error("Invalid user")]
    InvalidUser,

    /// Lookup against an unknown room name
    #[error("Room {0} does not exist")]
    RoomNotFound(String),

    /// Unrecognized action code
    #[error("Unsupported action: {0}")]
    UnsupportedAction(String),

    /// Room name rejected at creation
    #[error("Invalid room name: {0:?}")]
    InvalidRoomName(String),

    /// Outbound send or enqueue failed
    #[error("Delivery failure: {0}")]
    DeliveryFailure(#[from] SendError),

    /// Response or message could not be serialized
    #[error("Encoding failure: {0}")]
    Encoding(#[from] serde_json::Error),

    /// WebSocket protocol error (fatal)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// IO error (fatal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Message send errors
///
/// Occurs when a bounded channel cannot accept a message.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,

    /// The channel stayed full for the whole send timeout
    #[error("Send timed out")]
    Timeout,
}

impl<T> From<tokio::sync::mpsc::error::SendTimeoutError<T>> for SendError {
    fn from(err: tokio::sync::mpsc::error::SendTimeoutError<T>) -> Self {
        match err {
            tokio::sync::mpsc::error::SendTimeoutError::Timeout(_) => SendError::Timeout,
            tokio::sync::mpsc::error::SendTimeoutError::Closed(_) => SendError::ChannelClosed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_not_found_display() {
        let err = ChatError::RoomNotFound("general".to_string());
        assert_eq!(err.to_string(), "Room general does not exist");
    }

    #[test]
    fn test_send_error_converts() {
        let err: ChatError = SendError::Timeout.into();
        assert!(matches!(err, ChatError::DeliveryFailure(SendError::Timeout)));
    }
}
