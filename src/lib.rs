//! Room-based Pub/Sub WebSocket Chat Server Library
//!
//! A WebSocket chat server built with tokio-tungstenite around a shared
//! room registry and a pub/sub broadcast engine.
//!
//! # Features
//! - Room creation (idempotent per name)
//! - Subscribe / unsubscribe
//! - Fan-out of published messages to all current subscribers
//! - Per-room message history
//! - Synchronous or batched delivery
//! - Disconnect cleanup
//!
//! # Architecture
//! Shared state behind reader/writer locks:
//! - `Chat` is the registry of rooms and users, shared by `Arc`
//! - Each `Room` guards its own subscribers and history, so rooms never
//!   contend with each other
//! - Each connection runs a read task that feeds the `Dispatcher` serially
//!   and a write task that drains the user's outbound frame channel
//!
//! # Example
//! ```ignore
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//! use pubsub_chat::{handle_connection, Chat, Config, Dispatcher};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::default();
//!     let listener = TcpListener::bind(&config.addr).await.unwrap();
//!     let dispatcher = Dispatcher::new(Arc::new(Chat::new(config.delivery)));
//!
//!     while let Ok((stream, _)) = listener.accept().await {
//!         tokio::spawn(handle_connection(stream, dispatcher.clone(), config.connection));
//!     }
//! }
//! ```

pub mod chat;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod message;
pub mod protocol;
pub mod room;
pub mod types;
pub mod user;

// Re-export main types for convenience
pub use chat::Chat;
pub use config::{Args, Config, ConnectionConfig, DeliveryConfig, DeliveryMode};
pub use dispatcher::Dispatcher;
pub use error::{ChatError, SendError};
pub use handler::handle_connection;
pub use message::Message;
pub use protocol::{Action, Request, RequestData, Response, ResponseType};
pub use room::{DeliveryReport, Room};
pub use types::{MessageId, UserId};
pub use user::User;
