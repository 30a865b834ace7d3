//! Pub/Sub WebSocket Chat Server - Entry Point
//!
//! Loads configuration, creates the shared registry and accepts connections.

use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use pubsub_chat::{handle_connection, Args, Chat, Config, Dispatcher};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=pubsub_chat=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("pubsub_chat=info")),
        )
        .init();

    // Flags fall back to CHAT_* env vars, then to defaults
    let config = Config::from(Args::parse());

    // Start TCP listener
    let listener = TcpListener::bind(&config.addr).await?;
    info!("WebSocket Chat Server listening on {}", config.addr);
    info!(
        "Delivery mode {:?}, queue capacity {}",
        config.delivery.mode, config.delivery.queue_capacity
    );

    // One registry for the whole process, handed to every connection
    let dispatcher = Dispatcher::new(Arc::new(Chat::new(config.delivery)));

    // Connection accept loop
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("New connection from {}", addr);
                let dispatcher = dispatcher.clone();
                let connection = config.connection;

                // Spawn handler task for each connection
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, dispatcher, connection).await {
                        error!("Connection handler error: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
