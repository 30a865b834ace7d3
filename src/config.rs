//! Server configuration
//!
//! `Args` is the command-line surface (clap); every option can also be set
//! through a `CHAT_*` environment variable. `Config` and its parts are the
//! settings handed to the registry and to each connection.

use std::time::Duration;

use clap::builder::RangedU64ValueParser;
use clap::{Parser, ValueEnum};

/// Default server address
const DEFAULT_ADDR: &str = "127.0.0.1:8080";

/// How a room hands published messages to its subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum DeliveryMode {
    /// Publisher delivers inline and waits for every subscriber send
    #[default]
    #[value(name = "sync", alias = "synchronous")]
    Synchronous,
    /// Publisher enqueues; a per-room task flushes batches
    #[value(name = "batched", alias = "async")]
    Batched,
}

/// Command-line arguments for the chat server.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(author, version, about = "Room-based pub/sub WebSocket chat server", long_about = None)]
pub struct Args {
    /// Address to bind the WebSocket listener to.
    #[arg(env = "CHAT_ADDR", default_value = DEFAULT_ADDR)]
    pub addr: String,

    /// Delivery discipline for new rooms.
    #[arg(long, env = "CHAT_DELIVERY", value_enum, default_value_t = DeliveryMode::Synchronous)]
    pub delivery: DeliveryMode,

    /// Capacity of each room's batched delivery queue.
    #[arg(
        long,
        env = "CHAT_QUEUE_CAPACITY",
        default_value_t = 10,
        value_parser = RangedU64ValueParser::<usize>::new().range(1..)
    )]
    pub queue_capacity: usize,

    /// Pause between batch flushes, in milliseconds.
    #[arg(long, env = "CHAT_FLUSH_INTERVAL_MS", default_value_t = 1000)]
    pub flush_interval_ms: u64,

    /// How long a publisher blocks on a full queue, in milliseconds.
    #[arg(long, env = "CHAT_ENQUEUE_TIMEOUT_MS", default_value_t = 5000)]
    pub enqueue_timeout_ms: u64,

    /// Upper bound on a single send to one user, in milliseconds.
    #[arg(long, env = "CHAT_SEND_TIMEOUT_MS", default_value_t = 2000)]
    pub send_timeout_ms: u64,

    /// Buffer size of each connection's outbound frame channel.
    #[arg(
        long,
        env = "CHAT_OUTBOUND_BUFFER",
        default_value_t = 32,
        value_parser = RangedU64ValueParser::<usize>::new().range(1..)
    )]
    pub outbound_buffer: usize,
}

/// Per-room delivery settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryConfig {
    pub mode: DeliveryMode,
    /// Capacity of the batched delivery queue
    pub queue_capacity: usize,
    /// Pause between batch flushes
    pub flush_interval: Duration,
    /// How long a publisher blocks on a full queue before failing
    pub enqueue_timeout: Duration,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            mode: DeliveryMode::default(),
            queue_capacity: 10,
            flush_interval: Duration::from_secs(1),
            enqueue_timeout: Duration::from_secs(5),
        }
    }
}

impl DeliveryConfig {
    /// Batched delivery with default queue settings
    pub fn batched() -> Self {
        Self {
            mode: DeliveryMode::Batched,
            ..Self::default()
        }
    }
}

/// Per-connection settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Buffer size of the server → client frame channel
    pub outbound_buffer: usize,
    /// Upper bound on a single send to one user
    pub send_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            outbound_buffer: 32,
            send_timeout: Duration::from_secs(2),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub addr: String,
    pub delivery: DeliveryConfig,
    pub connection: ConnectionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            delivery: DeliveryConfig::default(),
            connection: ConnectionConfig::default(),
        }
    }
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Self {
            addr: args.addr,
            delivery: DeliveryConfig {
                mode: args.delivery,
                queue_capacity: args.queue_capacity,
                flush_interval: Duration::from_millis(args.flush_interval_ms),
                enqueue_timeout: Duration::from_millis(args.enqueue_timeout_ms),
            },
            connection: ConnectionConfig {
                outbound_buffer: args.outbound_buffer,
                send_timeout: Duration::from_millis(args.send_timeout_ms),
            },
        }
    }
}
