//! Command-line / environment configuration of the chat server.
//!
//! Every option can also be set through a `DENGON_*` environment variable.

use std::time::Duration;

use clap::Parser;

use crate::{infrastructure::outbound::OutboundConfig, usecase::HubConfig};

#[derive(Parser, Debug, Clone)]
#[command(name = "dengon-server")]
#[command(about = "Real-time chat routing server", long_about = None)]
pub struct ServerArgs {
    /// Host address to bind the server to
    #[arg(short = 'H', long, env = "DENGON_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, env = "DENGON_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Base URL of the message store (persistence + history).
    /// Messages are kept in memory when omitted.
    #[arg(long, env = "DENGON_STORE_URL")]
    pub store_url: Option<String>,

    /// Timeout of a single request to the message store, in milliseconds
    #[arg(long, env = "DENGON_STORE_TIMEOUT_MS", default_value_t = 3000)]
    pub store_timeout_ms: u64,

    /// Capacity of the chat delivery queue
    #[arg(long, env = "DENGON_CHAT_QUEUE_CAPACITY", default_value_t = 100)]
    pub chat_queue_capacity: usize,

    /// Capacity of the durability queue
    #[arg(long, env = "DENGON_DURABILITY_QUEUE_CAPACITY", default_value_t = 100)]
    pub durability_queue_capacity: usize,

    /// Capacity of each connection's outbound queue
    #[arg(long, env = "DENGON_CONNECTION_QUEUE_CAPACITY", default_value_t = 100)]
    pub connection_queue_capacity: usize,

    /// Write deadline for a connection, in seconds
    #[arg(long, env = "DENGON_WRITE_TIMEOUT_SECS", default_value_t = 10)]
    pub write_timeout_secs: u64,

    /// How long chat delivery waits on a receiver's full outbox, in milliseconds
    #[arg(long, env = "DENGON_DELIVERY_TIMEOUT_MS", default_value_t = 250)]
    pub delivery_timeout_ms: u64,

    /// Keepalive ping interval on client connections, in seconds
    #[arg(long, env = "DENGON_PING_INTERVAL_SECS", default_value_t = 30)]
    pub ping_interval_secs: u64,

    /// Maximum number of concurrent saves to the message store
    #[arg(long, env = "DENGON_MAX_IN_FLIGHT_SAVES", default_value_t = 32)]
    pub max_in_flight_saves: usize,

    /// Grace period for draining queues on shutdown, in seconds
    #[arg(long, env = "DENGON_SHUTDOWN_GRACE_SECS", default_value_t = 5)]
    pub shutdown_grace_secs: u64,

    /// Chat node the relay API connects its clients to
    #[arg(long, env = "DENGON_RELAY_UPSTREAM", default_value = "ws://127.0.0.1:8080/ws")]
    pub relay_upstream: String,

    /// Relay client handshake timeout, in seconds
    #[arg(long, env = "DENGON_RELAY_HANDSHAKE_TIMEOUT_SECS", default_value_t = 10)]
    pub relay_handshake_timeout_secs: u64,

    /// Relay client read deadline, in seconds
    #[arg(long, env = "DENGON_RELAY_READ_TIMEOUT_SECS", default_value_t = 60)]
    pub relay_read_timeout_secs: u64,

    /// Relay client write deadline, in seconds
    #[arg(long, env = "DENGON_RELAY_WRITE_TIMEOUT_SECS", default_value_t = 10)]
    pub relay_write_timeout_secs: u64,

    /// Relay client send timeout, in seconds
    #[arg(long, env = "DENGON_RELAY_SEND_TIMEOUT_SECS", default_value_t = 5)]
    pub relay_send_timeout_secs: u64,

    /// Relay client send / receive queue capacity
    #[arg(long, env = "DENGON_RELAY_QUEUE_CAPACITY", default_value_t = 100)]
    pub relay_queue_capacity: usize,
}

impl ServerArgs {
    pub fn hub_config(&self) -> HubConfig {
        HubConfig {
            chat_queue_capacity: self.chat_queue_capacity,
            durability_queue_capacity: self.durability_queue_capacity,
            connection_queue_capacity: self.connection_queue_capacity,
            write_timeout: Duration::from_secs(self.write_timeout_secs),
            delivery_timeout: Duration::from_millis(self.delivery_timeout_ms),
            ping_interval: Duration::from_secs(self.ping_interval_secs.max(1)),
            max_in_flight_saves: self.max_in_flight_saves,
            shutdown_grace: Duration::from_secs(self.shutdown_grace_secs),
        }
    }

    pub fn outbound_config(&self) -> OutboundConfig {
        OutboundConfig {
            handshake_timeout: Duration::from_secs(self.relay_handshake_timeout_secs),
            read_timeout: Duration::from_secs(self.relay_read_timeout_secs),
            write_timeout: Duration::from_secs(self.relay_write_timeout_secs),
            send_timeout: Duration::from_secs(self.relay_send_timeout_secs),
            queue_capacity: self.relay_queue_capacity,
        }
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}
