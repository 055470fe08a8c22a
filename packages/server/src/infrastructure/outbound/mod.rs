//! Outbound Client Adapter.
//!
//! Used when this process is itself a client of a chat node (the relay API and
//! the CLI client). Socket reads and writes run in two independent tasks joined
//! to the caller by bounded queues, so a slow remote peer never stalls local
//! producers:
//!
//! ```text
//! send() ──► send queue ──► write loop ──► socket
//! messages() ◄── receive queue ◄── read loop ◄── socket
//! ```

mod client;
mod manager;

use std::time::Duration;

use thiserror::Error;

pub use client::OutboundClient;
pub use manager::ClientManager;

/// Timeouts and queue sizes of an outbound client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutboundConfig {
    /// Bound on establishing the WebSocket connection
    pub handshake_timeout: Duration,
    /// Rolling inactivity deadline of the read loop
    pub read_timeout: Duration,
    /// Deadline of a single socket write
    pub write_timeout: Duration,
    /// How long `send` waits for room in the send queue
    pub send_timeout: Duration,
    /// Capacity of both the send and the receive queue
    pub queue_capacity: usize,
}

impl Default for OutboundConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(60),
            write_timeout: Duration::from_secs(10),
            send_timeout: Duration::from_secs(5),
            queue_capacity: 100,
        }
    }
}

/// Lifecycle of an outbound client.
///
/// `Disconnected → Connecting → Connected → Closing → Closed`; a failed
/// connect attempt returns to `Disconnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Disconnected,
    Connecting,
    Connected,
    Closing,
    Closed,
}

/// Outbound client errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OutboundError {
    #[error("client is closed")]
    Closed,

    #[error("send timeout after {0:?}")]
    SendTimeout(Duration),

    #[error("connect timeout after {0:?}")]
    ConnectTimeout(Duration),

    #[error("failed to connect: {0}")]
    Connect(String),

    #[error("cannot connect while {0:?}")]
    InvalidState(ClientState),
}
