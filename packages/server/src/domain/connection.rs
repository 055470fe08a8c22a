//! Connection handle and registry entry.
//!
//! A [`ConnectionHandle`] is the registry's view of one live transport. The
//! socket itself is owned by the connection's write task, which drains the
//! paired [`ConnectionOutbox`]; the handle pushes envelopes into that outbox and
//! carries the close signal. Writes to one connection are therefore serialized
//! by a single task, in the order they were delivered.

use std::{fmt, time::Duration};

use dengon_shared::Envelope;
use tokio::sync::mpsc::{self, error::SendTimeoutError};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::{error::TransportError, value_object::UserId};

/// Unique id of one transport-level connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Sending side of a connection.
///
/// Cheap to clone; all clones refer to the same transport.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    outbound: mpsc::Sender<Envelope>,
    closed: CancellationToken,
    write_timeout: Duration,
}

/// Receiving side of a connection, owned by its write task.
#[derive(Debug)]
pub struct ConnectionOutbox {
    receiver: mpsc::Receiver<Envelope>,
    closed: CancellationToken,
}

impl ConnectionHandle {
    /// Create a connection handle with a bounded outbound queue.
    ///
    /// `write_timeout` bounds how long [`deliver`](Self::deliver) waits for
    /// queue capacity before the connection is considered stalled.
    pub fn channel(capacity: usize, write_timeout: Duration) -> (Self, ConnectionOutbox) {
        let (outbound, receiver) = mpsc::channel(capacity.max(1));
        let closed = CancellationToken::new();
        let handle = Self {
            id: ConnectionId::new(),
            outbound,
            closed: closed.clone(),
            write_timeout,
        };
        (handle, ConnectionOutbox { receiver, closed })
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue an envelope for writing to this connection.
    pub async fn deliver(&self, envelope: Envelope) -> Result<(), TransportError> {
        self.deliver_within(envelope, self.write_timeout).await
    }

    /// Like [`deliver`](Self::deliver), with a caller-chosen wait for queue
    /// capacity.
    pub async fn deliver_within(
        &self,
        envelope: Envelope,
        timeout: Duration,
    ) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        self.outbound
            .send_timeout(envelope, timeout)
            .await
            .map_err(|e| match e {
                SendTimeoutError::Timeout(_) => TransportError::WriteTimeout(timeout),
                SendTimeoutError::Closed(_) => TransportError::Closed,
            })
    }

    /// Close the transport. Idempotent.
    pub fn close(&self) {
        self.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled() || self.outbound.is_closed()
    }

    /// Resolves once [`close`](Self::close) has been called on any clone.
    pub async fn closed(&self) {
        self.closed.cancelled().await
    }
}

impl ConnectionOutbox {
    /// Next envelope to write.
    ///
    /// Envelopes queued before the close signal are still returned; `None`
    /// once the connection is closed and drained.
    pub async fn next(&mut self) -> Option<Envelope> {
        tokio::select! {
            biased;
            envelope = self.receiver.recv() => envelope,
            _ = self.closed.cancelled() => None,
        }
    }
}

/// One registered connection: an identity bound to a transport handle.
///
/// Immutable once created; a reconnect removes the entry and adds a new one.
#[derive(Debug, Clone)]
pub struct ConnectionEntry {
    identity: UserId,
    handle: ConnectionHandle,
}

impl ConnectionEntry {
    pub fn new(identity: UserId, handle: ConnectionHandle) -> Self {
        Self { identity, handle }
    }

    pub fn identity(&self) -> &UserId {
        &self.identity
    }

    pub fn handle(&self) -> &ConnectionHandle {
        &self.handle
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.handle.id()
    }
}
