//! A single outbound chat client with independent read and write loops.

use std::sync::{Arc, Mutex, MutexGuard};

use dengon_shared::Envelope;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{Error as WsError, protocol::Message},
};
use tokio_util::sync::CancellationToken;

use crate::domain::UserId;

use super::{ClientState, OutboundConfig, OutboundError};

/// Lifecycle flags, guarded by one lock.
#[derive(Debug)]
struct Lifecycle {
    state: ClientState,
    /// Set once by `close()`
    closed: bool,
    /// True between a successful connect and cleanup
    transport_open: bool,
    /// Number of read/write loops still running
    running_loops: u8,
}

/// Outbound chat client bound to one identity.
///
/// Created with [`OutboundClient::new`] and shared as `Arc<OutboundClient>`;
/// the read and write loops hold their own clones of the `Arc`.
#[derive(Debug)]
pub struct OutboundClient {
    identity: UserId,
    url: String,
    config: OutboundConfig,
    send_tx: mpsc::Sender<Envelope>,
    /// Taken by the write loop on connect
    send_rx: Mutex<Option<mpsc::Receiver<Envelope>>>,
    receive_tx: mpsc::Sender<Envelope>,
    receive_rx: Arc<tokio::sync::Mutex<mpsc::Receiver<Envelope>>>,
    /// One-shot close signal fired by `close()`
    close_signal: CancellationToken,
    /// Fired by cleanup; makes the surviving loop release its half of the socket
    transport_closed: CancellationToken,
    lifecycle: Mutex<Lifecycle>,
}

impl OutboundClient {
    pub fn new(identity: UserId, url: impl Into<String>, config: OutboundConfig) -> Arc<Self> {
        let (send_tx, send_rx) = mpsc::channel(config.queue_capacity.max(1));
        let (receive_tx, receive_rx) = mpsc::channel(config.queue_capacity.max(1));
        Arc::new(Self {
            identity,
            url: url.into(),
            config,
            send_tx,
            send_rx: Mutex::new(Some(send_rx)),
            receive_tx,
            receive_rx: Arc::new(tokio::sync::Mutex::new(receive_rx)),
            close_signal: CancellationToken::new(),
            transport_closed: CancellationToken::new(),
            lifecycle: Mutex::new(Lifecycle {
                state: ClientState::Disconnected,
                closed: false,
                transport_open: false,
                running_loops: 0,
            }),
        })
    }

    pub fn identity(&self) -> &UserId {
        &self.identity
    }

    pub fn state(&self) -> ClientState {
        self.lifecycle().state
    }

    pub fn is_closed(&self) -> bool {
        self.close_signal.is_cancelled()
    }

    /// Resolves once the close signal has fired.
    pub async fn closed(&self) {
        self.close_signal.cancelled().await
    }

    /// Queue of envelopes received from the remote node.
    ///
    /// Single consumer: hold the lock for as long as you read.
    pub fn messages(&self) -> Arc<tokio::sync::Mutex<mpsc::Receiver<Envelope>>> {
        self.receive_rx.clone()
    }

    /// Connect to the remote node and start the read and write loops.
    pub async fn connect(self: &Arc<Self>) -> Result<(), OutboundError> {
        {
            let mut lifecycle = self.lifecycle();
            if lifecycle.closed {
                return Err(OutboundError::Closed);
            }
            if lifecycle.state != ClientState::Disconnected {
                return Err(OutboundError::InvalidState(lifecycle.state));
            }
            lifecycle.state = ClientState::Connecting;
        }

        tracing::debug!("Connecting '{}' to {}", self.identity, self.url);
        let handshake_timeout = self.config.handshake_timeout;
        let connected = tokio::select! {
            biased;
            _ = self.close_signal.cancelled() => Err(OutboundError::Closed),
            result = tokio::time::timeout(handshake_timeout, connect_async(self.url.as_str())) => {
                match result {
                    Ok(Ok((stream, _response))) => Ok(stream),
                    Ok(Err(e)) => Err(OutboundError::Connect(e.to_string())),
                    Err(_) => Err(OutboundError::ConnectTimeout(handshake_timeout)),
                }
            }
        };

        let stream = match connected {
            Ok(stream) => stream,
            Err(e) => {
                let mut lifecycle = self.lifecycle();
                lifecycle.state = if lifecycle.closed {
                    ClientState::Closed
                } else {
                    ClientState::Disconnected
                };
                tracing::warn!("Failed to connect '{}' to {}: {}", self.identity, self.url, e);
                return Err(e);
            }
        };

        let send_rx = {
            let mut lifecycle = self.lifecycle();
            let send_rx = self
                .send_rx
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .take();
            match send_rx {
                Some(send_rx) if !lifecycle.closed => {
                    lifecycle.state = ClientState::Connected;
                    lifecycle.transport_open = true;
                    lifecycle.running_loops = 2;
                    send_rx
                }
                _ => {
                    // closed while the handshake was in flight; dropping the stream closes it
                    lifecycle.state = ClientState::Closed;
                    return Err(OutboundError::Closed);
                }
            }
        };

        let (sink, stream) = stream.split();
        tokio::spawn(self.clone().read_loop(stream));
        tokio::spawn(self.clone().write_loop(sink, send_rx));
        tracing::info!("Outbound client '{}' connected to {}", self.identity, self.url);
        Ok(())
    }

    /// Queue an envelope for the write loop.
    ///
    /// Fails with [`OutboundError::Closed`] once the close signal has fired and
    /// with [`OutboundError::SendTimeout`] when the queue stays full for the
    /// configured send timeout.
    pub async fn send(&self, envelope: Envelope) -> Result<(), OutboundError> {
        if self.is_closed() {
            return Err(OutboundError::Closed);
        }
        let send_timeout = self.config.send_timeout;
        tokio::select! {
            biased;
            _ = self.close_signal.cancelled() => Err(OutboundError::Closed),
            result = tokio::time::timeout(send_timeout, self.send_tx.send(envelope)) => match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(_)) => Err(OutboundError::Closed),
                Err(_) => Err(OutboundError::SendTimeout(send_timeout)),
            },
        }
    }

    /// Send a `registration-request` for this client's identity.
    pub async fn register(&self) -> Result<(), OutboundError> {
        self.send(Envelope::registration_request(self.identity.as_str()))
            .await
    }

    pub async fn send_chat(
        &self,
        receiver: impl Into<String>,
        text: impl Into<String>,
    ) -> Result<(), OutboundError> {
        self.send(Envelope::chat(self.identity.as_str(), receiver, text))
            .await
    }

    /// Send a `session-end` for this client's identity.
    pub async fn end_session(&self) -> Result<(), OutboundError> {
        self.send(Envelope::session_end(self.identity.as_str()))
            .await
    }

    /// Fire the close signal. Idempotent and safe to call concurrently.
    pub fn close(&self) {
        let mut lifecycle = self.lifecycle();
        if lifecycle.closed {
            return;
        }
        lifecycle.closed = true;
        self.close_signal.cancel();
        lifecycle.state = match lifecycle.state {
            ClientState::Connecting => ClientState::Connecting,
            _ if lifecycle.running_loops > 0 => ClientState::Closing,
            _ => ClientState::Closed,
        };
        tracing::debug!("Outbound client '{}' close requested", self.identity);
    }

    /// Close the transport exactly once, whichever loop gets here first.
    fn cleanup(&self) {
        let mut lifecycle = self.lifecycle();
        if !lifecycle.transport_open {
            return;
        }
        lifecycle.transport_open = false;
        self.transport_closed.cancel();
        tracing::debug!("Outbound client '{}' transport closed", self.identity);
    }

    fn loop_exited(&self, name: &str) {
        self.cleanup();
        self.close();

        let mut lifecycle = self.lifecycle();
        lifecycle.running_loops = lifecycle.running_loops.saturating_sub(1);
        tracing::debug!("Outbound client '{}' {} loop exited", self.identity, name);
        if lifecycle.running_loops == 0 {
            lifecycle.state = ClientState::Closed;
            tracing::info!("Outbound client '{}' closed", self.identity);
        }
    }

    async fn read_loop<S>(self: Arc<Self>, mut stream: S)
    where
        S: Stream<Item = Result<Message, WsError>> + Unpin,
    {
        let read_timeout = self.config.read_timeout;
        loop {
            let next = tokio::select! {
                _ = self.close_signal.cancelled() => break,
                _ = self.transport_closed.cancelled() => break,
                next = tokio::time::timeout(read_timeout, stream.next()) => next,
            };

            match next {
                Ok(Some(Ok(Message::Text(text)))) => self.push_received(text.as_str()),
                Ok(Some(Ok(Message::Close(_)))) | Ok(None) => {
                    tracing::info!("Remote node closed the connection of '{}'", self.identity);
                    break;
                }
                Ok(Some(Ok(_))) => {}
                Ok(Some(Err(e))) => {
                    tracing::warn!("Read error for user '{}': {}", self.identity, e);
                    break;
                }
                Err(_) => {
                    tracing::warn!(
                        "Read deadline of {:?} exceeded for user '{}'",
                        read_timeout,
                        self.identity
                    );
                    break;
                }
            }
        }
        self.loop_exited("read");
    }

    fn push_received(&self, text: &str) {
        let envelope = match Envelope::from_json(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!("Undecodable message for user '{}': {}", self.identity, e);
                return;
            }
        };
        match self.receive_tx.try_send(envelope) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!(
                    "Dropping message for user '{}' - receive queue full",
                    self.identity
                );
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }

    async fn write_loop<K>(self: Arc<Self>, mut sink: K, mut send_rx: mpsc::Receiver<Envelope>)
    where
        K: Sink<Message, Error = WsError> + Unpin,
    {
        let write_timeout = self.config.write_timeout;
        loop {
            let envelope = tokio::select! {
                _ = self.close_signal.cancelled() => break,
                _ = self.transport_closed.cancelled() => break,
                envelope = send_rx.recv() => match envelope {
                    Some(envelope) => envelope,
                    None => break,
                },
            };

            let json = match envelope.to_json() {
                Ok(json) => json,
                Err(e) => {
                    tracing::warn!("Failed to serialize envelope: {}", e);
                    continue;
                }
            };

            match tokio::time::timeout(write_timeout, sink.send(Message::Text(json.into()))).await
            {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!("Write error for user '{}': {}", self.identity, e);
                    break;
                }
                Err(_) => {
                    tracing::warn!(
                        "Write deadline of {:?} exceeded for user '{}'",
                        write_timeout,
                        self.identity
                    );
                    break;
                }
            }
        }

        // best effort close frame; the socket is released when both halves drop
        let _ = tokio::time::timeout(write_timeout, sink.close()).await;
        self.loop_exited("write");
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
