//! Routing Engine (Hub)
//!
//! 接続の読み取りループから受け取ったエンベロープを種類ごとに振り分けます。
//!
//! ```text
//! read loop ──► dispatch ─┬─ registration-request ──► RegisterUserUseCase ──► Registry
//!                         ├─ chat ──► SendChatUseCase ──┬─► chat queue ──► DeliverChatUseCase
//!                         │                             └─► durability queue ──► PersistChatUseCase
//!                         └─ session-end ──► EndSessionUseCase ──► Registry
//! ```
//!
//! Hub は起動時に一度だけ作られ、`Arc` で共有されます。

use std::{sync::Arc, time::Duration};

use dengon_shared::{Envelope, EnvelopeKind, time::Clock};
use tokio::sync::mpsc;
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::{
    domain::{
        ConnectionHandle, ConnectionOutbox, HistoryService, PersistenceService, UserId,
    },
    infrastructure::ConnectionRegistry,
};

use super::{
    deliver_chat::DeliverChatUseCase, end_session::EndSessionUseCase,
    persist_chat::PersistChatUseCase, register_user::RegisterUserUseCase,
    send_chat::SendChatUseCase,
};

/// Routing engine settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubConfig {
    /// Capacity of the chat (delivery) queue
    pub chat_queue_capacity: usize,
    /// Capacity of the durability queue
    pub durability_queue_capacity: usize,
    /// Capacity of each connection's outbound queue
    pub connection_queue_capacity: usize,
    /// How long a delivery may wait on a stalled connection
    pub write_timeout: Duration,
    /// How long the delivery loop waits on one receiver's full outbox before
    /// evicting that connection
    pub delivery_timeout: Duration,
    /// Interval of keepalive pings on idle connections
    pub ping_interval: Duration,
    /// Upper bound on concurrently running saves
    pub max_in_flight_saves: usize,
    /// How long shutdown waits for queued work and detached tasks
    pub shutdown_grace: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            chat_queue_capacity: 100,
            durability_queue_capacity: 100,
            connection_queue_capacity: 100,
            write_timeout: Duration::from_secs(10),
            delivery_timeout: Duration::from_millis(250),
            ping_interval: Duration::from_secs(30),
            max_in_flight_saves: 32,
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

/// What the read loop should do after a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Continue,
    Terminate,
}

/// Per-connection state owned by the connection's read loop.
#[derive(Debug)]
pub struct Session {
    handle: ConnectionHandle,
    identity: Option<UserId>,
}

impl Session {
    pub fn handle(&self) -> &ConnectionHandle {
        &self.handle
    }

    /// Identity bound by a successful registration
    pub fn identity(&self) -> Option<&UserId> {
        self.identity.as_ref()
    }
}

/// The routing engine.
pub struct Hub {
    config: HubConfig,
    registry: Arc<ConnectionRegistry>,
    clock: Arc<dyn Clock>,
    register_user: RegisterUserUseCase,
    send_chat: SendChatUseCase,
    end_session: EndSessionUseCase,
    tracker: TaskTracker,
    shutdown: CancellationToken,
}

impl Hub {
    /// Build the hub and spawn its delivery and durability loops.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(
        config: HubConfig,
        registry: Arc<ConnectionRegistry>,
        persistence: Arc<dyn PersistenceService>,
        history: Arc<dyn HistoryService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (chat_tx, chat_rx) = mpsc::channel(config.chat_queue_capacity.max(1));
        let (durability_tx, durability_rx) = mpsc::channel(config.durability_queue_capacity.max(1));
        let tracker = TaskTracker::new();
        let shutdown = CancellationToken::new();

        tracker.spawn(
            DeliverChatUseCase::new(registry.clone(), config.delivery_timeout)
                .run(chat_rx, shutdown.clone()),
        );
        tracker.spawn(
            PersistChatUseCase::new(persistence, tracker.clone(), config.max_in_flight_saves)
                .run(durability_rx, shutdown.clone()),
        );
        tracing::info!(
            "Routing engine started (chat queue: {}, durability queue: {})",
            config.chat_queue_capacity,
            config.durability_queue_capacity
        );

        Self {
            config,
            register_user: RegisterUserUseCase::new(
                registry.clone(),
                history,
                clock.clone(),
                tracker.clone(),
            ),
            send_chat: SendChatUseCase::new(chat_tx, durability_tx),
            end_session: EndSessionUseCase::new(registry.clone()),
            registry,
            clock,
            tracker,
            shutdown,
        }
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Open a session for a new transport-level connection.
    ///
    /// The outbox must be drained by the connection's write task.
    pub fn open_session(&self) -> (Session, ConnectionOutbox) {
        let (handle, outbox) = ConnectionHandle::channel(
            self.config.connection_queue_capacity,
            self.config.write_timeout,
        );
        (
            Session {
                handle,
                identity: None,
            },
            outbox,
        )
    }

    /// Dispatch one inbound envelope.
    ///
    /// The envelope's timestamp is replaced by the server clock before anything
    /// else looks at it. Chats are only accepted from registered sessions and
    /// carry the session's identity as sender.
    pub async fn dispatch(&self, session: &mut Session, envelope: Envelope) -> Dispatch {
        let mut envelope = envelope.with_timestamp(self.clock.now());

        match envelope.kind {
            EnvelopeKind::RegistrationRequest => {
                let registered = self
                    .register_user
                    .execute(session.identity(), &envelope.sender, &session.handle)
                    .await;
                match registered {
                    Ok(identity) => session.identity = Some(identity),
                    Err(e) => tracing::warn!("Registration of '{}' rejected: {}", envelope.sender, e),
                }
                Dispatch::Continue
            }
            EnvelopeKind::Chat => {
                // the sender is the identity bound by registration, never the claimed one
                let Some(identity) = session.identity() else {
                    tracing::warn!(
                        "Chat on unregistered connection {} ignored",
                        session.handle.id()
                    );
                    return Dispatch::Continue;
                };
                envelope.sender = identity.as_str().to_string();
                if let Err(e) = self.send_chat.execute(envelope).await {
                    tracing::warn!("Chat on connection {} ignored: {}", session.handle.id(), e);
                }
                Dispatch::Continue
            }
            EnvelopeKind::SessionEnd => {
                self.disconnect(session).await;
                Dispatch::Terminate
            }
            other => {
                tracing::warn!(
                    "Ignoring '{}' envelope on connection {}",
                    other,
                    session.handle.id()
                );
                Dispatch::Continue
            }
        }
    }

    /// Tear down a session: drop its registration and close its transport.
    ///
    /// Safe to call more than once.
    pub async fn disconnect(&self, session: &Session) {
        self.end_session
            .execute(session.identity(), session.handle.id())
            .await;
        session.handle.close();
    }

    /// Stop the routing loops after draining their queues, wait for detached
    /// tasks, then close every remaining connection.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down routing engine");
        self.shutdown.cancel();
        self.tracker.close();
        if tokio::time::timeout(self.config.shutdown_grace, self.tracker.wait())
            .await
            .is_err()
        {
            tracing::warn!(
                "{} task(s) still running after {:?}",
                self.tracker.len(),
                self.config.shutdown_grace
            );
        }
        let closed = self.registry.clear().await;
        tracing::info!("Routing engine stopped, closed {} connection(s)", closed);
    }
}
