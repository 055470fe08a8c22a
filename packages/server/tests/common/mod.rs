//! Helpers shared by the server integration tests.
//!
//! The server runs in-process on an ephemeral port; clients speak raw
//! WebSocket through tokio-tungstenite.

#![allow(dead_code)]

use std::{net::SocketAddr, sync::Arc, time::Duration};

use dengon_server::{
    infrastructure::{
        ConnectionRegistry, collaborator::InMemoryMessageStore,
        outbound::{ClientManager, OutboundConfig},
    },
    ui::Server,
    usecase::{Hub, HubConfig},
};
use dengon_shared::{Envelope, EnvelopeKind, time::SystemClock};
use futures_util::{SinkExt, StreamExt};
use tokio::{net::TcpStream, sync::oneshot, task::JoinHandle};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::protocol::Message,
};

pub const RECV_TIMEOUT: Duration = Duration::from_secs(3);

/// Helper struct to manage an in-process server
pub struct TestServer {
    addr: SocketAddr,
    store: Arc<InMemoryMessageStore>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl TestServer {
    /// Start a test server on an ephemeral port
    pub async fn start() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("listener has an address");

        let store = Arc::new(InMemoryMessageStore::new());
        let hub = Arc::new(Hub::start(
            HubConfig {
                write_timeout: Duration::from_secs(1),
                shutdown_grace: Duration::from_secs(2),
                ..HubConfig::default()
            },
            Arc::new(ConnectionRegistry::new()),
            store.clone(),
            store.clone(),
            Arc::new(SystemClock),
        ));
        // the relay API talks to this very server
        let relay = Arc::new(ClientManager::new(
            format!("ws://{}/ws", addr),
            OutboundConfig {
                handshake_timeout: Duration::from_secs(2),
                ..OutboundConfig::default()
            },
        ));

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let shutdown = async {
                let _ = shutdown_rx.await;
            };
            if let Err(e) = Server::new(hub, relay).serve(listener, shutdown).await {
                panic!("server failed: {}", e);
            }
        });

        TestServer {
            addr,
            store,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        }
    }

    /// Get the WebSocket URL for this server
    pub fn url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws_url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }

    pub fn store(&self) -> &Arc<InMemoryMessageStore> {
        &self.store
    }

    /// Registered identities as reported by `GET /api/users`
    pub async fn users(&self) -> Vec<String> {
        reqwest::get(self.http_url("/api/users"))
            .await
            .expect("users request")
            .json()
            .await
            .expect("users body")
    }

    /// Poll `GET /api/users` until it equals `expected`
    pub async fn wait_for_users(&self, expected: &[&str]) {
        let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
        loop {
            let users = self.users().await;
            if users == expected {
                return;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "users were {:?}, expected {:?}",
                users,
                expected
            );
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    /// Poll the store until it holds `expected` messages in total
    pub async fn wait_for_saved(&self, expected: usize) {
        let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
        while self.store.total().await < expected {
            assert!(
                tokio::time::Instant::now() < deadline,
                "store never reached {} message(s)",
                expected
            );
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    /// Trigger graceful shutdown and wait for the server to finish
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            tokio::time::timeout(Duration::from_secs(10), task)
                .await
                .expect("server should stop within the grace period")
                .expect("server task should not panic");
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Helper struct wrapping a raw WebSocket chat connection
pub struct TestClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TestClient {
    pub async fn connect(url: &str) -> Self {
        let (ws, _) = connect_async(url).await.expect("Failed to connect");
        TestClient { ws }
    }

    /// Connect and register, asserting that registration succeeded
    pub async fn register(url: &str, name: &str) -> Self {
        let mut client = Self::connect(url).await;
        client.send(&Envelope::registration_request(name)).await;
        let reply = client.recv().await;
        assert_eq!(reply.kind, EnvelopeKind::RegistrationSuccess, "{:?}", reply);
        client
    }

    pub async fn send(&mut self, envelope: &Envelope) {
        let json = envelope.to_json().expect("envelope serializes");
        self.ws
            .send(Message::Text(json.into()))
            .await
            .expect("Failed to send");
    }

    pub async fn send_raw(&mut self, text: &str) {
        self.ws
            .send(Message::Text(text.to_string().into()))
            .await
            .expect("Failed to send");
    }

    /// Next envelope, skipping control frames
    pub async fn recv(&mut self) -> Envelope {
        self.try_recv(RECV_TIMEOUT)
            .await
            .expect("expected an envelope")
    }

    /// Next envelope within `timeout`, or `None`
    pub async fn try_recv(&mut self, timeout: Duration) -> Option<Envelope> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let message = tokio::time::timeout_at(deadline, self.ws.next())
                .await
                .ok()??
                .ok()?;
            match message {
                Message::Text(text) => {
                    return Some(Envelope::from_json(text.as_str()).expect("valid envelope"));
                }
                Message::Close(_) => return None,
                _ => continue,
            }
        }
    }

    /// Whether the server closes this connection within `timeout`
    pub async fn is_closed_within(&mut self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match tokio::time::timeout_at(deadline, self.ws.next()).await {
                Err(_) => return false,
                Ok(None) | Ok(Some(Err(_))) | Ok(Some(Ok(Message::Close(_)))) => return true,
                Ok(Some(Ok(_))) => continue,
            }
        }
    }

    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}
