//! Server execution logic.

use std::{future::Future, sync::Arc};

use axum::{
    Router,
    routing::{delete, get, post},
};
use dengon_shared::signal::shutdown_signal;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::{infrastructure::outbound::ClientManager, usecase::Hub};

use super::{
    handler::{
        health_check, list_users, relay_disconnect, relay_listen, relay_register, relay_send,
        websocket_handler,
    },
    state::AppState,
};

pub type ServerError = Box<dyn std::error::Error + Send + Sync>;

/// WebSocket chat server
///
/// # Example
///
/// ```ignore
/// let server = Server::new(hub, relay);
/// server.run("127.0.0.1".to_string(), 8080).await?;
/// ```
pub struct Server {
    hub: Arc<Hub>,
    relay: Arc<ClientManager>,
}

impl Server {
    pub fn new(hub: Arc<Hub>, relay: Arc<ClientManager>) -> Self {
        Self { hub, relay }
    }

    pub fn router(&self) -> Router {
        let app_state = Arc::new(AppState {
            hub: self.hub.clone(),
            relay: self.relay.clone(),
        });

        Router::new()
            // WebSocket エンドポイント
            .route("/ws", get(websocket_handler))
            // HTTP エンドポイント
            .route("/api/health", get(health_check))
            .route("/api/users", get(list_users))
            // Relay エンドポイント
            .route("/api/v1/chat/register", post(relay_register))
            .route("/api/v1/chat/send", post(relay_send))
            .route("/api/v1/chat/listen/{user_id}", get(relay_listen))
            .route("/api/v1/chat/disconnect/{user_id}", delete(relay_disconnect))
            .layer(TraceLayer::new_for_http())
            .with_state(app_state)
    }

    /// Bind to `host:port` and serve until Ctrl+C / SIGTERM.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to the specified address or
    /// if there's an error during server execution.
    pub async fn run(self, host: String, port: u16) -> Result<(), ServerError> {
        let bind_addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&bind_addr).await?;
        tracing::info!("Connect to: ws://{}/ws", listener.local_addr()?);
        tracing::info!("Press Ctrl+C to shutdown gracefully");

        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on an already bound listener until `shutdown` resolves, then
    /// close relay clients and drain the routing engine.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.router();
        tracing::info!(
            "Chat server listening on {}",
            listener.local_addr()?
        );

        let served = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await;

        self.relay.close_all().await;
        self.hub.shutdown().await;
        served?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}
