//! HTTP surface of the message store.
//!
//! - `POST /messages` appends `{"receiver", "message"}` to the receiver's history
//! - `GET /messages/{user_id}` returns the stored messages, oldest first
//! - `GET /health`

use std::{future::Future, sync::Arc};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use dengon_shared::{
    signal::shutdown_signal,
    store::{SaveMessageRequest, SaveMessageResponse},
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::{error::StoreError, repository::FileMessageStore};

pub type ServerError = Box<dyn std::error::Error + Send + Sync>;

fn store_error_to_response(err: StoreError) -> Response {
    let status = match &err {
        StoreError::InvalidUserId(_) => StatusCode::BAD_REQUEST,
        StoreError::Io { .. } | StoreError::Corrupt { .. } | StoreError::Encode(_) => {
            tracing::error!("{}", err);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(serde_json::json!({"error": err.to_string()}))).into_response()
}

async fn save_message(
    State(store): State<Arc<FileMessageStore>>,
    Json(request): Json<SaveMessageRequest>,
) -> Response {
    match store.append(&request.receiver, request.message).await {
        Ok(_) => Json(SaveMessageResponse {
            status: "saved".to_string(),
        })
        .into_response(),
        Err(e) => store_error_to_response(e),
    }
}

async fn message_history(
    State(store): State<Arc<FileMessageStore>>,
    Path(user_id): Path<String>,
) -> Response {
    match store.history(&user_id).await {
        Ok(messages) => Json(messages).into_response(),
        Err(e) => store_error_to_response(e),
    }
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Message store HTTP server
pub struct StoreServer {
    store: Arc<FileMessageStore>,
}

impl StoreServer {
    pub fn new(store: Arc<FileMessageStore>) -> Self {
        Self { store }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/messages", post(save_message))
            .route("/messages/{user_id}", get(message_history))
            .route("/health", get(health_check))
            .layer(TraceLayer::new_for_http())
            .with_state(self.store.clone())
    }

    /// Bind to `host:port` and serve until Ctrl+C / SIGTERM.
    pub async fn run(self, host: String, port: u16) -> Result<(), ServerError> {
        let bind_addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&bind_addr).await?;
        tracing::info!("Press Ctrl+C to shutdown gracefully");

        self.serve(listener, shutdown_signal()).await
    }

    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tracing::info!(
            "Message store listening on http://{} (dir: {})",
            listener.local_addr()?,
            self.store.dir().display()
        );

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("Message store shutdown complete");
        Ok(())
    }
}
