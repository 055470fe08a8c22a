//! Relay API handlers (`/api/v1/chat/...`).
//!
//! Lets an HTTP client chat through an upstream node: each user id gets an
//! outbound client from the [`ClientManager`](crate::infrastructure::outbound::ClientManager),
//! which holds the WebSocket connection on the caller's behalf.

use std::{sync::Arc, time::Duration};

use axum::{
    Json,
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use dengon_shared::Envelope;
use futures_util::sink::SinkExt;
use serde::Deserialize;
use tokio::sync::{OwnedMutexGuard, mpsc};

use crate::{
    domain::UserId,
    infrastructure::outbound::{ClientState, OutboundClient},
    ui::state::AppState,
};

const PING_INTERVAL: Duration = Duration::from_secs(30);
const LISTEN_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub user_id: String,
    pub receiver: String,
    pub text: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({"error": message.into()}))).into_response()
}

fn parse_user_id(raw: &str) -> Result<UserId, Response> {
    UserId::new(raw.to_string())
        .map_err(|e| error_response(StatusCode::BAD_REQUEST, format!("invalid user_id: {}", e)))
}

/// `POST /api/v1/chat/register`
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Response {
    let user_id = match parse_user_id(&request.user_id) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };

    let client = state.relay.get_or_create(&user_id).await;
    if client.state() == ClientState::Disconnected {
        if let Err(e) = client.connect().await {
            state.relay.remove(&user_id).await;
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to connect: {}", e),
            );
        }
        if let Err(e) = client.register().await {
            state.relay.remove(&user_id).await;
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Registration failed: {}", e),
            );
        }
        tracing::info!("Relay client '{}' registered upstream", user_id);
    }

    Json(serde_json::json!({"status": "registered", "user_id": user_id.as_str()})).into_response()
}

/// `POST /api/v1/chat/send`
pub async fn send(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SendRequest>,
) -> Response {
    if request.user_id.is_empty() || request.receiver.is_empty() || request.text.is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "user_id, receiver, and text are required",
        );
    }
    let user_id = match parse_user_id(&request.user_id) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };
    let Some(client) = state.relay.get(&user_id).await else {
        return error_response(StatusCode::NOT_FOUND, "User not registered");
    };

    match client.send_chat(request.receiver, request.text).await {
        Ok(()) => Json(serde_json::json!({"status": "sent", "timestamp": Utc::now()})).into_response(),
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to send message: {}", e),
        ),
    }
}

/// `GET /api/v1/chat/listen/{user_id}`
///
/// Streams envelopes received by the user's relay client. Only one listener
/// per user at a time.
pub async fn listen(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Response {
    let user_id = match parse_user_id(&user_id) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };
    let Some(client) = state.relay.get(&user_id).await else {
        return error_response(StatusCode::NOT_FOUND, "User not registered");
    };
    let Ok(messages) = client.messages().try_lock_owned() else {
        return error_response(StatusCode::CONFLICT, "Already listening");
    };

    ws.on_upgrade(move |socket| relay_messages(socket, client, user_id, messages))
}

async fn relay_messages(
    mut socket: WebSocket,
    client: Arc<OutboundClient>,
    user_id: UserId,
    mut messages: OwnedMutexGuard<mpsc::Receiver<Envelope>>,
) {
    let mut ticker = tokio::time::interval(PING_INTERVAL);
    ticker.tick().await;
    tracing::debug!("Relay listener attached for '{}'", user_id);

    loop {
        let outgoing = tokio::select! {
            envelope = messages.recv() => match envelope {
                Some(envelope) if envelope.receiver == user_id.as_str() => match envelope.to_json() {
                    Ok(json) => Message::Text(json.into()),
                    Err(e) => {
                        tracing::warn!("Failed to serialize envelope for '{}': {}", user_id, e);
                        continue;
                    }
                },
                Some(_) => continue,
                None => break,
            },
            _ = ticker.tick() => Message::Ping(Default::default()),
            _ = client.closed() => break,
        };

        match tokio::time::timeout(LISTEN_WRITE_TIMEOUT, socket.send(outgoing)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!("Failed to relay message to '{}': {}", user_id, e);
                break;
            }
            Err(_) => {
                tracing::warn!("Relay write to '{}' timed out", user_id);
                break;
            }
        }
    }
    let _ = socket.close().await;
    tracing::debug!("Relay listener detached for '{}'", user_id);
}

/// `DELETE /api/v1/chat/disconnect/{user_id}`
pub async fn disconnect(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Response {
    let user_id = match parse_user_id(&user_id) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };
    if let Some(client) = state.relay.get(&user_id).await
        && let Err(e) = client.end_session().await
    {
        tracing::debug!("Could not end session of '{}': {}", user_id, e);
    }
    state.relay.remove(&user_id).await;

    Json(serde_json::json!({"status": "disconnected", "user_id": user_id.as_str()})).into_response()
}
