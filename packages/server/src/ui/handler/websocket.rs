//! WebSocket connection handler (`GET /ws`).
//!
//! Each connection is served by two tasks: the read loop below, which decodes
//! envelopes and hands them to the hub, and a pusher task that drains the
//! connection's outbox into the socket.

use std::{sync::Arc, time::Duration};

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use dengon_shared::Envelope;
use futures_util::{
    sink::SinkExt,
    stream::{SplitSink, StreamExt},
};

use crate::{
    domain::{ConnectionHandle, ConnectionOutbox, TransportError},
    ui::state::AppState,
    usecase::Dispatch,
};

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Spawns a task that writes the connection's outbox to the WebSocket.
///
/// Each write is bounded by `write_timeout`. Idle connections get a ping every
/// `ping_interval`. The task closes the handle when it stops, so that the read
/// loop stops too, and ends the socket with a close frame.
fn pusher_loop(
    mut outbox: ConnectionOutbox,
    mut sender: SplitSink<WebSocket, Message>,
    handle: ConnectionHandle,
    write_timeout: Duration,
    ping_interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(ping_interval);
        ticker.tick().await;

        loop {
            let message = tokio::select! {
                envelope = outbox.next() => match envelope {
                    Some(envelope) => match envelope.to_json() {
                        Ok(json) => Message::Text(json.into()),
                        Err(e) => {
                            tracing::warn!("{}", TransportError::Encode(e.to_string()));
                            continue;
                        }
                    },
                    None => break,
                },
                _ = ticker.tick() => Message::Ping(Default::default()),
            };

            let error = match tokio::time::timeout(write_timeout, sender.send(message)).await {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => TransportError::WebSocket(e.to_string()),
                Err(_) => TransportError::WriteTimeout(write_timeout),
            };
            tracing::warn!("Write to connection {} failed: {}", handle.id(), error);
            break;
        }
        handle.close();
        let _ = tokio::time::timeout(write_timeout, sender.close()).await;
    })
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (sender, mut receiver) = socket.split();
    let (mut session, outbox) = state.hub.open_session();
    let write_timeout = state.hub.config().write_timeout;
    let ping_interval = state.hub.config().ping_interval;
    tracing::debug!("Connection {} opened", session.handle().id());

    let mut send_task = pusher_loop(
        outbox,
        sender,
        session.handle().clone(),
        write_timeout,
        ping_interval,
    );

    loop {
        let handle = session.handle().clone();
        let message = tokio::select! {
            message = receiver.next() => message,
            _ = handle.closed() => break,
        };

        match message {
            Some(Ok(Message::Text(text))) => {
                let envelope = match Envelope::from_json(text.as_str()) {
                    Ok(envelope) => envelope,
                    Err(e) => {
                        tracing::warn!("Failed to parse message as envelope: {}", e);
                        continue;
                    }
                };
                if state.hub.dispatch(&mut session, envelope).await == Dispatch::Terminate {
                    break;
                }
            }
            Some(Ok(Message::Close(_))) | None => {
                tracing::debug!("Connection {} closed by peer", session.handle().id());
                break;
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                tracing::warn!("WebSocket error on connection {}: {}", session.handle().id(), e);
                break;
            }
        }
    }

    state.hub.disconnect(&session).await;

    // the pusher flushes what is already queued, then sends the close frame
    if tokio::time::timeout(write_timeout, &mut send_task)
        .await
        .is_err()
    {
        send_task.abort();
    }
    tracing::debug!("Connection {} finished", session.handle().id());
}
