//! WebSocket client session management.

use std::{sync::Arc, time::Duration};

use dengon_server::{
    domain::UserId,
    infrastructure::outbound::{OutboundClient, OutboundConfig},
};
use dengon_shared::{Envelope, EnvelopeKind};
use tokio::sync::mpsc;

use crate::{
    domain::{Input, parse_input},
    error::ClientError,
    formatter::MessageFormatter,
    ui::redisplay_prompt,
};

const REGISTRATION_TIMEOUT: Duration = Duration::from_secs(10);
const SESSION_END_TIMEOUT: Duration = Duration::from_secs(2);
/// Reason the server gives when the user id is taken
const DUPLICATE_REASON: &str = "User already exists";

/// Run one client session: connect, register, then chat until `quit`, the
/// end of input, or a lost connection.
///
/// `input` carries the lines typed at the prompt; it outlives the session so
/// a reconnect picks up where the previous session stopped reading.
pub async fn run_client_session(
    url: &str,
    user_id: &str,
    input: &mut mpsc::UnboundedReceiver<String>,
) -> Result<(), ClientError> {
    let identity = UserId::new(user_id.to_string())
        .map_err(|e| ClientError::RegistrationRejected(e.to_string()))?;

    let client = OutboundClient::new(identity, url, OutboundConfig::default());
    client
        .connect()
        .await
        .map_err(|e| ClientError::ConnectionError(e.to_string()))?;
    tracing::info!("Connected to chat server!");

    let result = chat(&client, user_id, input).await;
    client.close();
    result
}

async fn chat(
    client: &Arc<OutboundClient>,
    user_id: &str,
    input: &mut mpsc::UnboundedReceiver<String>,
) -> Result<(), ClientError> {
    let messages = client.messages();
    let mut messages = messages.lock().await;

    client
        .register()
        .await
        .map_err(|e| ClientError::ConnectionError(e.to_string()))?;
    await_registration(client, &mut messages, user_id).await?;

    print!("{}", MessageFormatter::format_welcome(user_id));
    redisplay_prompt(user_id);

    loop {
        tokio::select! {
            biased;
            envelope = messages.recv() => {
                let Some(envelope) = envelope else {
                    return Err(ClientError::ConnectionError("receive queue closed".to_string()));
                };
                if let Some(formatted) = MessageFormatter::format_envelope(&envelope) {
                    print!("{}", formatted);
                    redisplay_prompt(user_id);
                }
            }
            line = input.recv() => match line.as_deref().map(parse_input) {
                Some(Input::Send { receiver, text }) => {
                    client
                        .send_chat(receiver, text)
                        .await
                        .map_err(|e| ClientError::ConnectionError(e.to_string()))?;
                }
                Some(Input::Invalid(reason)) => {
                    print!("{}", MessageFormatter::format_invalid_input(&reason));
                    redisplay_prompt(user_id);
                }
                Some(Input::Quit) | None => {
                    end_session(client).await;
                    return Ok(());
                }
            },
            _ = client.closed() => {
                return Err(ClientError::ConnectionError("connection lost".to_string()));
            }
        }
    }
}

/// Wait for the server's answer to our registration request.
async fn await_registration(
    client: &OutboundClient,
    messages: &mut mpsc::Receiver<Envelope>,
    user_id: &str,
) -> Result<(), ClientError> {
    let reply = tokio::time::timeout(REGISTRATION_TIMEOUT, async {
        loop {
            tokio::select! {
                biased;
                envelope = messages.recv() => match envelope {
                    Some(envelope) if matches!(
                        envelope.kind,
                        EnvelopeKind::RegistrationSuccess | EnvelopeKind::RegistrationError
                    ) => return Some(envelope),
                    Some(_) => {}
                    None => return None,
                },
                _ = client.closed() => return None,
            }
        }
    })
    .await;

    match reply {
        Ok(Some(envelope)) if envelope.kind == EnvelopeKind::RegistrationSuccess => {
            print!("{}", MessageFormatter::format_registration_success());
            Ok(())
        }
        Ok(Some(envelope)) => {
            print!(
                "{}",
                MessageFormatter::format_registration_error(&envelope.text)
            );
            if envelope.text == DUPLICATE_REASON {
                Err(ClientError::DuplicateUserId(user_id.to_string()))
            } else {
                Err(ClientError::RegistrationRejected(envelope.text))
            }
        }
        Ok(None) => Err(ClientError::ConnectionError(
            "connection closed before registration completed".to_string(),
        )),
        Err(_) => Err(ClientError::ConnectionError(format!(
            "no registration reply within {:?}",
            REGISTRATION_TIMEOUT
        ))),
    }
}

/// Tell the server we are leaving and give it a moment to close the socket.
async fn end_session(client: &OutboundClient) {
    if let Err(e) = client.end_session().await {
        tracing::debug!("Could not send session-end: {}", e);
        return;
    }
    if tokio::time::timeout(SESSION_END_TIMEOUT, client.closed())
        .await
        .is_err()
    {
        tracing::debug!("Server did not close the connection after session-end");
    }
}
