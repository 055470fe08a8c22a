//! The envelope: unit of transport between chat clients and the server.
//!
//! Wire shape (JSON):
//!
//! ```json
//! {"text": "hi", "sender": "alice", "receiver": "bob", "type": "chat", "timestamp": "2025-01-01T00:00:00Z"}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Sender name used for envelopes generated by the server itself.
pub const SERVER_SENDER: &str = "server";

/// Kind of an envelope (`type` on the wire).
///
/// The server always emits the kebab-case names. Legacy snake_case names
/// (`new_client`, `session_end`, ...) are accepted when decoding. Anything else
/// decodes to [`EnvelopeKind::Unknown`] so that the reader can log and skip it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EnvelopeKind {
    RegistrationRequest,
    RegistrationSuccess,
    RegistrationError,
    Chat,
    SessionEnd,
    Historical,
    Unknown(String),
}

impl EnvelopeKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::RegistrationRequest => "registration-request",
            Self::RegistrationSuccess => "registration-success",
            Self::RegistrationError => "registration-error",
            Self::Chat => "chat",
            Self::SessionEnd => "session-end",
            Self::Historical => "historical",
            Self::Unknown(raw) => raw,
        }
    }

    /// Whether an envelope of this kind must name a receiver once routed.
    pub fn requires_receiver(&self) -> bool {
        !matches!(self, Self::RegistrationRequest | Self::SessionEnd)
    }
}

impl From<String> for EnvelopeKind {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "registration-request" | "registration_request" | "new_client" => {
                Self::RegistrationRequest
            }
            "registration-success" | "registration_success" => Self::RegistrationSuccess,
            "registration-error" | "registration_error" => Self::RegistrationError,
            "chat" => Self::Chat,
            "session-end" | "session_end" => Self::SessionEnd,
            "historical" => Self::Historical,
            _ => Self::Unknown(raw),
        }
    }
}

impl From<EnvelopeKind> for String {
    fn from(kind: EnvelopeKind) -> Self {
        match kind {
            EnvelopeKind::Unknown(raw) => raw,
            other => other.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for EnvelopeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A chat envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub receiver: String,
    #[serde(rename = "type")]
    pub kind: EnvelopeKind,
    /// Overwritten by the server on ingress; the sender's value is never trusted.
    #[serde(default = "chrono::Utc::now", deserialize_with = "lenient_timestamp")]
    pub timestamp: DateTime<Utc>,
}

/// A timestamp that is not a valid date-time string (`null`, a number,
/// free text) decodes as the current time instead of failing the envelope.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value
        .as_str()
        .and_then(|raw| raw.parse::<DateTime<Utc>>().ok())
        .unwrap_or_else(Utc::now))
}

impl Envelope {
    pub fn new(
        kind: EnvelopeKind,
        sender: impl Into<String>,
        receiver: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            sender: sender.into(),
            receiver: receiver.into(),
            kind,
            timestamp: Utc::now(),
        }
    }

    pub fn registration_request(sender: impl Into<String>) -> Self {
        Self::new(EnvelopeKind::RegistrationRequest, sender, "", "")
    }

    pub fn chat(
        sender: impl Into<String>,
        receiver: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self::new(EnvelopeKind::Chat, sender, receiver, text)
    }

    pub fn session_end(sender: impl Into<String>) -> Self {
        Self::new(EnvelopeKind::SessionEnd, sender, "", "")
    }

    pub fn registration_success(receiver: impl Into<String>) -> Self {
        Self::new(
            EnvelopeKind::RegistrationSuccess,
            SERVER_SENDER,
            receiver,
            "Registration successful",
        )
    }

    pub fn registration_error(receiver: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(EnvelopeKind::RegistrationError, SERVER_SENDER, receiver, reason)
    }

    /// Rebuild a history item for delivery.
    ///
    /// Stored items are normally serialized envelopes; those keep their text,
    /// sender and timestamp and are relabelled as `historical`. Anything that is
    /// not an envelope is delivered as the text of a server-sent historical
    /// envelope stamped with `now`.
    pub fn historical_from_stored(stored: &str, receiver: &str, now: DateTime<Utc>) -> Self {
        match Self::from_json(stored) {
            Ok(mut envelope) => {
                envelope.kind = EnvelopeKind::Historical;
                if envelope.receiver.is_empty() {
                    envelope.receiver = receiver.to_string();
                }
                envelope
            }
            Err(_) => Self {
                text: stored.to_string(),
                sender: SERVER_SENDER.to_string(),
                receiver: receiver.to_string(),
                kind: EnvelopeKind::Historical,
                timestamp: now,
            },
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
