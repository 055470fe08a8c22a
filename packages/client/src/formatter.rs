//! Message formatting utilities for client display.

use chrono::{DateTime, Utc};
use dengon_shared::{Envelope, EnvelopeKind, time::to_jst_clock};

/// Message formatter for client display
pub struct MessageFormatter;

impl MessageFormatter {
    pub fn format_welcome(user_id: &str) -> String {
        format!(
            "\nYou are '{}'. Type 'to:<user> <message>' to send, 'quit' to leave.\n",
            user_id
        )
    }

    pub fn format_registration_success() -> String {
        "✓ registered\n".to_string()
    }

    pub fn format_registration_error(reason: &str) -> String {
        format!("✗ registration failed: {}\n", reason)
    }

    /// `[HH:MM:SS] sender: text`, clock time in JST
    pub fn format_chat_message(sender: &str, text: &str, timestamp: &DateTime<Utc>) -> String {
        format!("\n[{}] {}: {}\n", to_jst_clock(timestamp), sender, text)
    }

    pub fn format_historical_message(sender: &str, text: &str, timestamp: &DateTime<Utc>) -> String {
        format!(
            "\nHistorical [{}] {}: {}\n",
            to_jst_clock(timestamp),
            sender,
            text
        )
    }

    pub fn format_invalid_input(reason: &str) -> String {
        format!("{}\n", reason)
    }

    /// Format any envelope received from the server.
    ///
    /// Returns `None` for kinds a client does not display.
    pub fn format_envelope(envelope: &Envelope) -> Option<String> {
        match &envelope.kind {
            EnvelopeKind::RegistrationSuccess => Some(Self::format_registration_success()),
            EnvelopeKind::RegistrationError => {
                Some(Self::format_registration_error(&envelope.text))
            }
            EnvelopeKind::Chat => Some(Self::format_chat_message(
                &envelope.sender,
                &envelope.text,
                &envelope.timestamp,
            )),
            EnvelopeKind::Historical => Some(Self::format_historical_message(
                &envelope.sender,
                &envelope.text,
                &envelope.timestamp,
            )),
            EnvelopeKind::RegistrationRequest
            | EnvelopeKind::SessionEnd
            | EnvelopeKind::Unknown(_) => None,
        }
    }
}
