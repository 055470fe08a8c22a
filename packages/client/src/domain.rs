//! Domain logic for client-side operations.
//!
//! Pure functions with no side effects: reconnect policy and parsing of the
//! lines typed at the prompt.

use crate::error::ClientError;

/// Line typed by the user, after parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// `to:<user> <message>`
    Send { receiver: String, text: String },
    /// `quit`
    Quit,
    /// Anything else; carries the reason shown to the user
    Invalid(String),
}

const SEND_PREFIX: &str = "to:";
const QUIT_COMMAND: &str = "quit";

/// Parse one input line.
///
/// # Examples
///
/// ```
/// use dengon_client::{Input, parse_input};
///
/// assert_eq!(
///     parse_input("to:bob hello there"),
///     Input::Send { receiver: "bob".to_string(), text: "hello there".to_string() },
/// );
/// assert_eq!(parse_input("quit"), Input::Quit);
/// ```
pub fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if line == QUIT_COMMAND {
        return Input::Quit;
    }

    let Some(rest) = line.strip_prefix(SEND_PREFIX) else {
        return Input::Invalid("Use 'to:<user> <message>' or 'quit'".to_string());
    };
    let Some((receiver, text)) = rest.split_once(char::is_whitespace) else {
        return Input::Invalid("Message text is empty".to_string());
    };
    let receiver = receiver.trim();
    let text = text.trim();

    if receiver.is_empty() {
        return Input::Invalid("Receiver is empty".to_string());
    }
    if text.is_empty() {
        return Input::Invalid("Message text is empty".to_string());
    }

    Input::Send {
        receiver: receiver.to_string(),
        text: text.to_string(),
    }
}

/// Check if the client should exit immediately based on the error type.
///
/// Registration refusals cannot be fixed by reconnecting with the same user id.
pub fn should_exit_immediately(error: &ClientError) -> bool {
    matches!(
        error,
        ClientError::DuplicateUserId(_) | ClientError::RegistrationRejected(_)
    )
}

/// Check if the client should attempt to reconnect.
///
/// # Arguments
///
/// * `error` - The client error that occurred
/// * `current_attempt` - The current reconnection attempt count (0-indexed)
/// * `max_attempts` - The maximum number of reconnection attempts allowed
pub fn should_attempt_reconnect(
    error: &ClientError,
    current_attempt: u32,
    max_attempts: u32,
) -> bool {
    if should_exit_immediately(error) {
        return false;
    }

    current_attempt < max_attempts
}
