//! Error types for the CLI chat client.

use thiserror::Error;

/// Client-specific errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// User ID is already registered on the server
    #[error("User ID '{0}' is already connected")]
    DuplicateUserId(String),

    /// Registration refused for another reason (e.g. malformed user ID)
    #[error("Registration rejected: {0}")]
    RegistrationRejected(String),

    /// Connection error
    #[error("Connection error: {0}")]
    ConnectionError(String),
}
