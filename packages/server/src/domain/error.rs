//! Domain-level error types.

use thiserror::Error;

/// Value object validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("user id must not be empty")]
    EmptyUserId,

    #[error("user id is longer than {max} bytes")]
    UserIdTooLong { max: usize },

    #[error("user id contains whitespace or control characters")]
    InvalidUserIdCharacter,

    #[error("user id '{0}' is reserved")]
    ReservedUserId(String),
}

/// Failures on a live transport (read/write/deadline).
///
/// Any of these terminates the owning connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("connection is closed")]
    Closed,

    #[error("write deadline of {0:?} exceeded")]
    WriteTimeout(std::time::Duration),

    #[error("websocket error: {0}")]
    WebSocket(String),

    #[error("failed to encode envelope: {0}")]
    Encode(String),
}

/// Persistence / history collaborator failures.
///
/// Never surfaced to chat users; the caller logs and moves on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("collaborator rejected request with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("invalid collaborator response: {0}")]
    InvalidResponse(String),
}
