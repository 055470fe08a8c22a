//! Wire types of the persistence / history collaborator API.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};

/// Longest user id accepted anywhere, in bytes.
///
/// Encoded ids end up in file names, which are limited to 255 bytes.
pub const MAX_USER_ID_BYTES: usize = 64;

/// Ids that collapse to a dot segment in a URL path, even when encoded.
pub const RESERVED_USER_IDS: [&str; 2] = [".", ".."];

/// Everything except ASCII letters, digits, `-` and `_` is escaped.
const USER_ID_ESCAPES: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_');

/// Percent-encode a user id into a single URL path segment or file stem.
///
/// The result never contains `/`, `.`, `?` or `#`, and distinct ids map to
/// distinct encodings.
pub fn encode_user_id(user_id: &str) -> String {
    utf8_percent_encode(user_id, USER_ID_ESCAPES).to_string()
}

/// Body of `POST /messages`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveMessageRequest {
    /// Identity whose history the message is appended to
    pub receiver: String,
    /// Serialized envelope, stored verbatim
    pub message: String,
}

/// Body of a successful `POST /messages` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveMessageResponse {
    pub status: String,
}
