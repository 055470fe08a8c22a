//! Value objects.

use std::fmt;

use dengon_shared::store::{MAX_USER_ID_BYTES, RESERVED_USER_IDS};

use super::error::ValidationError;

/// Identity of a chat user.
///
/// Unique key of the connection registry and the client manager.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(String);

impl UserId {
    /// Upper bound in UTF-8 bytes, shared with the message store.
    pub const MAX_LENGTH: usize = MAX_USER_ID_BYTES;

    /// Create a user id, rejecting empty, overlong, whitespace-bearing and
    /// reserved (`.` and `..`) values.
    pub fn new(value: String) -> Result<Self, ValidationError> {
        if value.is_empty() {
            return Err(ValidationError::EmptyUserId);
        }
        if value.len() > Self::MAX_LENGTH {
            return Err(ValidationError::UserIdTooLong {
                max: Self::MAX_LENGTH,
            });
        }
        if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(ValidationError::InvalidUserIdCharacter);
        }
        if RESERVED_USER_IDS.contains(&value.as_str()) {
            return Err(ValidationError::ReservedUserId(value));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for UserId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for UserId {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value.to_string())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_accepts_plain_identity() {
        // テスト項目: 通常の文字列から UserId が生成できる
        // given (前提条件):
        let value = "alice".to_string();

        // when (操作):
        let result = UserId::new(value);

        // then (期待する結果):
        assert_eq!(result.unwrap().as_str(), "alice");
    }

    #[test]
    fn test_user_id_rejects_empty() {
        // テスト項目: 空文字列の UserId はエラーになる
        // given (前提条件):
        let value = String::new();

        // when (操作):
        let result = UserId::new(value);

        // then (期待する結果):
        assert_eq!(result, Err(ValidationError::EmptyUserId));
    }

    #[test]
    fn test_user_id_rejects_too_long() {
        // テスト項目: 上限を超える長さの UserId はエラーになる
        // given (前提条件):
        let value = "a".repeat(UserId::MAX_LENGTH + 1);

        // when (操作):
        let result = UserId::new(value);

        // then (期待する結果):
        assert_eq!(
            result,
            Err(ValidationError::UserIdTooLong {
                max: UserId::MAX_LENGTH
            })
        );
    }

    #[test]
    fn test_user_id_length_is_counted_in_bytes() {
        // テスト項目: 長さの上限は文字数ではなく UTF-8 のバイト数で数える
        // given (前提条件):
        // "é" は 2 バイトなので 33 文字で 66 バイトになる
        let fits = "é".repeat(UserId::MAX_LENGTH / 2);
        let overflows = "é".repeat(UserId::MAX_LENGTH / 2 + 1);

        // when (操作):
        let accepted = UserId::new(fits);
        let rejected = UserId::new(overflows);

        // then (期待する結果):
        assert!(accepted.is_ok());
        assert!(matches!(rejected, Err(ValidationError::UserIdTooLong { .. })));
    }

    #[test]
    fn test_user_id_rejects_whitespace() {
        // テスト項目: 空白を含む UserId はエラーになる
        // given (前提条件):
        let value = "alice smith".to_string();

        // when (操作):
        let result = UserId::try_from(value);

        // then (期待する結果):
        assert_eq!(result, Err(ValidationError::InvalidUserIdCharacter));
    }

    #[test]
    fn test_user_id_rejects_dot_segments() {
        // テスト項目: "." と ".." は予約済みでエラーになり、ドットを含む通常の ID は使える
        // given (前提条件):
        let values = [".", ".."];

        // when (操作) / then (期待する結果):
        for value in values {
            assert_eq!(
                UserId::try_from(value),
                Err(ValidationError::ReservedUserId(value.to_string()))
            );
        }
        assert!(UserId::try_from("...").is_ok());
        assert!(UserId::try_from("a.b").is_ok());
    }
}
