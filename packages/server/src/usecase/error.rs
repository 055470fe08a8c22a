//! UseCase 層のエラー型

use thiserror::Error;

use crate::domain::{UserId, ValidationError};

/// 登録処理のエラー
///
/// いずれの場合も接続には `registration-error` が返され、接続自体は継続します。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegisterError {
    #[error("invalid user id: {0}")]
    InvalidIdentity(#[from] ValidationError),

    #[error("user '{0}' is already registered")]
    DuplicateIdentity(UserId),

    #[error("connection is already registered as '{0}'")]
    ConnectionAlreadyRegistered(UserId),
}

/// ルーティング（chat の受け付け）のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    #[error("chat envelope has no receiver")]
    MissingReceiver,

    #[error("invalid receiver: {0}")]
    InvalidReceiver(ValidationError),

    #[error("routing engine is shutting down")]
    QueueClosed,
}
