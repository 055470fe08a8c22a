//! UseCase: セッション終了処理
//!
//! session-end の受信時と、接続の読み書きループ終了時の両方から呼ばれます。
//! 削除するのは「この接続に紐付いた ID」だけで、同じ ID の新しい登録には触れません。

use std::sync::Arc;

use crate::{
    domain::{ConnectionId, UserId},
    infrastructure::ConnectionRegistry,
};

/// セッション終了のユースケース
pub struct EndSessionUseCase {
    registry: Arc<ConnectionRegistry>,
}

impl EndSessionUseCase {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// 接続に紐付いた ID を Registry から削除し、トランスポートを閉じる
    ///
    /// # Returns
    ///
    /// Registry からエントリを削除した場合は `true`
    pub async fn execute(&self, identity: Option<&UserId>, connection_id: ConnectionId) -> bool {
        let Some(identity) = identity else {
            tracing::debug!("Connection {} ended without registration", connection_id);
            return false;
        };
        let removed = self.registry.remove_connection(identity, connection_id).await;
        if removed {
            tracing::info!("Session of '{}' ended", identity);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ConnectionHandle;
    use std::time::Duration;

    fn user(id: &str) -> UserId {
        UserId::new(id.to_string()).unwrap()
    }

    #[tokio::test]
    async fn test_end_session_removes_and_closes() {
        // テスト項目: セッション終了で Registry から削除され、ハンドルが閉じられる
        // given (前提条件):
        let registry = Arc::new(ConnectionRegistry::new());
        let (handle, _outbox) = ConnectionHandle::channel(4, Duration::from_millis(50));
        registry.register(user("alice"), handle.clone()).await;
        let usecase = EndSessionUseCase::new(registry.clone());

        // when (操作):
        let removed = usecase.execute(Some(&user("alice")), handle.id()).await;

        // then (期待する結果):
        assert!(removed);
        assert!(handle.is_closed());
        assert!(registry.lookup(&user("alice")).await.is_none());
    }

    #[tokio::test]
    async fn test_end_session_of_unregistered_connection_is_noop() {
        // テスト項目: 未登録の接続のセッション終了は Registry に影響しない
        // given (前提条件):
        let registry = Arc::new(ConnectionRegistry::new());
        let (other, _outbox) = ConnectionHandle::channel(4, Duration::from_millis(50));
        registry.register(user("bob"), other).await;
        let usecase = EndSessionUseCase::new(registry.clone());

        // when (操作):
        let removed = usecase.execute(None, crate::domain::ConnectionId::new()).await;

        // then (期待する結果):
        assert!(!removed);
        assert_eq!(registry.len().await, 1);
    }
}
