//! Connection Registry
//!
//! ## 責務
//!
//! - ユーザー ID から接続中の `ConnectionEntry` へのマップを保持する
//! - 「このユーザーにいま届くか」を判断する唯一の情報源
//!
//! ## ロック
//!
//! 読み取りは共有ロック、登録・削除は排他ロックで直列化します。ロックはマップ操作の
//! 間だけ保持し、ネットワーク I/O をまたいで保持することはありません。
//! 削除時のトランスポートのクローズは同じ排他ロックの内側で行い、
//! 「閉じたハンドルがまだ登録されている」瞬間を作りません。

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::domain::{ConnectionEntry, ConnectionHandle, ConnectionId, UserId};

/// Concurrency-safe map of identity to live connection.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    entries: RwLock<HashMap<UserId, ConnectionEntry>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection for `identity`.
    ///
    /// Returns `false` without touching the map when the identity is already
    /// registered; an active session is never overwritten.
    pub async fn register(&self, identity: UserId, handle: ConnectionHandle) -> bool {
        let mut entries = self.entries.write().await;
        if entries.contains_key(&identity) {
            tracing::debug!("Identity '{}' already registered", identity);
            return false;
        }
        tracing::debug!(
            "Registering '{}' on connection {}",
            identity,
            handle.id()
        );
        entries.insert(identity.clone(), ConnectionEntry::new(identity, handle));
        true
    }

    /// Close and remove the connection registered for `identity`.
    ///
    /// Returns whether an entry was removed; absent identities are a no-op.
    pub async fn remove(&self, identity: &UserId) -> bool {
        let mut entries = self.entries.write().await;
        match entries.remove(identity) {
            Some(entry) => {
                entry.handle().close();
                tracing::debug!("Removed '{}' from registry", identity);
                true
            }
            None => false,
        }
    }

    /// Close and remove `identity` only if it is still bound to `connection_id`.
    ///
    /// Used when a connection's loops end, so that a stale connection never
    /// evicts a newer registration of the same identity.
    pub async fn remove_connection(&self, identity: &UserId, connection_id: ConnectionId) -> bool {
        let mut entries = self.entries.write().await;
        if entries
            .get(identity)
            .is_some_and(|entry| entry.connection_id() == connection_id)
        {
            if let Some(entry) = entries.remove(identity) {
                entry.handle().close();
            }
            tracing::debug!(
                "Removed '{}' (connection {}) from registry",
                identity,
                connection_id
            );
            return true;
        }
        false
    }

    /// Close and remove every connection. Returns how many were removed.
    pub async fn clear(&self) -> usize {
        let mut entries = self.entries.write().await;
        for entry in entries.values() {
            entry.handle().close();
        }
        let removed = entries.len();
        entries.clear();
        removed
    }

    pub async fn lookup(&self, identity: &UserId) -> Option<ConnectionEntry> {
        self.entries.read().await.get(identity).cloned()
    }

    /// Registered identities, sorted.
    pub async fn identities(&self) -> Vec<UserId> {
        let mut identities: Vec<UserId> = self.entries.read().await.keys().cloned().collect();
        identities.sort();
        identities
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ConnectionOutbox;
    use std::{sync::Arc, time::Duration};

    // ========================================
    // テスト作業記録
    // ========================================
    // 【何をテストするか】
    // - register / remove / remove_connection / lookup の基本動作
    // - 同一 ID の同時登録で成功するのが 1 件だけであること
    //
    // 【なぜこのテストが必要か】
    // - Registry は配送可否を決める唯一の情報源
    // - 二つ目の接続がアクティブなセッションを乗っ取らないことを保証する
    // ========================================

    fn user(id: &str) -> UserId {
        UserId::new(id.to_string()).unwrap()
    }

    fn connection() -> (ConnectionHandle, ConnectionOutbox) {
        ConnectionHandle::channel(8, Duration::from_millis(50))
    }

    #[tokio::test]
    async fn test_register_and_lookup() {
        // テスト項目: 登録した接続を lookup で取得できる
        // given (前提条件):
        let registry = ConnectionRegistry::new();
        let (alice, _outbox) = connection();

        // when (操作):
        let registered = registry.register(user("alice"), alice.clone()).await;

        // then (期待する結果):
        assert!(registered);
        let entry = registry.lookup(&user("alice")).await.unwrap();
        assert_eq!(entry.identity().as_str(), "alice");
        assert_eq!(entry.connection_id(), alice.id());
    }

    #[tokio::test]
    async fn test_duplicate_register_is_rejected_without_overwrite() {
        // テスト項目: 登録済み ID の再登録は false を返し、最初の接続が維持される
        // given (前提条件):
        let registry = ConnectionRegistry::new();
        let (first, _first_outbox) = connection();
        let (second, _second_outbox) = connection();
        registry.register(user("alice"), first.clone()).await;

        // when (操作):
        let registered = registry.register(user("alice"), second).await;

        // then (期待する結果):
        assert!(!registered);
        let entry = registry.lookup(&user("alice")).await.unwrap();
        assert_eq!(entry.connection_id(), first.id());
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_register_exactly_one_wins() {
        // テスト項目: 同一 ID への同時登録で成功するのは 1 件だけ
        // given (前提条件):
        let registry = Arc::new(ConnectionRegistry::new());

        // when (操作):
        let tasks: Vec<_> = (0..32)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move {
                    let (handle, _outbox) = connection();
                    registry.register(user("alice"), handle).await
                })
            })
            .collect();
        let mut successes = 0;
        for task in tasks {
            if task.await.unwrap() {
                successes += 1;
            }
        }

        // then (期待する結果):
        assert_eq!(successes, 1);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_remove_closes_handle_and_allows_reregister() {
        // テスト項目: remove でハンドルが閉じられ、同じ ID で再登録できる
        // given (前提条件):
        let registry = ConnectionRegistry::new();
        let (first, _first_outbox) = connection();
        let (second, _second_outbox) = connection();
        registry.register(user("alice"), first.clone()).await;

        // when (操作):
        let removed = registry.remove(&user("alice")).await;
        let reregistered = registry.register(user("alice"), second).await;

        // then (期待する結果):
        assert!(removed);
        assert!(first.is_closed());
        assert!(reregistered);
    }

    #[tokio::test]
    async fn test_remove_absent_identity_is_noop() {
        // テスト項目: 未登録 ID の remove は何もしない
        // given (前提条件):
        let registry = ConnectionRegistry::new();

        // when (操作):
        let removed = registry.remove(&user("ghost")).await;

        // then (期待する結果):
        assert!(!removed);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_remove_connection_ignores_newer_registration() {
        // テスト項目: 古い接続の remove_connection は新しい登録を削除しない
        // given (前提条件):
        let registry = ConnectionRegistry::new();
        let (stale, _stale_outbox) = connection();
        let (current, _current_outbox) = connection();
        registry.register(user("alice"), stale.clone()).await;
        registry.remove(&user("alice")).await;
        registry.register(user("alice"), current.clone()).await;

        // when (操作):
        let removed = registry.remove_connection(&user("alice"), stale.id()).await;

        // then (期待する結果):
        assert!(!removed);
        assert!(!current.is_closed());
        let entry = registry.lookup(&user("alice")).await.unwrap();
        assert_eq!(entry.connection_id(), current.id());
    }

    #[tokio::test]
    async fn test_clear_closes_every_connection() {
        // テスト項目: clear ですべての接続が閉じられ、Registry が空になる
        // given (前提条件):
        let registry = ConnectionRegistry::new();
        let (alice, _alice_outbox) = connection();
        let (bob, _bob_outbox) = connection();
        registry.register(user("alice"), alice.clone()).await;
        registry.register(user("bob"), bob.clone()).await;

        // when (操作):
        let removed = registry.clear().await;

        // then (期待する結果):
        assert_eq!(removed, 2);
        assert!(alice.is_closed());
        assert!(bob.is_closed());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_identities_are_sorted() {
        // テスト項目: 登録中の ID 一覧がソートされて返される
        // given (前提条件):
        let registry = ConnectionRegistry::new();
        let connections: Vec<_> = (0..3).map(|_| connection()).collect();
        for (name, (handle, _)) in ["charlie", "alice", "bob"].iter().zip(&connections) {
            registry.register(user(name), handle.clone()).await;
        }

        // when (操作):
        let identities = registry.identities().await;

        // then (期待する結果):
        let names: Vec<&str> = identities.iter().map(UserId::as_str).collect();
        assert_eq!(names, vec!["alice", "bob", "charlie"]);
    }
}
