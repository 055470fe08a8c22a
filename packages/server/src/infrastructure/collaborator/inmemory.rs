//! InMemory コラボレータ実装
//!
//! 受信者ごとのメッセージ列を HashMap に保持し、永続化と履歴の両方の trait を
//! 実装します。ストアサービスを設定せずにサーバーを起動した場合と、テストで使用します。
//! プロセス終了とともに内容は失われます。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{CollaboratorError, HistoryService, PersistenceService, UserId};

/// インメモリのメッセージストア
#[derive(Debug, Default)]
pub struct InMemoryMessageStore {
    messages: Mutex<HashMap<UserId, Vec<String>>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 受信者宛に保存されたメッセージを取得（保存順）
    pub async fn messages_for(&self, receiver: &UserId) -> Vec<String> {
        self.messages
            .lock()
            .await
            .get(receiver)
            .cloned()
            .unwrap_or_default()
    }

    /// 保存されたメッセージの総数
    pub async fn total(&self) -> usize {
        self.messages.lock().await.values().map(Vec::len).sum()
    }
}

#[async_trait]
impl PersistenceService for InMemoryMessageStore {
    async fn save(&self, receiver: UserId, message: String) -> Result<(), CollaboratorError> {
        self.messages
            .lock()
            .await
            .entry(receiver)
            .or_default()
            .push(message);
        Ok(())
    }
}

#[async_trait]
impl HistoryService for InMemoryMessageStore {
    async fn fetch(&self, user: UserId) -> Result<Vec<String>, CollaboratorError> {
        Ok(self.messages_for(&user).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str) -> UserId {
        UserId::new(id.to_string()).unwrap()
    }

    #[tokio::test]
    async fn test_saved_messages_are_fetched_in_order() {
        // テスト項目: 保存したメッセージが保存順に履歴として取得できる
        // given (前提条件):
        let store = InMemoryMessageStore::new();
        store.save(user("bob"), "first".to_string()).await.unwrap();
        store.save(user("bob"), "second".to_string()).await.unwrap();
        store.save(user("carol"), "other".to_string()).await.unwrap();

        // when (操作):
        let history = store.fetch(user("bob")).await.unwrap();

        // then (期待する結果):
        assert_eq!(history, vec!["first".to_string(), "second".to_string()]);
        assert_eq!(store.total().await, 3);
    }

    #[tokio::test]
    async fn test_fetch_unknown_user_is_empty() {
        // テスト項目: 保存のないユーザーの履歴は空になる
        // given (前提条件):
        let store = InMemoryMessageStore::new();

        // when (操作):
        let history = store.fetch(user("nobody")).await.unwrap();

        // then (期待する結果):
        assert!(history.is_empty());
    }
}
