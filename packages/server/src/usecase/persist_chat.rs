//! UseCase: 永続化への転送（Durability Forwarder）
//!
//! 永続化キューを消費し、エンベロープごとに永続化サービスの `save` を別タスクで
//! 呼び出します。配送経路をブロックすることはありません。保存の失敗はログに
//! 記録するだけで、リトライも呼び出し元への通知もしません。
//!
//! 同時に走る保存タスクの数はセマフォで制限し、各タスクは `TaskTracker` で
//! 追跡してシャットダウン時に待ち合わせます。

use std::sync::Arc;

use dengon_shared::Envelope;
use tokio::sync::{Semaphore, mpsc};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::domain::{PersistenceService, UserId};

/// 永続化転送のユースケース
pub struct PersistChatUseCase {
    persistence: Arc<dyn PersistenceService>,
    tracker: TaskTracker,
    in_flight: Arc<Semaphore>,
}

impl PersistChatUseCase {
    /// # Arguments
    ///
    /// * `max_in_flight` - 同時に実行する保存タスクの上限
    pub fn new(
        persistence: Arc<dyn PersistenceService>,
        tracker: TaskTracker,
        max_in_flight: usize,
    ) -> Self {
        Self {
            persistence,
            tracker,
            in_flight: Arc::new(Semaphore::new(max_in_flight.max(1))),
        }
    }

    /// 1 件のエンベロープの保存タスクを起動する
    ///
    /// 上限に達している場合は空きが出るまで待ちます。保存の完了は待ちません。
    pub async fn execute(&self, envelope: Envelope) {
        let receiver = match UserId::new(envelope.receiver.clone()) {
            Ok(receiver) => receiver,
            Err(e) => {
                tracing::warn!("Not persisting message with invalid receiver: {}", e);
                return;
            }
        };
        let message = match envelope.to_json() {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!("Failed to serialize message for '{}': {}", receiver, e);
                return;
            }
        };
        let Ok(permit) = self.in_flight.clone().acquire_owned().await else {
            return;
        };

        let persistence = self.persistence.clone();
        self.tracker.spawn(async move {
            if let Err(e) = persistence.save(receiver.clone(), message).await {
                tracing::warn!("Error persisting message for '{}': {}", receiver, e);
            } else {
                tracing::debug!("Persisted message for '{}'", receiver);
            }
            drop(permit);
        });
    }

    /// 永続化キューを消費し続ける
    ///
    /// `shutdown` が発火した後も、すでにキューにあるエンベロープは転送してから終了します。
    pub async fn run(self, mut queue: mpsc::Receiver<Envelope>, shutdown: CancellationToken) {
        tracing::debug!("Durability forwarder started");
        loop {
            let envelope = tokio::select! {
                biased;
                envelope = queue.recv() => match envelope {
                    Some(envelope) => envelope,
                    None => break,
                },
                _ = shutdown.cancelled() => break,
            };
            self.execute(envelope).await;
        }
        tracing::debug!("Durability forwarder stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{CollaboratorError, collaborator::MockPersistenceService},
        infrastructure::collaborator::InMemoryMessageStore,
    };
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    #[tokio::test]
    async fn test_save_is_invoked_with_receiver_and_serialized_envelope() {
        // テスト項目: 受信者とシリアライズ済みエンベロープで save が 1 回呼ばれる
        // given (前提条件):
        let envelope = Envelope::chat("alice", "bob", "hi");
        let expected = envelope.to_json().unwrap();
        let mut persistence = MockPersistenceService::new();
        persistence
            .expect_save()
            .withf(move |receiver, message| receiver.as_str() == "bob" && *message == expected)
            .times(1)
            .returning(|_, _| Ok(()));
        let tracker = TaskTracker::new();
        let usecase = PersistChatUseCase::new(Arc::new(persistence), tracker.clone(), 4);

        // when (操作):
        usecase.execute(envelope).await;
        tracker.close();
        tracker.wait().await;

        // then (期待する結果):
        // times(1) の検証は mock の drop 時に行われる
    }

    #[tokio::test]
    async fn test_save_failure_is_swallowed() {
        // テスト項目: save の失敗はリトライされず、転送ループも止まらない
        // given (前提条件):
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut persistence = MockPersistenceService::new();
        persistence.expect_save().returning(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(CollaboratorError::Unavailable("store down".to_string()))
        });
        let tracker = TaskTracker::new();
        let usecase = PersistChatUseCase::new(Arc::new(persistence), tracker.clone(), 4);
        let (tx, rx) = mpsc::channel(4);
        tx.send(Envelope::chat("alice", "bob", "one")).await.unwrap();
        tx.send(Envelope::chat("alice", "bob", "two")).await.unwrap();
        drop(tx);

        // when (操作):
        usecase.run(rx, CancellationToken::new()).await;
        tracker.close();
        tracker.wait().await;

        // then (期待する結果):
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_run_drains_queue_after_shutdown() {
        // テスト項目: 停止シグナル発火時点でキューに残っているエンベロープも保存される
        // given (前提条件):
        let store = Arc::new(InMemoryMessageStore::new());
        let tracker = TaskTracker::new();
        let usecase = PersistChatUseCase::new(store.clone(), tracker.clone(), 1);
        let (tx, rx) = mpsc::channel(8);
        for text in ["a", "b", "c"] {
            tx.send(Envelope::chat("alice", "bob", text)).await.unwrap();
        }
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        // when (操作):
        usecase.run(rx, shutdown).await;
        tracker.close();
        tokio::time::timeout(Duration::from_secs(1), tracker.wait())
            .await
            .unwrap();

        // then (期待する結果):
        let bob = UserId::new("bob".to_string()).unwrap();
        assert_eq!(store.messages_for(&bob).await.len(), 3);
    }
}
