//! UseCase: ユーザー登録処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - RegisterUserUseCase::execute() メソッド
//! - 登録成功時の応答と履歴配信、重複登録時のエラー応答
//!
//! ### なぜこのテストが必要か
//! - 二つ目の接続がアクティブなセッションを乗っ取らないことを保証する
//! - 履歴は registration-success の後に、保存順で届く必要がある
//!
//! ### どのような状況を想定しているか
//! - 正常系：未登録 ID の登録と履歴配信
//! - 異常系：登録済み ID、空の ID、登録済み接続からの再登録
//! - エッジケース：履歴サービスが利用できない場合（履歴 0 件で登録は成功）

use std::sync::Arc;

use dengon_shared::{Envelope, time::Clock};
use tokio_util::task::TaskTracker;

use crate::{
    domain::{ConnectionHandle, HistoryService, UserId},
    infrastructure::ConnectionRegistry,
};

use super::error::RegisterError;

/// ユーザー登録のユースケース
pub struct RegisterUserUseCase {
    registry: Arc<ConnectionRegistry>,
    history: Arc<dyn HistoryService>,
    clock: Arc<dyn Clock>,
    /// 履歴取得タスクの追跡（シャットダウン時に待ち合わせる）
    tracker: TaskTracker,
}

impl RegisterUserUseCase {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        history: Arc<dyn HistoryService>,
        clock: Arc<dyn Clock>,
        tracker: TaskTracker,
    ) -> Self {
        Self {
            registry,
            history,
            clock,
            tracker,
        }
    }

    /// 登録を実行
    ///
    /// 結果は成功・失敗ともに `handle` へ応答エンベロープとして返します。
    /// 成功時は応答の後に履歴取得タスクを起動します（完了は待ちません）。
    ///
    /// # Arguments
    ///
    /// * `current` - この接続にすでに紐付いている ID（未登録なら `None`）
    /// * `requested` - registration-request の sender
    /// * `handle` - 登録する接続
    pub async fn execute(
        &self,
        current: Option<&UserId>,
        requested: &str,
        handle: &ConnectionHandle,
    ) -> Result<UserId, RegisterError> {
        let result = self.register(current, requested, handle).await;

        let reply = match &result {
            Ok(identity) => Envelope::registration_success(identity.as_str()),
            Err(RegisterError::DuplicateIdentity(_)) => {
                Envelope::registration_error(requested, "User already exists")
            }
            Err(e) => Envelope::registration_error(requested, e.to_string()),
        };
        if let Err(e) = handle
            .deliver(reply.with_timestamp(self.clock.now()))
            .await
        {
            tracing::warn!("Failed to reply to registration of '{}': {}", requested, e);
        }

        if let Ok(identity) = &result {
            self.spawn_history_fetch(identity.clone(), handle.clone());
        }
        result
    }

    async fn register(
        &self,
        current: Option<&UserId>,
        requested: &str,
        handle: &ConnectionHandle,
    ) -> Result<UserId, RegisterError> {
        if let Some(current) = current {
            return Err(RegisterError::ConnectionAlreadyRegistered(current.clone()));
        }
        let identity = UserId::new(requested.to_string())?;
        if !self.registry.register(identity.clone(), handle.clone()).await {
            return Err(RegisterError::DuplicateIdentity(identity));
        }
        tracing::info!("User '{}' registered on connection {}", identity, handle.id());
        Ok(identity)
    }

    fn spawn_history_fetch(&self, identity: UserId, handle: ConnectionHandle) {
        let history = self.history.clone();
        let clock = self.clock.clone();
        self.tracker.spawn(async move {
            let messages = match history.fetch(identity.clone()).await {
                Ok(messages) => messages,
                Err(e) => {
                    tracing::warn!("Error fetching history for '{}': {}", identity, e);
                    return;
                }
            };
            tracing::debug!("Delivering {} historical message(s) to '{}'", messages.len(), identity);
            for stored in messages {
                let envelope =
                    Envelope::historical_from_stored(&stored, identity.as_str(), clock.now());
                if let Err(e) = handle.deliver(envelope).await {
                    tracing::warn!("Stopped history delivery to '{}': {}", identity, e);
                    return;
                }
            }
        });
    }
}
