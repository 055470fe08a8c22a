//! 外部コラボレータ trait 定義
//!
//! 永続化と履歴取得は別プロセスのサービスが担います。ルーティングエンジンは
//! この狭い契約にのみ依存し、具体的な実装（HTTP クライアント、インメモリ）は
//! Infrastructure 層が提供します（依存性の逆転）。
//!
//! どちらの呼び出しも失敗はログに記録されるだけで、チャット利用者には通知されません。

use async_trait::async_trait;

use super::{error::CollaboratorError, value_object::UserId};

/// 永続化サービス
///
/// 受信者ごとにシリアライズ済みメッセージを保存する。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PersistenceService: Send + Sync {
    /// メッセージを受信者の履歴に追加
    async fn save(&self, receiver: UserId, message: String) -> Result<(), CollaboratorError>;
}

/// 履歴サービス
///
/// 登録成功時に一度だけ呼ばれ、そのユーザー宛の保存済みメッセージを古い順に返す。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HistoryService: Send + Sync {
    /// ユーザー宛の保存済みメッセージを取得
    async fn fetch(&self, user: UserId) -> Result<Vec<String>, CollaboratorError>;
}
