//! UseCase: chat の受け付け
//!
//! 読み取りループから呼ばれ、chat エンベロープを配送キューと永続化キューの
//! 両方に積みます。配送や永続化の完了は待ちません。キューが満杯の場合は
//! 空きが出るまで待機し、その間は呼び出し元の読み取りループが止まります
//! （バックプレッシャー）。

use dengon_shared::Envelope;
use tokio::sync::mpsc;

use crate::domain::UserId;

use super::error::RoutingError;

/// chat 受け付けのユースケース
#[derive(Debug, Clone)]
pub struct SendChatUseCase {
    chat_queue: mpsc::Sender<Envelope>,
    durability_queue: mpsc::Sender<Envelope>,
}

impl SendChatUseCase {
    pub fn new(
        chat_queue: mpsc::Sender<Envelope>,
        durability_queue: mpsc::Sender<Envelope>,
    ) -> Self {
        Self {
            chat_queue,
            durability_queue,
        }
    }

    /// chat エンベロープを配送キューと永続化キューに積む
    ///
    /// 受信者が空、または ID として不正な場合はどちらのキューにも積みません。
    pub async fn execute(&self, envelope: Envelope) -> Result<(), RoutingError> {
        if envelope.receiver.is_empty() {
            return Err(RoutingError::MissingReceiver);
        }
        UserId::new(envelope.receiver.clone()).map_err(RoutingError::InvalidReceiver)?;

        tracing::debug!(
            "Routing chat from '{}' to '{}'",
            envelope.sender,
            envelope.receiver
        );
        self.chat_queue
            .send(envelope.clone())
            .await
            .map_err(|_| RoutingError::QueueClosed)?;
        self.durability_queue
            .send(envelope)
            .await
            .map_err(|_| RoutingError::QueueClosed)?;
        Ok(())
    }
}
