//! UseCase: chat の配送
//!
//! 配送キューの唯一の消費者です。1 件ずつ取り出して受信者を Registry で引き、
//! 見つかればその接続に書き込みます。消費者が 1 つで、各接続は自分の書き込みを
//! 直列化するため、受信者ごとの順序（FIFO）が保たれます。
//!
//! - 受信者が未登録: 黙って破棄（送信者には通知しない）
//! - 書き込み失敗: リトライも再投入もせず、失敗した接続を Registry から外す
//! - outbox が `delivery_timeout` 以上満杯: 書き込み失敗と同じ扱い（1 人の遅い受信者で
//!   他の受信者への配送を止めない）

use std::{sync::Arc, time::Duration};

use dengon_shared::Envelope;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    domain::{TransportError, UserId},
    infrastructure::ConnectionRegistry,
};

/// 1 件の配送結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    ReceiverOffline,
    Failed(TransportError),
}

/// chat 配送のユースケース
pub struct DeliverChatUseCase {
    registry: Arc<ConnectionRegistry>,
    delivery_timeout: Duration,
}

impl DeliverChatUseCase {
    pub fn new(registry: Arc<ConnectionRegistry>, delivery_timeout: Duration) -> Self {
        Self {
            registry,
            delivery_timeout,
        }
    }

    /// 1 件のエンベロープを受信者の接続に書き込む
    pub async fn execute(&self, envelope: Envelope) -> Delivery {
        let Ok(receiver) = UserId::new(envelope.receiver.clone()) else {
            return Delivery::ReceiverOffline;
        };
        let Some(entry) = self.registry.lookup(&receiver).await else {
            tracing::debug!("Receiver '{}' is not connected, dropping message", receiver);
            return Delivery::ReceiverOffline;
        };

        match entry
            .handle()
            .deliver_within(envelope, self.delivery_timeout)
            .await
        {
            Ok(()) => Delivery::Delivered,
            Err(e) => {
                tracing::warn!("Failed to deliver message to '{}': {}", receiver, e);
                self.registry
                    .remove_connection(&receiver, entry.connection_id())
                    .await;
                Delivery::Failed(e)
            }
        }
    }

    /// 配送キューを消費し続ける
    ///
    /// `shutdown` が発火した後も、すでにキューにあるエンベロープは配送してから終了します。
    pub async fn run(self, mut queue: mpsc::Receiver<Envelope>, shutdown: CancellationToken) {
        tracing::debug!("Chat delivery loop started");
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
        tracing::debug!("Chat delivery loop stopped");
    }
}
