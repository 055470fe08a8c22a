//! HTTP を使ったコラボレータ実装
//!
//! ## API
//!
//! - `POST {base_url}/messages` に `SaveMessageRequest` を送信して保存
//! - `GET {base_url}/messages/{user_id}` で保存済みメッセージの配列を取得
//!
//! `user_id` はパーセントエンコードした 1 セグメントとして URL に入れます。
//!
//! 通信エラーはすべて `CollaboratorError` に変換されます。呼び出し側
//! （Durability Forwarder / 履歴取得）はログに残すだけでリトライしません。

use std::time::Duration;

use async_trait::async_trait;
use dengon_shared::store::{SaveMessageRequest, encode_user_id};
use reqwest::Url;

use crate::domain::{CollaboratorError, HistoryService, PersistenceService, UserId};

/// Persistence and history collaborator reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpMessageStore {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpMessageStore {
    /// 新しい HttpMessageStore を作成
    ///
    /// # 引数
    ///
    /// - `base_url`: ストアサービスのベース URL（例: `http://127.0.0.1:8081`）
    /// - `request_timeout`: 1 リクエストあたりのタイムアウト
    ///
    /// URL として解釈できない `base_url` は `Unavailable` になります。
    pub fn new(
        base_url: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, CollaboratorError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| CollaboratorError::Unavailable(e.to_string()))?;
        let base_url = base_url.into();
        let base_url = Url::parse(base_url.trim_end_matches('/')).map_err(|e| {
            CollaboratorError::Unavailable(format!("invalid store url '{}': {}", base_url, e))
        })?;
        Ok(Self { client, base_url })
    }

    /// `{base_url}/messages`, or `{base_url}/messages/{user}` with the id encoded.
    fn messages_url(&self, user: Option<&UserId>) -> Url {
        let mut path = format!("{}/messages", self.base_url.path().trim_end_matches('/'));
        if let Some(user) = user {
            path.push('/');
            path.push_str(&encode_user_id(user.as_str()));
        }
        let mut url = self.base_url.clone();
        url.set_path(&path);
        url
    }

    async fn check_status(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, CollaboratorError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(CollaboratorError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl PersistenceService for HttpMessageStore {
    async fn save(&self, receiver: UserId, message: String) -> Result<(), CollaboratorError> {
        let request = SaveMessageRequest {
            receiver: receiver.into_string(),
            message,
        };
        let response = self
            .client
            .post(self.messages_url(None))
            .json(&request)
            .send()
            .await
            .map_err(|e| CollaboratorError::Unavailable(e.to_string()))?;
        Self::check_status(response).await?;
        Ok(())
    }
}

#[async_trait]
impl HistoryService for HttpMessageStore {
    async fn fetch(&self, user: UserId) -> Result<Vec<String>, CollaboratorError> {
        let response = self
            .client
            .get(self.messages_url(Some(&user)))
            .send()
            .await
            .map_err(|e| CollaboratorError::Unavailable(e.to_string()))?;
        Self::check_status(response)
            .await?
            .json::<Vec<String>>()
            .await
            .map_err(|e| CollaboratorError::InvalidResponse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str) -> UserId {
        UserId::new(id.to_string()).unwrap()
    }

    #[tokio::test]
    async fn test_save_to_unreachable_store_is_unavailable() {
        // テスト項目: 到達できないストアへの保存は Unavailable エラーになる
        // given (前提条件):
        // ポート 9 (discard) には通常何も listen していない
        let store = HttpMessageStore::new("http://127.0.0.1:9/", Duration::from_secs(1)).unwrap();
        let receiver = UserId::new("bob".to_string()).unwrap();

        // when (操作):
        let result = store.save(receiver, "{}".to_string()).await;

        // then (期待する結果):
        assert!(matches!(result, Err(CollaboratorError::Unavailable(_))));
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        // テスト項目: ベース URL 末尾のスラッシュが取り除かれ、パスが二重にならない
        // given (前提条件):
        let base_url = "http://store.local:8081//";

        // when (操作):
        let store = HttpMessageStore::new(base_url, Duration::from_secs(1)).unwrap();

        // then (期待する結果):
        assert_eq!(
            store.messages_url(None).as_str(),
            "http://store.local:8081/messages"
        );
    }

    #[test]
    fn test_base_url_path_prefix_is_kept() {
        // テスト項目: ベース URL のパスの後ろに /messages が付く
        // given (前提条件):
        let store =
            HttpMessageStore::new("http://store.local/api/", Duration::from_secs(1)).unwrap();

        // when (操作):
        let url = store.messages_url(Some(&user("bob")));

        // then (期待する結果):
        assert_eq!(url.as_str(), "http://store.local/api/messages/bob");
    }

    #[test]
    fn test_user_id_is_a_single_encoded_path_segment() {
        // テスト項目: ID に含まれる ? # / . はエンコードされ、クエリやパスとして解釈されない
        // given (前提条件):
        let store =
            HttpMessageStore::new("http://store.local:8081", Duration::from_secs(1)).unwrap();

        // when (操作):
        let query = store.messages_url(Some(&user("bob?x")));
        let fragment = store.messages_url(Some(&user("bob#x")));
        let traversal = store.messages_url(Some(&user("../etc")));

        // then (期待する結果):
        assert_eq!(query.as_str(), "http://store.local:8081/messages/bob%3Fx");
        assert_eq!(query.query(), None);
        assert_eq!(fragment.as_str(), "http://store.local:8081/messages/bob%23x");
        assert_eq!(traversal.as_str(), "http://store.local:8081/messages/%2E%2E%2Fetc");
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        // テスト項目: URL として解釈できないベース URL は Unavailable になる
        // given (前提条件):
        let base_url = "not a url";

        // when (操作):
        let result = HttpMessageStore::new(base_url, Duration::from_secs(1));

        // then (期待する結果):
        assert!(matches!(result, Err(CollaboratorError::Unavailable(_))));
    }
}
