//! File-backed message repository.
//!
//! Each receiver has one file, `<dir>/<user>.json`, holding a pretty-printed
//! JSON array of serialized envelopes in arrival order. The stem is the
//! percent-encoded id, so any id the server accepts maps to a file name that
//! stays inside `<dir>`.

use std::path::{Path, PathBuf};

use dengon_shared::store::{MAX_USER_ID_BYTES, RESERVED_USER_IDS, encode_user_id};
use tokio::sync::Mutex;

use crate::error::StoreError;

/// Message store writing one JSON history file per receiver.
///
/// Appends are read-modify-write, so every file operation runs under one lock.
#[derive(Debug)]
pub struct FileMessageStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl FileMessageStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| StoreError::io(&dir, e))?;
        Ok(Self {
            dir,
            lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Append a serialized message to the receiver's history.
    ///
    /// Returns the number of messages stored for the receiver afterwards.
    pub async fn append(&self, receiver: &str, message: String) -> Result<usize, StoreError> {
        let path = self.path_for(receiver)?;
        let _guard = self.lock.lock().await;

        let mut messages = read_history(&path).await?;
        messages.push(message);
        write_history(&path, &messages).await?;

        tracing::debug!("Stored message #{} for '{}'", messages.len(), receiver);
        Ok(messages.len())
    }

    /// Messages stored for `user`, oldest first. Empty when there are none.
    pub async fn history(&self, user: &str) -> Result<Vec<String>, StoreError> {
        let path = self.path_for(user)?;
        let _guard = self.lock.lock().await;
        read_history(&path).await
    }

    fn path_for(&self, user: &str) -> Result<PathBuf, StoreError> {
        if user.is_empty()
            || user.len() > MAX_USER_ID_BYTES
            || RESERVED_USER_IDS.contains(&user)
        {
            return Err(StoreError::InvalidUserId(user.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", encode_user_id(user))))
    }
}

async fn read_history(path: &Path) -> Result<Vec<String>, StoreError> {
    let data = match tokio::fs::read(path).await {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StoreError::io(path, e)),
    };
    serde_json::from_slice(&data).map_err(|source| StoreError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

/// Write through a temporary file and rename, so readers never see a torn file.
async fn write_history(path: &Path, messages: &[String]) -> Result<(), StoreError> {
    let data = serde_json::to_vec_pretty(messages)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, data)
        .await
        .map_err(|e| StoreError::io(&tmp, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| StoreError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_append_then_history_keeps_order() {
        // テスト項目: 追加したメッセージが追加順で履歴として返る
        // given (前提条件):
        let dir = tempdir().unwrap();
        let store = FileMessageStore::open(dir.path()).await.unwrap();

        // when (操作):
        store.append("bob", "first".to_string()).await.unwrap();
        let count = store.append("bob", "second".to_string()).await.unwrap();

        // then (期待する結果):
        assert_eq!(count, 2);
        assert_eq!(store.history("bob").await.unwrap(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_missing_history_is_empty() {
        // テスト項目: ファイルのない利用者の履歴は空になる
        // given (前提条件):
        let dir = tempdir().unwrap();
        let store = FileMessageStore::open(dir.path()).await.unwrap();

        // when (操作):
        let history = store.history("nobody").await.unwrap();

        // then (期待する結果):
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn test_file_is_pretty_printed_json_array() {
        // テスト項目: <dir>/<receiver>.json に整形済みの JSON 配列として保存される
        // given (前提条件):
        let dir = tempdir().unwrap();
        let store = FileMessageStore::open(dir.path()).await.unwrap();

        // when (操作):
        store
            .append("bob", r#"{"text":"hi"}"#.to_string())
            .await
            .unwrap();

        // then (期待する結果):
        let raw = std::fs::read_to_string(dir.path().join("bob.json")).unwrap();
        assert!(raw.contains('\n'));
        let parsed: Vec<String> = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed, vec![r#"{"text":"hi"}"#]);
        assert!(!dir.path().join("bob.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_histories_are_kept_per_receiver() {
        // テスト項目: 受信者ごとに別々の履歴になる
        // given (前提条件):
        let dir = tempdir().unwrap();
        let store = FileMessageStore::open(dir.path()).await.unwrap();

        // when (操作):
        store.append("alice", "for alice".to_string()).await.unwrap();
        store.append("bob", "for bob".to_string()).await.unwrap();

        // then (期待する結果):
        assert_eq!(store.history("alice").await.unwrap(), vec!["for alice"]);
        assert_eq!(store.history("bob").await.unwrap(), vec!["for bob"]);
    }

    #[tokio::test]
    async fn test_empty_and_overlong_user_ids_are_rejected() {
        // テスト項目: 空の ID、上限バイト数を超える ID、"." と ".." は InvalidUserId になる
        // given (前提条件):
        let dir = tempdir().unwrap();
        let store = FileMessageStore::open(dir.path()).await.unwrap();
        let overlong = "é".repeat(MAX_USER_ID_BYTES / 2 + 1);

        // when (操作):
        let results = [
            store.append("", "x".to_string()).await,
            store.append(&overlong, "x".to_string()).await,
            store.append(".", "x".to_string()).await,
            store.append("..", "x".to_string()).await,
        ];

        // then (期待する結果):
        for result in results {
            assert!(matches!(result, Err(StoreError::InvalidUserId(_))));
        }
    }

    #[tokio::test]
    async fn test_any_server_user_id_round_trips() {
        // テスト項目: 記号や非 ASCII を含む ID でも保存した履歴がそのまま取得できる
        // given (前提条件):
        let dir = tempdir().unwrap();
        let store = FileMessageStore::open(dir.path()).await.unwrap();
        let ids = ["élan", "a@b", "日本語", "x.y", "...", "a/b"];

        // when (操作):
        for id in ids {
            store.append(id, format!("for {}", id)).await.unwrap();
        }

        // then (期待する結果):
        for id in ids {
            assert_eq!(store.history(id).await.unwrap(), vec![format!("for {}", id)]);
        }
        assert!(dir.path().join("%C3%A9lan.json").exists());
    }

    #[tokio::test]
    async fn test_path_like_user_ids_stay_inside_the_directory() {
        // テスト項目: パス区切りを含む ID もストアのディレクトリ直下のファイルになる
        // given (前提条件):
        let root = tempdir().unwrap();
        let dir = root.path().join("messages");
        let store = FileMessageStore::open(&dir).await.unwrap();

        // when (操作):
        store.append("../escape", "x".to_string()).await.unwrap();
        store.append(".hidden", "x".to_string()).await.unwrap();

        // then (期待する結果):
        assert!(!root.path().join("escape.json").exists());
        let mut names: Vec<String> = std::fs::read_dir(&dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        assert_eq!(names, vec!["%2E%2E%2Fescape.json", "%2Ehidden.json"]);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_not_overwritten() {
        // テスト項目: 壊れた履歴ファイルはエラーになり、上書きされない
        // given (前提条件):
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("bob.json"), "not json").unwrap();
        let store = FileMessageStore::open(dir.path()).await.unwrap();

        // when (操作):
        let result = store.append("bob", "new".to_string()).await;

        // then (期待する結果):
        assert!(matches!(result, Err(StoreError::Corrupt { .. })));
        let raw = std::fs::read_to_string(dir.path().join("bob.json")).unwrap();
        assert_eq!(raw, "not json");
    }

    #[tokio::test]
    async fn test_open_creates_directory() {
        // テスト項目: 存在しないディレクトリは open 時に作成される
        // given (前提条件):
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b");

        // when (操作):
        let store = FileMessageStore::open(&nested).await.unwrap();

        // then (期待する結果):
        assert!(nested.is_dir());
        assert_eq!(store.dir(), nested.as_path());
    }
}
