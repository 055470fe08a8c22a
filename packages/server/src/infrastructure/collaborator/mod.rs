//! 永続化・履歴コラボレータの実装
//!
//! - `http`: dengon-store の HTTP API を呼び出す実装
//! - `inmemory`: プロセス内で完結する実装（ストア未設定時・テスト用）

pub mod http;
pub mod inmemory;

pub use http::HttpMessageStore;
pub use inmemory::InMemoryMessageStore;
