//! ドメイン層
//!
//! ルーティングエンジンが扱う値オブジェクト、接続ハンドル、外部コラボレータの
//! インターフェースを定義します。具体的な実装は Infrastructure 層が提供します。

pub mod collaborator;
pub mod connection;
pub mod error;
pub mod value_object;

pub use collaborator::{HistoryService, PersistenceService};
pub use connection::{ConnectionEntry, ConnectionHandle, ConnectionId, ConnectionOutbox};
pub use error::{CollaboratorError, TransportError, ValidationError};
pub use value_object::UserId;
