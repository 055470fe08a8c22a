//! UseCase 層
//!
//! ルーティングエンジン（Hub）と、Hub が組み合わせる個々のユースケースを定義します。
//! ユースケースは Domain 層の trait と Infrastructure 層の Registry にのみ依存します。

pub mod deliver_chat;
pub mod end_session;
pub mod error;
pub mod hub;
pub mod persist_chat;
pub mod register_user;
pub mod send_chat;

pub use deliver_chat::{DeliverChatUseCase, Delivery};
pub use end_session::EndSessionUseCase;
pub use error::{RegisterError, RoutingError};
pub use hub::{Dispatch, Hub, HubConfig, Session};
pub use persist_chat::PersistChatUseCase;
pub use register_user::RegisterUserUseCase;
pub use send_chat::SendChatUseCase;
