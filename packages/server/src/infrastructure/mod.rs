//! Infrastructure 層
//!
//! - `registry`: 接続中ユーザーのインメモリ Registry
//! - `collaborator`: 永続化・履歴サービスのクライアント実装
//! - `outbound`: 他のチャットノードへ接続する Outbound Client Adapter

pub mod collaborator;
pub mod outbound;
pub mod registry;

pub use registry::ConnectionRegistry;
