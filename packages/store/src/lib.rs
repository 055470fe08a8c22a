//! dengon message store.
//!
//! Persistence and history collaborator of the chat server: chats are appended
//! per receiver to a JSON file and read back as that receiver's history.

pub mod config;
pub mod error;
pub mod repository;
pub mod server;

pub use error::StoreError;
pub use repository::FileMessageStore;
pub use server::StoreServer;
