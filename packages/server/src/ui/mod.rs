//! HTTP / WebSocket surface of the chat server.

mod handler;
mod server;
pub mod state;

pub use server::Server;
