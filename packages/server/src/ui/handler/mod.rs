//! HTTP / WebSocket handlers.

mod http;
mod relay;
mod websocket;

pub use http::{health_check, list_users};
pub use relay::{
    disconnect as relay_disconnect, listen as relay_listen, register as relay_register,
    send as relay_send,
};
pub use websocket::websocket_handler;
