//! dengon CLI chat client.
//!
//! Registers a user with a chat node, sends `to:<user> <message>` lines typed
//! at the prompt and prints what arrives.

mod domain;
mod error;
mod formatter;
mod runner;
mod session;
mod ui;

pub use domain::{Input, parse_input};
pub use error::ClientError;
pub use runner::run_client;
pub use session::run_client_session;
pub use ui::spawn_input_reader;
