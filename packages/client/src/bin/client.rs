//! Interactive dengon chat client with reconnection support.
//!
//! Registers `--user-id` with a chat node, then reads lines at the prompt:
//! `to:<user> <message>` sends a chat message, `quit` ends the session.
//! Reconnects on a lost connection (max 5 attempts with 5 second interval);
//! a user id that is already taken exits immediately.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin dengon-client -- --user-id alice
//! cargo run --bin dengon-client -- -i bob -u ws://127.0.0.1:8080/ws
//! ```

use clap::Parser;

use dengon_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "dengon-client")]
#[command(about = "Interactive chat client for a dengon node", long_about = None)]
struct Args {
    /// User ID to register as (must be unique on the server)
    #[arg(short = 'i', long, env = "DENGON_USER_ID")]
    user_id: String,

    /// WebSocket URL of the chat node
    #[arg(short = 'u', long, env = "DENGON_URL", default_value = "ws://127.0.0.1:8080/ws")]
    url: String,
}

#[tokio::main]
async fn main() {
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();

    if let Err(e) = dengon_client::run_client(args.url, args.user_id).await {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }
}
