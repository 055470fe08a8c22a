//! File-backed message store for dengon.
//!
//! Serves the persistence and history API the chat server talks to through
//! `--store-url`.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin dengon-store
//! cargo run --bin dengon-store -- --port 8081 --dir ./messages
//! ```

use std::sync::Arc;

use clap::Parser;
use dengon_shared::logger::setup_logger;
use dengon_store::{FileMessageStore, StoreServer, config::StoreArgs};

#[tokio::main]
async fn main() {
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = StoreArgs::parse();

    let store = match FileMessageStore::open(&args.dir).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::error!("Failed to open message store: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = StoreServer::new(store).run(args.host, args.port).await {
        tracing::error!("Store error: {}", e);
        std::process::exit(1);
    }
}
