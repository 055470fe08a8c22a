//! Real-time chat routing server.
//!
//! Routes chat envelopes between users connected over WebSocket and forwards
//! every chat to the message store.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin dengon-server
//! cargo run --bin dengon-server -- --host 0.0.0.0 --port 8080 --store-url http://127.0.0.1:8081
//! ```

use std::sync::Arc;

use clap::Parser;
use dengon_server::{
    config::ServerArgs,
    domain::{HistoryService, PersistenceService},
    infrastructure::{
        ConnectionRegistry,
        collaborator::{HttpMessageStore, InMemoryMessageStore},
        outbound::ClientManager,
    },
    ui::Server,
    usecase::Hub,
};
use dengon_shared::{logger::setup_logger, time::SystemClock};

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "debug");

    let args = ServerArgs::parse();

    // Initialize dependencies in order:
    // 1. Collaborators (persistence / history)
    // 2. Registry
    // 3. Hub
    // 4. Relay client manager
    // 5. Server

    // 1. Collaborators
    let (persistence, history): (Arc<dyn PersistenceService>, Arc<dyn HistoryService>) =
        match &args.store_url {
            Some(store_url) => match HttpMessageStore::new(store_url.clone(), args.store_timeout()) {
                Ok(store) => {
                    tracing::info!("Using message store at {}", store_url);
                    let store = Arc::new(store);
                    let persistence: Arc<dyn PersistenceService> = store.clone();
                    let history: Arc<dyn HistoryService> = store;
                    (persistence, history)
                }
                Err(e) => {
                    tracing::error!("Failed to create message store client: {}", e);
                    std::process::exit(1);
                }
            },
            None => {
                tracing::warn!("No --store-url given; messages are kept in memory only");
                let store = Arc::new(InMemoryMessageStore::new());
                let persistence: Arc<dyn PersistenceService> = store.clone();
                let history: Arc<dyn HistoryService> = store;
                (persistence, history)
            }
        };

    // 2. Registry
    let registry = Arc::new(ConnectionRegistry::new());

    // 3. Hub
    let hub = Arc::new(Hub::start(
        args.hub_config(),
        registry,
        persistence,
        history,
        Arc::new(SystemClock),
    ));

    // 4. Relay client manager
    let relay = Arc::new(ClientManager::new(
        args.relay_upstream.clone(),
        args.outbound_config(),
    ));

    // 5. Server
    let server = Server::new(hub, relay);
    if let Err(e) = server.run(args.host, args.port).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
