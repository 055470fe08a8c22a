//! Command-line / environment configuration of the message store.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "dengon-store")]
#[command(about = "File-backed message store for dengon", long_about = None)]
pub struct StoreArgs {
    /// Host address to bind the store to
    #[arg(short = 'H', long, env = "DENGON_STORE_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port number to bind the store to
    #[arg(short = 'p', long, env = "DENGON_STORE_PORT", default_value_t = 8081)]
    pub port: u16,

    /// Directory holding one `<user>.json` history file per receiver
    #[arg(short = 'd', long, env = "DENGON_STORE_DIR", default_value = "messages")]
    pub dir: PathBuf,
}
