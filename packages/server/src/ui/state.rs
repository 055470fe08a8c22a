//! Server state shared by the handlers.

use std::sync::Arc;

use crate::{infrastructure::outbound::ClientManager, usecase::Hub};

/// Shared application state
pub struct AppState {
    /// Hub（ルーティングエンジン）
    pub hub: Arc<Hub>,
    /// Relay API が使う Outbound Client の管理
    pub relay: Arc<ClientManager>,
}
