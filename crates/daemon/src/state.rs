use std::sync::Arc;

use broadcaster_connection_manager::ConnectionManager;
use broadcaster_store::Store;
use broadcaster_wire::Config;

use crate::sink::WsSink;

/// Shared state handed to every axum handler and websocket task: the
/// store, the connection manager built over it, the process config,
/// and the per-connection sink the dispatcher fans tick messages
/// through (spec.md section 5).
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store + Send + Sync>,
    pub connection_manager: Arc<ConnectionManager>,
    pub config: Arc<Config>,
    pub sink: Arc<WsSink>,
    pub ws_endpoint: String,
    pub http_endpoint: String,
}
