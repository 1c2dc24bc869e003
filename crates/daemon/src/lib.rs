//! Library surface of the `broadcaster-node` binary, split out so
//! integration tests can build a full node (store, connection manager,
//! dispatcher, axum router) without going through `main`.

pub mod args;
pub mod http;
pub mod sink;
pub mod state;
pub mod sweeper;
pub mod ws;

use std::sync::Arc;

use axum::Router;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use broadcaster_connection_manager::ConnectionManager;
use broadcaster_dispatch::{Dispatcher, SystemClock};
use broadcaster_store::{StoreConfig, StoreFactory};

pub use args::Args;
pub use state::AppState;

/// A fully wired node: the axum router plus handles for its background
/// tasks, returned so a caller (`main.rs` or a test) can run the HTTP
/// server and later cancel the background work on shutdown.
pub struct Node {
    pub router: Router,
    pub state: AppState,
    pub cancel: CancellationToken,
    pub dispatcher_task: JoinHandle<()>,
    pub sweeper_task: JoinHandle<()>,
}

pub fn build(args: &Args) -> Result<Node, eyre::Error> {
    let config = Arc::new(args::load_config(args)?);

    let store_config = match &args.data_dir {
        Some(path) => StoreConfig::WithFjallPersistence {
            path: Some(path.clone().into_boxed_path()),
        },
        None => StoreConfig::InMemoryOnly,
    };
    let store = StoreFactory::create(store_config)
        .map_err(|e| eyre::eyre!("failed to open store: {e}"))?;

    let connection_manager = Arc::new(ConnectionManager::new(store.clone(), &config));
    let sink = Arc::new(sink::WsSink::new());

    let ws_endpoint = format!("ws://{}/ws", args.listen_address);
    let http_endpoint = format!("http://{}", args.listen_address);

    let app_state = AppState {
        store: store.clone(),
        connection_manager: connection_manager.clone(),
        config: config.clone(),
        sink: sink.clone(),
        ws_endpoint,
        http_endpoint,
    };

    let router = http::router()
        .route("/ws", axum::routing::get(ws::upgrade))
        .with_state(app_state.clone())
        .layer(TraceLayer::new_for_http());

    let cancel = CancellationToken::new();

    let dispatcher = Dispatcher::new(
        store.clone(),
        store.clone(),
        sink.clone() as Arc<dyn broadcaster_dispatch::ConnectionSink>,
        Arc::new(SystemClock),
        config.session_refresh_interval_ms as i64,
    );
    let dispatcher_cancel = cancel.clone();
    let dispatcher_task = tokio::spawn(async move { dispatcher.run(dispatcher_cancel).await });

    let sweeper_cancel = cancel.clone();
    let sweeper_task = tokio::spawn(sweeper::run(
        connection_manager,
        sink,
        config.connection_stale_seconds,
        5_000,
        sweeper_cancel,
    ));

    Ok(Node {
        router,
        state: app_state,
        cancel,
        dispatcher_task,
        sweeper_task,
    })
}
