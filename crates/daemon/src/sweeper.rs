use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use broadcaster_connection_manager::ConnectionManager;

use crate::http::now_ms;
use crate::sink::WsSink;

/// The stale-connection reaper, independent of the tick loop (spec.md
/// section 4.3.5): periodically evicts connections that haven't pinged
/// within `connection_stale_seconds` and drops their sink registration
/// so the per-connection socket task observes the channel close.
pub async fn run(
    manager: Arc<ConnectionManager>,
    sink: Arc<WsSink>,
    stale_seconds: u64,
    interval_ms: u64,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = sleep(Duration::from_millis(interval_ms)) => {}
            _ = cancel.cancelled() => {
                info!("stale-connection reaper shutting down");
                return;
            }
        }

        match manager.reap_stale(now_ms(), stale_seconds) {
            Ok(reaped) => {
                for connection in reaped {
                    sink.unregister(connection.connection_id);
                }
            }
            Err(e) => warn!(error = %e, "stale-connection sweep failed"),
        }
    }
}
