use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::info;

use broadcaster_store::{ConnectionStore, SessionStore};

use crate::scheduler::{dispatch_sleep_ms, ms_until_next_tick, IDLE_POLL_MS};
use crate::tick::{tick_session, SessionCache};
use crate::transport::ConnectionSink;

/// A clock abstraction so the dispatcher loop is testable without
/// real wall-clock sleeps. The daemon wires this to
/// `SystemTime::now()`'s epoch-millisecond value.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("system clock before unix epoch")
            .as_millis() as i64
    }
}

/// The cooperating tick loop of spec.md section 4.4: refreshes its
/// session cache on a bounded interval, ticks every active session
/// each pass, and yields according to the nearest upcoming target
/// time. Runs as one task among the node's cooperating workers
/// (section 5): one tick loop, one latency-sweep loop, one
/// stale-reaper loop, N transport handlers.
pub struct Dispatcher {
    session_store: Arc<dyn SessionStore>,
    connection_store: Arc<dyn ConnectionStore>,
    sink: Arc<dyn ConnectionSink>,
    clock: Arc<dyn Clock>,
    refresh_interval_ms: i64,
}

impl Dispatcher {
    pub fn new(
        session_store: Arc<dyn SessionStore>,
        connection_store: Arc<dyn ConnectionStore>,
        sink: Arc<dyn ConnectionSink>,
        clock: Arc<dyn Clock>,
        refresh_interval_ms: i64,
    ) -> Self {
        Self {
            session_store,
            connection_store,
            sink,
            clock,
            refresh_interval_ms,
        }
    }

    /// Runs until `cancel` fires. Completes the in-flight tick pass
    /// before exiting (section 5's shutdown drain contract).
    pub async fn run(&self, cancel: CancellationToken) {
        let mut cache = SessionCache::new();
        let mut last_refresh_ms = i64::MIN;

        loop {
            if cancel.is_cancelled() {
                info!("dispatcher shutting down");
                return;
            }

            let now = self.clock.now_ms();
            if now.saturating_sub(last_refresh_ms) >= self.refresh_interval_ms {
                cache.refresh(self.session_store.as_ref());
                last_refresh_ms = now;
            }

            if cache.sessions.is_empty() {
                tokio::select! {
                    _ = sleep(Duration::from_millis(IDLE_POLL_MS)) => {}
                    _ = cancel.cancelled() => return,
                }
                continue;
            }

            let mut next_sleep = 100i64;
            for session in cache.sessions.values().cloned().collect::<Vec<_>>() {
                let cursor = cache
                    .cursors
                    .entry(session.session_id)
                    .or_default();
                tick_session(
                    self.session_store.as_ref(),
                    self.connection_store.as_ref(),
                    &self.sink,
                    &session,
                    cursor,
                    now,
                )
                .await;

                let until = ms_until_next_tick(session.start_at, session.tick_ms as i64, now);
                next_sleep = next_sleep.min(until);
            }

            let sleep_ms = dispatch_sleep_ms(next_sleep);
            tokio::select! {
                _ = sleep(Duration::from_millis(sleep_ms)) => {}
                _ = cancel.cancelled() => return,
            }
        }
    }
}
