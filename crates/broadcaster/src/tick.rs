use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use broadcaster_common::{ConnectionId, SessionId};
use broadcaster_engine::state_at;
use broadcaster_store::{ConnectionStore, Session, SessionStatus, SessionStore};
use broadcaster_wire::ServerMessage;

use crate::scheduler::should_emit;
use crate::transport::{ConnectionSink, SendFailure};

/// Per-session bookkeeping the dispatcher keeps between passes: the
/// last tick index emitted, so repeated `StateAt` calls at the same
/// wall-clock position don't re-send (section 4.4.3).
#[derive(Default)]
pub struct SessionCursor {
    pub last_emitted_step: Option<i64>,
}

/// Runs one pass of the per-session tick cycle (section 4.4.2) for a
/// single session, fanning out to every broadcast-eligible connection
/// and reaping any that reported a gone transport.
pub async fn tick_session(
    store: &(dyn SessionStore + Send + Sync),
    connections: &(dyn ConnectionStore + Send + Sync),
    sink: &Arc<dyn ConnectionSink>,
    session: &Session,
    cursor: &mut SessionCursor,
    now: i64,
) {
    let connection_ids = match connections.list_connections_by_session(session.session_id) {
        Ok(ids) => ids,
        Err(e) => {
            warn!(session_id = %session.session_id, error = %e, "failed to list connections for session");
            return;
        }
    };
    if connection_ids.is_empty() {
        return;
    }

    let mut status = session.status;
    if status == SessionStatus::Waiting && now >= session.start_at {
        match store.update_session_status(session.session_id, SessionStatus::Running) {
            // Section 4.4.2 step 2: "update the cached copy" too, so
            // this same pass observes the transition rather than
            // emitting one more countdown before the next refresh.
            Ok(()) => status = SessionStatus::Running,
            Err(e) => {
                warn!(session_id = %session.session_id, error = %e, "failed to advance waiting -> running");
            }
        }
    }

    if status == SessionStatus::Waiting {
        let countdown = ServerMessage::Countdown {
            remaining_ms: session.start_at - now,
            start_at: session.start_at,
        };
        fan_out(sink, connections, &connection_ids, countdown).await;
        return;
    }

    let state = state_at(session.seed, session.start_at, session.tick_ms as i64, now);

    if should_emit(cursor.last_emitted_step, state.step)
        && let Err(e) =
            store.update_cached_tick(session.session_id, state.step, state.value, state.round)
    {
        debug!(session_id = %session.session_id, error = %e, "cache write for tick state failed (informational only)");
    }

    let tick = ServerMessage::Tick {
        step: state.step,
        value: state.value,
        round: state.round,
        broken: state.broken,
        server_timestamp: now,
    };
    fan_out(sink, connections, &connection_ids, tick).await;
    cursor.last_emitted_step = Some(state.step);
}

async fn fan_out(
    sink: &Arc<dyn ConnectionSink>,
    connections: &(dyn ConnectionStore + Send + Sync),
    connection_ids: &[broadcaster_store::Connection],
    message: ServerMessage,
) {
    let sends = connection_ids.iter().map(|c| {
        let sink = sink.clone();
        let message = message.clone();
        let id = c.connection_id;
        async move { (id, sink.send(id, message).await) }
    });
    let results: Vec<(ConnectionId, Result<(), SendFailure>)> =
        futures::future::join_all(sends).await;

    for (connection_id, result) in results {
        match result {
            Ok(()) => {}
            Err(SendFailure::Gone) => {
                if let Err(e) = connections.delete_connection(connection_id) {
                    warn!(%connection_id, error = %e, "failed to delete gone connection");
                }
            }
            Err(SendFailure::Transient) => {
                debug!(%connection_id, "transient send failure, retrying next tick");
            }
        }
    }
}

/// The per-node cache of sessions being ticked, refreshed on a bounded
/// interval (section 4.4.1).
pub struct SessionCache {
    pub sessions: HashMap<SessionId, Session>,
    pub cursors: HashMap<SessionId, SessionCursor>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            cursors: HashMap::new(),
        }
    }

    pub fn refresh(&mut self, store: &(dyn SessionStore + Send + Sync)) {
        match store.list_active() {
            Ok(sessions) => {
                self.cursors
                    .retain(|id, _| sessions.iter().any(|s| &s.session_id == id));
                self.sessions = sessions.into_iter().map(|s| (s.session_id, s)).collect();
            }
            Err(e) => {
                warn!(error = %e, "session refresh failed, keeping stale cache");
            }
        }
    }
}

impl Default for SessionCache {
    fn default() -> Self {
        Self::new()
    }
}
