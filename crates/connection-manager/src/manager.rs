use std::sync::Arc;

use tracing::{info, warn};

use broadcaster_common::{ConnectionId, CoreError, SessionId};
use broadcaster_store::{Connection, ConnectionStatus, ConnectionStore};
use broadcaster_wire::{Config, LatencyClass};

use crate::latency::{self, LatencyThresholds};

/// Outcome of processing an inbound `ping`, section 4.3.4.
#[derive(Debug)]
pub struct PingOutcome {
    pub rtt_sample_ms: u32,
    pub avg_latency: u32,
    pub jitter: u32,
    pub classification: LatencyClass,
    /// `Some` only on a classification transition (warning policy:
    /// "at most once per classification transition").
    pub classification_changed: bool,
    pub kick: Option<KickDecision>,
}

#[derive(Debug)]
pub struct KickDecision {
    pub reason: String,
    pub avg_latency: u32,
    pub jitter: u32,
    pub max_latency: u32,
    pub max_jitter: u32,
}

/// Owns the connection state machine and latency accounting of
/// spec.md section 4.3. Holds no connection-local mutable state of its
/// own — everything routes through the `ConnectionStore` so the
/// manager can run on any node that shares the store, the same
/// stateless-server split `moor-daemon`'s `ConnectionRegistry` makes
/// from its RPC-facing handlers.
pub struct ConnectionManager {
    store: Arc<dyn ConnectionStore>,
    thresholds: LatencyThresholds,
}

impl ConnectionManager {
    pub fn new(store: Arc<dyn ConnectionStore>, config: &Config) -> Self {
        Self {
            store,
            thresholds: LatencyThresholds::from_config(config),
        }
    }

    /// `join` is only valid from `connecting` (section 4.3.1).
    pub fn join(
        &self,
        connection_id: ConnectionId,
        session_id: SessionId,
        user_id: String,
        now: i64,
    ) -> Result<(), CoreError> {
        let connection = self.store.get_connection(connection_id)?;
        if connection.status != ConnectionStatus::Connecting {
            return Err(CoreError::IllegalConnectionTransition(
                connection_id,
                connection.status.as_str(),
                "ready",
            ));
        }
        self.store
            .join_session(connection_id, session_id, user_id, now)?;
        info!(%connection_id, %session_id, "connection joined session");
        Ok(())
    }

    /// `ready --(first tick delivered)--> playing` (section 4.3.3).
    pub fn mark_first_tick_delivered(&self, connection_id: ConnectionId) -> Result<(), CoreError> {
        let connection = self.store.get_connection(connection_id)?;
        if connection.status == ConnectionStatus::Ready {
            self.store
                .update_connection_status(connection_id, ConnectionStatus::Playing, None)?;
        }
        Ok(())
    }

    /// Processes an inbound `ping`, returning the sample and any
    /// warn/kick decision the caller (the per-connection transport
    /// task) must act on. `client_timestamp` is the value echoed back
    /// from the previous `pong`'s `serverTimestamp` per the canonical
    /// estimator of section 4.3.4; on the very first ping of a
    /// connection it is simply the client's own clock and the
    /// resulting sample is a rough approximation, same as the spec
    /// allows.
    pub fn handle_ping(
        &self,
        connection_id: ConnectionId,
        client_timestamp: i64,
        server_now: i64,
    ) -> Result<PingOutcome, CoreError> {
        let connection = self.store.get_connection(connection_id)?;
        if connection.status.is_terminal() {
            return Err(CoreError::IllegalConnectionTransition(
                connection_id,
                connection.status.as_str(),
                "ping-accepting",
            ));
        }

        let rtt_sample_ms = server_now.saturating_sub(client_timestamp).max(0) as u32;

        let mut history = connection.latency_history.clone();
        latency::push_sample(&mut history, rtt_sample_ms, self.thresholds.sample_count);
        let (avg_latency, jitter) = latency::avg_and_jitter(&history);
        let classification =
            latency::classify(avg_latency, jitter, history.len(), &self.thresholds);

        self.store
            .update_latency(connection_id, history, avg_latency, jitter, server_now)?;

        let classification_changed = connection.last_classification != Some(classification);
        if classification_changed {
            self.store
                .update_classification(connection_id, classification)?;
        }

        let kick = if classification == LatencyClass::Critical {
            let reason = if avg_latency > self.thresholds.max_latency_ms {
                format!(
                    "avgLatency {avg_latency}ms exceeds maxLatencyMs {}ms",
                    self.thresholds.max_latency_ms
                )
            } else {
                format!(
                    "jitter {jitter}ms exceeds maxJitterMs {}ms",
                    self.thresholds.max_jitter_ms
                )
            };
            self.store.update_connection_status(
                connection_id,
                ConnectionStatus::Kicked,
                Some(reason.clone()),
            )?;
            warn!(%connection_id, avg_latency, jitter, "kicking connection for latency breach");
            Some(KickDecision {
                reason,
                avg_latency,
                jitter,
                max_latency: self.thresholds.max_latency_ms,
                max_jitter: self.thresholds.max_jitter_ms,
            })
        } else {
            None
        };

        Ok(PingOutcome {
            rtt_sample_ms,
            avg_latency,
            jitter,
            classification,
            classification_changed,
            kick,
        })
    }

    /// Transport-failure path (section 4.3's "transport contract"):
    /// any send error immediately transitions the connection to
    /// `disconnected`.
    pub fn mark_disconnected(&self, connection_id: ConnectionId) -> Result<(), CoreError> {
        self.store
            .update_connection_status(connection_id, ConnectionStatus::Disconnected, None)
    }

    /// Periodic pass, independent of the tick loop (section 4.3.5).
    /// Returns the connections it evicted so the caller can attempt a
    /// transport close.
    pub fn reap_stale(&self, now: i64, stale_seconds: u64) -> Result<Vec<Connection>, CoreError> {
        let bound_ms = (stale_seconds as i64).saturating_mul(1000);
        let mut reaped = Vec::new();
        for connection in self.store.list_active_connections()? {
            if connection.status.is_terminal() {
                continue;
            }
            let last_seen = connection
                .last_ping_at
                .into_iter()
                .chain(connection.joined_at)
                .max();
            let Some(last_seen) = last_seen else {
                continue;
            };
            if now.saturating_sub(last_seen) > bound_ms {
                self.store.delete_connection(connection.connection_id)?;
                info!(connection_id = %connection.connection_id, "reaped stale connection");
                reaped.push(connection);
            }
        }
        Ok(reaped)
    }
}
