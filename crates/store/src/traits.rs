use broadcaster_common::{ConnectionId, CoreError, SessionId};
use broadcaster_wire::LatencyClass;

use crate::models::{Connection, ConnectionStatus, Session, SessionStatus};

/// spec.md section 4.2. Implementations are `Send + Sync` so a single
/// instance can be shared across the axum router and the broadcaster's
/// tick tasks.
pub trait SessionStore: Send + Sync {
    fn create_session(&self, session: Session) -> Result<(), CoreError>;

    fn get_session(&self, id: SessionId) -> Result<Session, CoreError>;

    fn update_session_status(
        &self,
        id: SessionId,
        new_status: SessionStatus,
    ) -> Result<(), CoreError>;

    /// Refreshes the observability-only cached tick fields (section
    /// 3.1). Never consulted for correctness.
    fn update_cached_tick(
        &self,
        id: SessionId,
        step: i64,
        value: i64,
        round: i64,
    ) -> Result<(), CoreError>;

    /// Every session with `status ∈ {waiting, running}`. May be
    /// eventually consistent (section 4.2).
    fn list_active(&self) -> Result<Vec<Session>, CoreError>;
}

/// spec.md section 4.2.
pub trait ConnectionStore: Send + Sync {
    fn create_connection(&self, connection: Connection) -> Result<(), CoreError>;

    fn get_connection(&self, id: ConnectionId) -> Result<Connection, CoreError>;

    fn update_latency(
        &self,
        id: ConnectionId,
        history: Vec<u32>,
        avg: u32,
        jitter: u32,
        last_pong_at: i64,
    ) -> Result<(), CoreError>;

    fn update_connection_status(
        &self,
        id: ConnectionId,
        new_status: ConnectionStatus,
        kick_reason: Option<String>,
    ) -> Result<(), CoreError>;

    /// Associates a connection with the session it joined and
    /// transitions it to `ready` in one write (spec.md section
    /// 4.3.1's `join`).
    fn join_session(
        &self,
        id: ConnectionId,
        session_id: SessionId,
        user_id: String,
        joined_at: i64,
    ) -> Result<(), CoreError>;

    fn update_classification(
        &self,
        id: ConnectionId,
        classification: LatencyClass,
    ) -> Result<(), CoreError>;

    fn record_ping(&self, id: ConnectionId, at: i64) -> Result<(), CoreError>;

    fn delete_connection(&self, id: ConnectionId) -> Result<(), CoreError>;

    /// Filtered to broadcast-eligible states (section 4.2).
    fn list_connections_by_session(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<Connection>, CoreError>;

    /// For the latency sweeper / stale-connection reaper (section
    /// 4.3.5); unfiltered by status.
    fn list_active_connections(&self) -> Result<Vec<Connection>, CoreError>;
}
