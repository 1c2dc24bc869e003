use dashmap::DashMap;

use broadcaster_common::{ConnectionId, CoreError, SessionId};
use broadcaster_wire::LatencyClass;

use crate::models::{Connection, ConnectionStatus, Session, SessionStatus};
use crate::traits::{ConnectionStore, SessionStore};

/// The reference store implementation: plain `DashMap`s, no
/// persistence. TTLs are carried on each record but never swept here —
/// see `examples/rdaum-moor/crates/daemon/src/connections/in_memory.rs`'s
/// `ConnectionRegistryMemory`, which keeps the same "persistence is a
/// pluggable sidecar, the map is the source of truth" split.
#[derive(Default)]
pub struct InMemoryStore {
    sessions: DashMap<SessionId, Session>,
    connections: DashMap<ConnectionId, Connection>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for InMemoryStore {
    fn create_session(&self, session: Session) -> Result<(), CoreError> {
        if self.sessions.contains_key(&session.session_id) {
            return Err(CoreError::SessionAlreadyExists(session.session_id));
        }
        self.sessions.insert(session.session_id, session);
        Ok(())
    }

    fn get_session(&self, id: SessionId) -> Result<Session, CoreError> {
        self.sessions
            .get(&id)
            .map(|entry| entry.clone())
            .ok_or(CoreError::SessionNotFound(id))
    }

    fn update_session_status(
        &self,
        id: SessionId,
        new_status: SessionStatus,
    ) -> Result<(), CoreError> {
        let mut entry = self
            .sessions
            .get_mut(&id)
            .ok_or(CoreError::SessionNotFound(id))?;
        entry.status = new_status;
        Ok(())
    }

    fn update_cached_tick(
        &self,
        id: SessionId,
        step: i64,
        value: i64,
        round: i64,
    ) -> Result<(), CoreError> {
        let mut entry = self
            .sessions
            .get_mut(&id)
            .ok_or(CoreError::SessionNotFound(id))?;
        entry.cached_step = Some(step);
        entry.cached_value = Some(value);
        entry.cached_round = Some(round);
        Ok(())
    }

    fn list_active(&self) -> Result<Vec<Session>, CoreError> {
        Ok(self
            .sessions
            .iter()
            .filter(|e| matches!(e.status, SessionStatus::Waiting | SessionStatus::Running))
            .map(|e| e.clone())
            .collect())
    }
}

impl ConnectionStore for InMemoryStore {
    fn create_connection(&self, connection: Connection) -> Result<(), CoreError> {
        self.connections.insert(connection.connection_id, connection);
        Ok(())
    }

    fn get_connection(&self, id: ConnectionId) -> Result<Connection, CoreError> {
        self.connections
            .get(&id)
            .map(|entry| entry.clone())
            .ok_or(CoreError::ConnectionNotFound(id))
    }

    fn update_latency(
        &self,
        id: ConnectionId,
        history: Vec<u32>,
        avg: u32,
        jitter: u32,
        last_pong_at: i64,
    ) -> Result<(), CoreError> {
        let mut entry = self
            .connections
            .get_mut(&id)
            .ok_or(CoreError::ConnectionNotFound(id))?;
        entry.latency_history = history;
        entry.avg_latency = avg;
        entry.jitter = jitter;
        entry.last_pong_at = Some(last_pong_at);
        Ok(())
    }

    fn update_connection_status(
        &self,
        id: ConnectionId,
        new_status: ConnectionStatus,
        kick_reason: Option<String>,
    ) -> Result<(), CoreError> {
        let mut entry = self
            .connections
            .get_mut(&id)
            .ok_or(CoreError::ConnectionNotFound(id))?;
        entry.status = new_status;
        if kick_reason.is_some() {
            entry.kick_reason = kick_reason;
        }
        Ok(())
    }

    fn update_classification(
        &self,
        id: ConnectionId,
        classification: LatencyClass,
    ) -> Result<(), CoreError> {
        let mut entry = self
            .connections
            .get_mut(&id)
            .ok_or(CoreError::ConnectionNotFound(id))?;
        entry.last_classification = Some(classification);
        Ok(())
    }

    fn join_session(
        &self,
        id: ConnectionId,
        session_id: SessionId,
        user_id: String,
        joined_at: i64,
    ) -> Result<(), CoreError> {
        let mut entry = self
            .connections
            .get_mut(&id)
            .ok_or(CoreError::ConnectionNotFound(id))?;
        entry.session_id = Some(session_id);
        entry.user_id = Some(user_id);
        entry.joined_at = Some(joined_at);
        entry.status = ConnectionStatus::Ready;
        Ok(())
    }

    fn record_ping(&self, id: ConnectionId, at: i64) -> Result<(), CoreError> {
        let mut entry = self
            .connections
            .get_mut(&id)
            .ok_or(CoreError::ConnectionNotFound(id))?;
        entry.last_ping_at = Some(at);
        Ok(())
    }

    fn delete_connection(&self, id: ConnectionId) -> Result<(), CoreError> {
        self.connections
            .remove(&id)
            .map(|_| ())
            .ok_or(CoreError::ConnectionNotFound(id))
    }

    fn list_connections_by_session(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<Connection>, CoreError> {
        Ok(self
            .connections
            .iter()
            .filter(|e| e.session_id == Some(session_id) && e.is_broadcast_eligible())
            .map(|e| e.clone())
            .collect())
    }

    fn list_active_connections(&self) -> Result<Vec<Connection>, CoreError> {
        Ok(self
            .connections
            .iter()
            .filter(|e| !e.status.is_terminal())
            .map(|e| e.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_session(id: SessionId) -> Session {
        Session {
            session_id: id,
            seed: 1,
            start_at: 0,
            tick_ms: 100,
            status: SessionStatus::Waiting,
            region: "local".to_string(),
            created_at: 0,
            ttl: 86_400,
            cached_step: None,
            cached_value: None,
            cached_round: None,
        }
    }

    fn sample_connection(id: ConnectionId, session_id: Option<SessionId>) -> Connection {
        Connection {
            connection_id: id,
            session_id,
            user_id: Some("u1".to_string()),
            region: "local".to_string(),
            status: ConnectionStatus::Ready,
            latency_history: Vec::new(),
            avg_latency: 0,
            jitter: 0,
            joined_at: None,
            last_ping_at: None,
            last_pong_at: None,
            ttl: 3600,
            kick_reason: None,
            last_classification: None,
        }
    }

    #[test]
    fn create_session_rejects_duplicate() {
        let store = InMemoryStore::new();
        let id = SessionId::new();
        store.create_session(sample_session(id)).unwrap();
        let err = store.create_session(sample_session(id)).unwrap_err();
        assert!(matches!(err, CoreError::SessionAlreadyExists(_)));
    }

    #[test]
    fn get_session_not_found() {
        let store = InMemoryStore::new();
        let err = store.get_session(SessionId::new()).unwrap_err();
        assert!(matches!(err, CoreError::SessionNotFound(_)));
    }

    #[test]
    fn list_active_excludes_stopped() {
        let store = InMemoryStore::new();
        let waiting = SessionId::new();
        let stopped = SessionId::new();
        store.create_session(sample_session(waiting)).unwrap();
        let mut s = sample_session(stopped);
        s.status = SessionStatus::Stopped;
        store.create_session(s).unwrap();

        let active = store.list_active().unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].session_id, waiting);
    }

    #[test]
    fn list_connections_by_session_filters_ineligible() {
        let store = InMemoryStore::new();
        let session_id = SessionId::new();
        let ready = ConnectionId::new();
        let connecting = ConnectionId::new();
        let other_session = ConnectionId::new();

        store
            .create_connection(sample_connection(ready, Some(session_id)))
            .unwrap();
        let mut c = sample_connection(connecting, Some(session_id));
        c.status = ConnectionStatus::Connecting;
        store.create_connection(c).unwrap();
        store
            .create_connection(sample_connection(other_session, Some(SessionId::new())))
            .unwrap();

        let eligible = store.list_connections_by_session(session_id).unwrap();
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].connection_id, ready);
    }

    #[test]
    fn update_latency_then_delete() {
        let store = InMemoryStore::new();
        let id = ConnectionId::new();
        store.create_connection(sample_connection(id, None)).unwrap();
        store
            .update_latency(id, vec![10, 20, 30], 20, 10, 999)
            .unwrap();
        let conn = store.get_connection(id).unwrap();
        assert_eq!(conn.avg_latency, 20);
        assert_eq!(conn.last_pong_at, Some(999));

        store.delete_connection(id).unwrap();
        assert!(matches!(
            store.get_connection(id).unwrap_err(),
            CoreError::ConnectionNotFound(_)
        ));
    }
}
