//! Fjall-backed persistent store, feature-gated behind
//! `fjall-persistence`. Grounded on
//! `examples/rdaum-moor/crates/daemon/src/connections/fjall_persistence.rs`:
//! the same `fjall::Config::new(path).open()` / `open_partition` /
//! insert-remove pattern, but here the partitions are the store of
//! record directly rather than a write-behind sidecar to an in-memory
//! registry, since sessions/connections are small serde-friendly
//! records rather than the MOO value graph `FjallPersistence` has to
//! defer to bincode-encoded `Obj`s for.
//!
//! A `DashMap` mirror is still kept in front of the partitions so
//! `list_active`/`list_active_connections` don't pay a full keyspace
//! scan-and-deserialize on every broadcaster refresh tick, and so
//! writes are read-your-writes within the process (section 4.2).

use std::path::Path;
use std::sync::Mutex;

use dashmap::DashMap;
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle};
use tracing::{info, warn};

use broadcaster_common::{ConnectionId, CoreError, SessionId};
use broadcaster_wire::LatencyClass;

use crate::models::{Connection, ConnectionStatus, Session, SessionStatus};
use crate::traits::{ConnectionStore, SessionStore};

pub struct FjallStore {
    sessions: DashMap<SessionId, Session>,
    connections: DashMap<ConnectionId, Connection>,
    partitions: Mutex<Partitions>,
}

struct Partitions {
    _tmpdir: Option<tempfile::TempDir>,
    _keyspace: Keyspace,
    sessions: PartitionHandle,
    connections: PartitionHandle,
}

impl FjallStore {
    pub fn open(path: Option<&Path>) -> Result<Self, eyre::Error> {
        let (tmpdir, path) = match path {
            Some(path) => (None, path.to_path_buf()),
            None => {
                let tmpdir = tempfile::TempDir::new()?;
                let path = tmpdir.path().to_path_buf();
                (Some(tmpdir), path)
            }
        };

        info!("opening session/connection store at {:?}", path);
        let keyspace = Config::new(&path).open()?;
        let sessions = keyspace.open_partition("sessions", PartitionCreateOptions::default())?;
        let connections =
            keyspace.open_partition("connections", PartitionCreateOptions::default())?;

        let session_cache = DashMap::new();
        for entry in sessions.iter() {
            let (_, value) = entry?;
            match serde_json::from_slice::<Session>(&value) {
                Ok(session) => {
                    session_cache.insert(session.session_id, session);
                }
                Err(e) => warn!("dropping unreadable session record on load: {e}"),
            }
        }

        let connection_cache = DashMap::new();
        for entry in connections.iter() {
            let (_, value) = entry?;
            match serde_json::from_slice::<Connection>(&value) {
                Ok(conn) => {
                    connection_cache.insert(conn.connection_id, conn);
                }
                Err(e) => warn!("dropping unreadable connection record on load: {e}"),
            }
        }

        Ok(Self {
            sessions: session_cache,
            connections: connection_cache,
            partitions: Mutex::new(Partitions {
                _tmpdir: tmpdir,
                _keyspace: keyspace,
                sessions,
                connections,
            }),
        })
    }

    fn persist_session(&self, session: &Session) -> Result<(), CoreError> {
        let bytes = serde_json::to_vec(session)
            .map_err(|e| CoreError::StoreUnavailable(e.to_string()))?;
        let partitions = self.partitions.lock().unwrap();
        partitions
            .sessions
            .insert(session.session_id.to_string(), bytes)
            .map_err(|e| CoreError::StoreUnavailable(e.to_string()))
    }

    fn persist_connection(&self, connection: &Connection) -> Result<(), CoreError> {
        let bytes = serde_json::to_vec(connection)
            .map_err(|e| CoreError::StoreUnavailable(e.to_string()))?;
        let partitions = self.partitions.lock().unwrap();
        partitions
            .connections
            .insert(connection.connection_id.to_string(), bytes)
            .map_err(|e| CoreError::StoreUnavailable(e.to_string()))
    }

    fn remove_connection_partition(&self, id: ConnectionId) -> Result<(), CoreError> {
        let partitions = self.partitions.lock().unwrap();
        partitions
            .connections
            .remove(id.to_string())
            .map_err(|e| CoreError::StoreUnavailable(e.to_string()))
    }
}

impl SessionStore for FjallStore {
    fn create_session(&self, session: Session) -> Result<(), CoreError> {
        if self.sessions.contains_key(&session.session_id) {
            return Err(CoreError::SessionAlreadyExists(session.session_id));
        }
        self.persist_session(&session)?;
        self.sessions.insert(session.session_id, session);
        Ok(())
    }

    fn get_session(&self, id: SessionId) -> Result<Session, CoreError> {
        self.sessions
            .get(&id)
            .map(|e| e.clone())
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
        self.persist_session(&entry)
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
        self.persist_session(&entry)
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

impl ConnectionStore for FjallStore {
    fn create_connection(&self, connection: Connection) -> Result<(), CoreError> {
        self.persist_connection(&connection)?;
        self.connections.insert(connection.connection_id, connection);
        Ok(())
    }

    fn get_connection(&self, id: ConnectionId) -> Result<Connection, CoreError> {
        self.connections
            .get(&id)
            .map(|e| e.clone())
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
        self.persist_connection(&entry)
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
        self.persist_connection(&entry)
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
        self.persist_connection(&entry)
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
        self.persist_connection(&entry)
    }

    fn record_ping(&self, id: ConnectionId, at: i64) -> Result<(), CoreError> {
        let mut entry = self
            .connections
            .get_mut(&id)
            .ok_or(CoreError::ConnectionNotFound(id))?;
        entry.last_ping_at = Some(at);
        self.persist_connection(&entry)
    }

    fn delete_connection(&self, id: ConnectionId) -> Result<(), CoreError> {
        self.connections
            .remove(&id)
            .ok_or(CoreError::ConnectionNotFound(id))?;
        self.remove_connection_partition(id)
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

    #[test]
    fn persists_and_reloads_across_opens() {
        let dir = tempfile::TempDir::new().unwrap();
        let id = SessionId::new();
        {
            let store = FjallStore::open(Some(dir.path())).unwrap();
            store.create_session(sample_session(id)).unwrap();
        }
        let reopened = FjallStore::open(Some(dir.path())).unwrap();
        let session = reopened.get_session(id).unwrap();
        assert_eq!(session.session_id, id);
    }

    #[test]
    fn rejects_duplicate_session_create() {
        let store = FjallStore::open(None).unwrap();
        let id = SessionId::new();
        store.create_session(sample_session(id)).unwrap();
        let err = store.create_session(sample_session(id)).unwrap_err();
        assert!(matches!(err, CoreError::SessionAlreadyExists(_)));
    }
}
