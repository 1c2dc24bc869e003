use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use broadcaster_common::{ConnectionId, SessionId};
use broadcaster_dispatch::{Clock, ConnectionSink, Dispatcher, SendFailure};
use broadcaster_store::{
    Connection, ConnectionStatus, ConnectionStore, InMemoryStore, Session, SessionStatus,
    SessionStore,
};
use broadcaster_wire::ServerMessage;

struct FakeClock(AtomicI64);

impl Clock for FakeClock {
    fn now_ms(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct RecordingSink {
    sent: Mutex<Vec<(ConnectionId, ServerMessage)>>,
    gone: Mutex<Vec<ConnectionId>>,
}

#[async_trait]
impl ConnectionSink for RecordingSink {
    async fn send(
        &self,
        connection_id: ConnectionId,
        message: ServerMessage,
    ) -> Result<(), SendFailure> {
        if self.gone.lock().unwrap().contains(&connection_id) {
            return Err(SendFailure::Gone);
        }
        self.sent.lock().unwrap().push((connection_id, message));
        Ok(())
    }
}

fn sample_session(id: SessionId, start_at: i64, tick_ms: u32) -> Session {
    Session {
        session_id: id,
        seed: 42,
        start_at,
        tick_ms,
        status: SessionStatus::Waiting,
        region: "local".to_string(),
        created_at: 0,
        ttl: 86_400,
        cached_step: None,
        cached_value: None,
        cached_round: None,
    }
}

fn ready_connection(id: ConnectionId, session_id: SessionId) -> Connection {
    Connection {
        connection_id: id,
        session_id: Some(session_id),
        user_id: Some("u1".to_string()),
        region: "local".to_string(),
        status: ConnectionStatus::Ready,
        latency_history: Vec::new(),
        avg_latency: 0,
        jitter: 0,
        joined_at: Some(0),
        last_ping_at: Some(0),
        last_pong_at: None,
        ttl: 3600,
        kick_reason: None,
        last_classification: None,
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn emits_countdown_before_start_then_ticks_after() {
    let session_store: Arc<dyn SessionStore> = Arc::new(InMemoryStore::new());
    let connection_store: Arc<dyn ConnectionStore> = Arc::new(InMemoryStore::new());

    let session_id = SessionId::new();
    let connection_id = ConnectionId::new();
    session_store
        .create_session(sample_session(session_id, 1_000, 100))
        .unwrap();
    connection_store
        .create_connection(ready_connection(connection_id, session_id))
        .unwrap();

    let sink = Arc::new(RecordingSink::default());
    let clock = Arc::new(FakeClock(AtomicI64::new(500)));
    let dispatcher = Dispatcher::new(
        session_store.clone(),
        connection_store.clone(),
        sink.clone() as Arc<dyn ConnectionSink>,
        clock.clone() as Arc<dyn Clock>,
        0,
    );

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    let handle = tokio::spawn(async move { dispatcher.run(cancel_clone).await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    {
        let sent = sink.sent.lock().unwrap();
        assert!(sent
            .iter()
            .any(|(_, m)| matches!(m, ServerMessage::Countdown { .. })));
    }
    assert_eq!(
        session_store.get_session(session_id).unwrap().status,
        SessionStatus::Waiting
    );

    clock.0.store(1_500, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(150)).await;

    cancel.cancel();
    let _ = handle.await;

    assert_eq!(
        session_store.get_session(session_id).unwrap().status,
        SessionStatus::Running
    );
    let sent = sink.sent.lock().unwrap();
    assert!(sent.iter().any(|(_, m)| matches!(m, ServerMessage::Tick { .. })));
}

#[tokio::test(flavor = "multi_thread")]
async fn gone_connection_is_reaped_from_the_store() {
    let session_store: Arc<dyn SessionStore> = Arc::new(InMemoryStore::new());
    let connection_store: Arc<dyn ConnectionStore> = Arc::new(InMemoryStore::new());

    let session_id = SessionId::new();
    let connection_id = ConnectionId::new();
    session_store
        .create_session(sample_session(session_id, 0, 100))
        .unwrap();
    connection_store
        .create_connection(ready_connection(connection_id, session_id))
        .unwrap();

    let sink = Arc::new(RecordingSink::default());
    sink.gone.lock().unwrap().push(connection_id);
    let clock = Arc::new(FakeClock(AtomicI64::new(1_000)));
    let dispatcher = Dispatcher::new(
        session_store.clone(),
        connection_store.clone(),
        sink.clone() as Arc<dyn ConnectionSink>,
        clock.clone() as Arc<dyn Clock>,
        0,
    );

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    let handle = tokio::spawn(async move { dispatcher.run(cancel_clone).await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();
    let _ = handle.await;

    assert!(connection_store.get_connection(connection_id).is_err());
}
