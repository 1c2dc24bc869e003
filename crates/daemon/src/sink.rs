use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;

use broadcaster_common::ConnectionId;
use broadcaster_dispatch::{ConnectionSink, SendFailure};
use broadcaster_wire::ServerMessage;

/// Bridges the dispatcher's transport-agnostic `ConnectionSink` to the
/// live websocket tasks of this node: each registered connection owns
/// an unbounded channel, and the per-connection task (`ws.rs`) drains
/// it onto the socket. A connection with no registered channel — one
/// whose socket task already exited — is reported `Gone` so the
/// dispatcher reaps it from the store (spec.md section 4.3's transport
/// contract).
#[derive(Default)]
pub struct WsSink {
    channels: DashMap<ConnectionId, mpsc::UnboundedSender<ServerMessage>>,
}

impl WsSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, connection_id: ConnectionId) -> mpsc::UnboundedReceiver<ServerMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.channels.insert(connection_id, tx);
        rx
    }

    pub fn unregister(&self, connection_id: ConnectionId) {
        self.channels.remove(&connection_id);
    }
}

#[async_trait]
impl ConnectionSink for WsSink {
    async fn send(
        &self,
        connection_id: ConnectionId,
        message: ServerMessage,
    ) -> Result<(), SendFailure> {
        let Some(tx) = self.channels.get(&connection_id) else {
            return Err(SendFailure::Gone);
        };
        tx.send(message).map_err(|_| SendFailure::Gone)
    }
}
