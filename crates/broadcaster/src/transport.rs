use async_trait::async_trait;

use broadcaster_common::ConnectionId;
use broadcaster_wire::ServerMessage;

/// How a send attempt failed, per spec.md section 4.4.5: a "gone"
/// transport is reaped, a transient one is logged and retried
/// naturally on the next tick.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum SendFailure {
    Gone,
    Transient,
}

/// The fan-out boundary between the pure scheduler in this crate and
/// whatever owns live sockets (the daemon's per-connection WebSocket
/// tasks). Kept as a trait so this crate never depends on axum,
/// mirroring how `broadcaster-store`'s traits keep the tick logic
/// independent of the storage backend.
#[async_trait]
pub trait ConnectionSink: Send + Sync {
    async fn send(
        &self,
        connection_id: ConnectionId,
        message: ServerMessage,
    ) -> Result<(), SendFailure>;
}
