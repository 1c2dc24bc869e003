use thiserror::Error;

use crate::{ConnectionId, SessionId};

/// The error taxonomy of spec section 7. Each variant names the
/// handling a caller must give it: validation and not-found surface
/// as HTTP/ws errors, transient-storage is retried locally by the
/// caller before it escalates here, transport-gone and internal
/// invariant breaches are contained to the single session/connection
/// that hit them and never halt the tick loop.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("connection not found: {0}")]
    ConnectionNotFound(ConnectionId),

    #[error("session already exists: {0}")]
    SessionAlreadyExists(SessionId),

    #[error("illegal session status transition for {0}: {1} -> {2}")]
    IllegalStatusTransition(SessionId, &'static str, &'static str),

    #[error("illegal connection status transition for {0}: {1} -> {2}")]
    IllegalConnectionTransition(ConnectionId, &'static str, &'static str),

    #[error("store unavailable after retries: {0}")]
    StoreUnavailable(String),

    #[error("transport gone for connection {0}")]
    TransportGone(ConnectionId),

    #[error("internal invariant breach: {0}")]
    InvariantBreach(String),
}

impl CoreError {
    /// The HTTP status this error maps to, per spec section 7's
    /// propagation policy. Internal invariant breaches never reach an
    /// HTTP caller in correct operation, but map to 500 defensively.
    pub fn status_code(&self) -> u16 {
        match self {
            CoreError::Validation(_) => 400,
            CoreError::SessionNotFound(_) | CoreError::ConnectionNotFound(_) => 404,
            CoreError::SessionAlreadyExists(_) => 409,
            CoreError::IllegalStatusTransition(..) | CoreError::IllegalConnectionTransition(..) => {
                409
            }
            CoreError::StoreUnavailable(_)
            | CoreError::TransportGone(_)
            | CoreError::InvariantBreach(_) => 500,
        }
    }

    /// The wire error code used in HTTP and `error` duplex messages.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Validation(_) => "INVALID_REQUEST",
            CoreError::SessionNotFound(_) => "SESSION_NOT_FOUND",
            CoreError::ConnectionNotFound(_) => "CONNECTION_NOT_FOUND",
            CoreError::SessionAlreadyExists(_) => "SESSION_ALREADY_EXISTS",
            CoreError::IllegalStatusTransition(..) => "ILLEGAL_STATUS_TRANSITION",
            CoreError::IllegalConnectionTransition(..) => "ILLEGAL_STATUS_TRANSITION",
            CoreError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            CoreError::TransportGone(_) => "TRANSPORT_GONE",
            CoreError::InvariantBreach(_) => "INTERNAL_ERROR",
        }
    }
}
