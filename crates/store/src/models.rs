use serde::{Deserialize, Serialize};

use broadcaster_common::{ConnectionId, SessionId};

/// spec.md section 3.1. `start_at` and `tick_ms` are immutable once
/// written; `status` only ever advances `waiting -> running ->
/// stopped`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: SessionId,
    pub seed: i64,
    pub start_at: i64,
    pub tick_ms: u32,
    pub status: SessionStatus,
    pub region: String,
    pub created_at: i64,
    pub ttl: i64,
    /// Cached current state, observability-only per spec.md section
    /// 3.1 — authoritative state is always recomputed by the engine.
    pub cached_step: Option<i64>,
    pub cached_value: Option<i64>,
    pub cached_round: Option<i64>,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Waiting,
    Running,
    Stopped,
}

impl SessionStatus {
    /// spec.md section 3.1: status is monotone, `stopped` terminal.
    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        matches!(
            (self, next),
            (SessionStatus::Waiting, SessionStatus::Running)
                | (SessionStatus::Waiting, SessionStatus::Stopped)
                | (SessionStatus::Running, SessionStatus::Stopped)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Waiting => "waiting",
            SessionStatus::Running => "running",
            SessionStatus::Stopped => "stopped",
        }
    }
}

/// spec.md section 3.2. A connection is broadcast-eligible only when
/// `status` is `Ready` or `Playing` and `session_id` is populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub connection_id: ConnectionId,
    pub session_id: Option<SessionId>,
    pub user_id: Option<String>,
    pub region: String,
    pub status: ConnectionStatus,
    /// Ring buffer of up to `sampleCount` recent RTT samples, in
    /// insertion order (oldest first).
    pub latency_history: Vec<u32>,
    pub avg_latency: u32,
    pub jitter: u32,
    pub joined_at: Option<i64>,
    pub last_ping_at: Option<i64>,
    pub last_pong_at: Option<i64>,
    pub ttl: i64,
    pub kick_reason: Option<String>,
    /// Last latency classification emitted, so `latency_status` is
    /// only sent on transition (spec.md section 4.3.4's warning
    /// policy "at most once per classification transition").
    pub last_classification: Option<broadcaster_wire::LatencyClass>,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connecting,
    Ready,
    Playing,
    Kicked,
    Disconnected,
}

impl ConnectionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ConnectionStatus::Kicked | ConnectionStatus::Disconnected)
    }

    pub fn is_broadcast_eligible(self) -> bool {
        matches!(self, ConnectionStatus::Ready | ConnectionStatus::Playing)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Ready => "ready",
            ConnectionStatus::Playing => "playing",
            ConnectionStatus::Kicked => "kicked",
            ConnectionStatus::Disconnected => "disconnected",
        }
    }
}

impl Connection {
    pub fn is_broadcast_eligible(&self) -> bool {
        self.session_id.is_some() && self.status.is_broadcast_eligible()
    }
}
