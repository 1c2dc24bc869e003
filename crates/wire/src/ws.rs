use serde::{Deserialize, Serialize};

/// Inbound duplex-channel messages, spec.md section 6.2. Tagged on
/// `action` to match the wire examples in the spec exactly.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientMessage {
    Join {
        #[serde(rename = "sessionId")]
        session_id: String,
        #[serde(rename = "userId")]
        user_id: String,
    },
    Ping {
        #[serde(rename = "clientTimestamp")]
        client_timestamp: i64,
    },
}

/// The three-valued latency classification of spec.md section 4.3.4.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LatencyClass {
    Ok,
    Warning,
    Critical,
}

/// Outbound duplex-channel messages, spec.md section 6.2. Tagged on
/// `type`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    SessionJoined {
        #[serde(rename = "sessionId")]
        session_id: String,
        seed: i64,
        #[serde(rename = "startAt")]
        start_at: i64,
        #[serde(rename = "tickMs")]
        tick_ms: u32,
        region: String,
        #[serde(rename = "wsEndpoint")]
        ws_endpoint: String,
    },
    Countdown {
        #[serde(rename = "remainingMs")]
        remaining_ms: i64,
        #[serde(rename = "startAt")]
        start_at: i64,
    },
    Tick {
        step: i64,
        value: i64,
        round: i64,
        broken: bool,
        #[serde(rename = "serverTimestamp")]
        server_timestamp: i64,
    },
    Pong {
        #[serde(rename = "clientTimestamp")]
        client_timestamp: i64,
        #[serde(rename = "serverTimestamp")]
        server_timestamp: i64,
    },
    LatencyStatus {
        #[serde(rename = "avgLatency")]
        avg_latency: u32,
        jitter: u32,
        status: LatencyClass,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    Kicked {
        reason: String,
        #[serde(rename = "avgLatency")]
        avg_latency: u32,
        jitter: u32,
        #[serde(rename = "maxLatency")]
        max_latency: u32,
        #[serde(rename = "maxJitter")]
        max_jitter: u32,
    },
    Error {
        code: String,
        message: String,
    },
}
