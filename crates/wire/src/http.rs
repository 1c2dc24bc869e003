use serde::{Deserialize, Serialize};

use broadcaster_common::SessionId;

/// `POST /sessions` request body, spec.md section 6.1.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub user_id: String,
    #[serde(default)]
    pub preferred_region: Option<String>,
}

/// `POST /sessions` 201 response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub session_id: SessionId,
    pub seed: i64,
    pub start_at: i64,
    pub tick_ms: u32,
    pub region: String,
    pub ws_endpoint: String,
    pub http_endpoint: String,
}

/// `GET /sessions/{sessionId}` 200 response body, and the payload of
/// the supplemented `GET /sessions` listing (SPEC_FULL.md section 4).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub seed: i64,
    pub start_at: i64,
    pub tick_ms: u32,
    pub status: String,
    pub region: String,
    pub player_count: usize,
    pub ws_endpoint: String,
}

/// Body of every non-2xx HTTP response and of the duplex channel's
/// `error` message (spec.md section 6.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}
