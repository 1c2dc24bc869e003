use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use rand::Rng;

use broadcaster_common::{CoreError, SessionId};
use broadcaster_store::{Session, SessionStatus};
use broadcaster_wire::{
    CreateSessionRequest, CreateSessionResponse, ErrorBody, SessionSnapshot,
};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sessions", post(create_session).get(list_sessions))
        .route(
            "/sessions/{session_id}",
            get(get_session).delete(stop_session),
        )
        .route("/healthz", get(healthz))
}

pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_millis() as i64
}

struct ApiError(CoreError);

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorBody {
            code: self.0.code().to_string(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

async fn healthz() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

/// `POST /sessions`, spec.md section 6.1.
async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<Response, ApiError> {
    if request.user_id.trim().is_empty() {
        return Err(CoreError::Validation("userId must not be empty".to_string()).into());
    }

    let now = now_ms();
    let session_id = SessionId::new();
    let seed = rand::rng().random::<i64>();
    let region = request
        .preferred_region
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| state.config.region.clone());

    let session = Session {
        session_id,
        seed,
        start_at: now + state.config.countdown_ms as i64,
        tick_ms: state.config.default_tick_ms,
        status: SessionStatus::Waiting,
        region,
        created_at: now,
        ttl: now + state.config.session_ttl_seconds as i64 * 1000,
        cached_step: None,
        cached_value: None,
        cached_round: None,
    };
    state.store.create_session(session.clone())?;

    let response = CreateSessionResponse {
        session_id: session.session_id,
        seed: session.seed,
        start_at: session.start_at,
        tick_ms: session.tick_ms,
        region: session.region,
        ws_endpoint: state.ws_endpoint.clone(),
        http_endpoint: state.http_endpoint.clone(),
    };
    Ok((StatusCode::CREATED, Json(response)).into_response())
}

/// `GET /sessions/{sessionId}`, spec.md section 6.1.
async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let session_id = parse_session_id(&session_id)?;
    let session = state.store.get_session(session_id)?;
    Ok(Json(to_snapshot(&state, &session)))
}

/// `GET /sessions`, a supplemented listing endpoint (SPEC_FULL.md
/// section 4) for operational visibility into active sessions on this
/// node.
async fn list_sessions(State(state): State<AppState>) -> Result<Json<Vec<SessionSnapshot>>, ApiError> {
    let sessions = state.store.list_active()?;
    Ok(Json(
        sessions.iter().map(|s| to_snapshot(&state, s)).collect(),
    ))
}

/// `DELETE /sessions/{sessionId}`, a supplemented stop endpoint
/// (SPEC_FULL.md section 4). Idempotent: `stopped` is a terminal
/// status, so repeating the call on an already-stopped session simply
/// succeeds again.
async fn stop_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let session_id = parse_session_id(&session_id)?;
    let session = state.store.get_session(session_id)?;
    if session.status != SessionStatus::Stopped {
        state
            .store
            .update_session_status(session_id, SessionStatus::Stopped)?;
    }
    Ok(StatusCode::NO_CONTENT)
}

fn parse_session_id(raw: &str) -> Result<SessionId, ApiError> {
    raw.parse::<uuid::Uuid>()
        .map(SessionId::from)
        .map_err(|_| ApiError(CoreError::Validation(format!("invalid sessionId: {raw}"))))
}

fn to_snapshot(state: &AppState, session: &Session) -> SessionSnapshot {
    let player_count = state
        .store
        .list_connections_by_session(session.session_id)
        .map(|v| v.len())
        .unwrap_or(0);
    SessionSnapshot {
        session_id: session.session_id,
        seed: session.seed,
        start_at: session.start_at,
        tick_ms: session.tick_ms,
        status: session.status.as_str().to_string(),
        region: session.region.clone(),
        player_count,
        ws_endpoint: state.ws_endpoint.clone(),
    }
}
