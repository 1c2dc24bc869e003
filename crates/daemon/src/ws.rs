use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use broadcaster_common::{ConnectionId, SessionId};
use broadcaster_store::{Connection, ConnectionStatus};
use broadcaster_wire::{ClientMessage, LatencyClass, ServerMessage};

use crate::http::now_ms;
use crate::state::AppState;

pub async fn upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle(state, socket))
}

/// One connection's lifetime: registers it `connecting` in the store,
/// runs the duplex `select!` loop of spec.md section 6.2 against the
/// inbound socket and the outbound channel the dispatcher fans ticks
/// into, and on exit (either direction) marks the connection
/// `disconnected` and releases its sink registration — the same
/// split-sender/receiver-plus-select shape as `moor-web-host`'s
/// `WebSocketConnection::handle`, adapted to a store-backed connection
/// instead of an RPC session.
async fn handle(state: AppState, socket: WebSocket) {
    let connection_id = ConnectionId::new();
    let now = now_ms();
    let connection = Connection {
        connection_id,
        session_id: None,
        user_id: None,
        region: state.config.region.clone(),
        status: ConnectionStatus::Connecting,
        latency_history: Vec::new(),
        avg_latency: 0,
        jitter: 0,
        joined_at: None,
        last_ping_at: None,
        last_pong_at: None,
        ttl: now + state.config.connection_ttl_seconds as i64 * 1000,
        kick_reason: None,
        last_classification: None,
    };
    if let Err(e) = state.store.create_connection(connection) {
        warn!(%connection_id, error = %e, "failed to register new connection");
        return;
    }
    info!(%connection_id, "connection opened");

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let mut outbound = state.sink.register(connection_id);

    loop {
        tokio::select! {
            inbound = ws_receiver.next() => {
                let Some(Ok(msg)) = inbound else {
                    debug!(%connection_id, "socket closed by peer");
                    break;
                };
                let Message::Text(text) = msg else {
                    continue;
                };
                if !process_inbound(&state, connection_id, &text, &mut ws_sender).await {
                    break;
                }
            }
            outbound_msg = outbound.recv() => {
                let Some(outbound_msg) = outbound_msg else {
                    break;
                };
                if send(&mut ws_sender, &outbound_msg).await.is_err() {
                    break;
                }
                if matches!(outbound_msg, ServerMessage::Tick { .. }) {
                    let _ = state.connection_manager.mark_first_tick_delivered(connection_id);
                }
                if matches!(outbound_msg, ServerMessage::Kicked { .. }) {
                    break;
                }
            }
        }
    }

    state.sink.unregister(connection_id);
    let _ = state.connection_manager.mark_disconnected(connection_id);
    info!(%connection_id, "connection closed");
}

/// Returns `false` when the connection should be torn down.
async fn process_inbound(
    state: &AppState,
    connection_id: ConnectionId,
    text: &str,
    ws_sender: &mut (impl futures::Sink<Message> + Unpin),
) -> bool {
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            let _ = send(
                ws_sender,
                &ServerMessage::Error {
                    code: "INVALID_REQUEST".to_string(),
                    message: format!("malformed message: {e}"),
                },
            )
            .await;
            return true;
        }
    };

    match message {
        ClientMessage::Join { session_id, user_id } => {
            handle_join(state, connection_id, &session_id, user_id, ws_sender).await
        }
        ClientMessage::Ping { client_timestamp } => {
            handle_ping(state, connection_id, client_timestamp, ws_sender).await
        }
    }
}

async fn handle_join(
    state: &AppState,
    connection_id: ConnectionId,
    session_id: &str,
    user_id: String,
    ws_sender: &mut (impl futures::Sink<Message> + Unpin),
) -> bool {
    let Ok(session_id) = session_id.parse::<uuid::Uuid>().map(SessionId::from) else {
        let _ = send(
            ws_sender,
            &ServerMessage::Error {
                code: "INVALID_REQUEST".to_string(),
                message: format!("invalid sessionId: {session_id}"),
            },
        )
        .await;
        return true;
    };

    let session = match state.store.get_session(session_id) {
        Ok(s) => s,
        Err(e) => {
            let _ = send(
                ws_sender,
                &ServerMessage::Error {
                    code: e.code().to_string(),
                    message: e.to_string(),
                },
            )
            .await;
            return true;
        }
    };

    if let Err(e) = state
        .connection_manager
        .join(connection_id, session_id, user_id, now_ms())
    {
        let _ = send(
            ws_sender,
            &ServerMessage::Error {
                code: e.code().to_string(),
                message: e.to_string(),
            },
        )
        .await;
        return true;
    }

    send(
        ws_sender,
        &ServerMessage::SessionJoined {
            session_id: session.session_id.to_string(),
            seed: session.seed,
            start_at: session.start_at,
            tick_ms: session.tick_ms,
            region: session.region,
            ws_endpoint: state.ws_endpoint.clone(),
        },
    )
    .await
    .is_ok()
}

async fn handle_ping(
    state: &AppState,
    connection_id: ConnectionId,
    client_timestamp: i64,
    ws_sender: &mut (impl futures::Sink<Message> + Unpin),
) -> bool {
    let now = now_ms();
    let outcome = match state
        .connection_manager
        .handle_ping(connection_id, client_timestamp, now)
    {
        Ok(o) => o,
        Err(e) => {
            let _ = send(
                ws_sender,
                &ServerMessage::Error {
                    code: e.code().to_string(),
                    message: e.to_string(),
                },
            )
            .await;
            return false;
        }
    };

    if send(
        ws_sender,
        &ServerMessage::Pong {
            client_timestamp,
            server_timestamp: now,
        },
    )
    .await
    .is_err()
    {
        return false;
    }

    if outcome.classification_changed && outcome.classification == LatencyClass::Warning {
        let message = Some("latency is degrading".to_string());
        let _ = send(
            ws_sender,
            &ServerMessage::LatencyStatus {
                avg_latency: outcome.avg_latency,
                jitter: outcome.jitter,
                status: outcome.classification,
                message,
            },
        )
        .await;
    }

    if let Some(kick) = outcome.kick {
        // Spec.md section 5: the kick message must be observed (or
        // attempted) before the transport closes.
        let _ = send(
            ws_sender,
            &ServerMessage::Kicked {
                reason: kick.reason,
                avg_latency: kick.avg_latency,
                jitter: kick.jitter,
                max_latency: kick.max_latency,
                max_jitter: kick.max_jitter,
            },
        )
        .await;
        return false;
    }

    true
}

async fn send(
    ws_sender: &mut (impl futures::Sink<Message> + Unpin),
    message: &ServerMessage,
) -> Result<(), ()> {
    let json = serde_json::to_string(message).map_err(|_| ())?;
    ws_sender.send(Message::Text(json.into())).await.map_err(|_| ())
}
