use axum::{
    extract::{ws::Message, ws::WebSocket, State, WebSocketUpgrade},
    http::HeaderMap,
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use herald_core::config::{HANDSHAKE_TIMEOUT_MS, HEARTBEAT_INTERVAL_SECS, MAX_PAYLOAD_BYTES};
use herald_core::UserId;
use herald_notify::PushSubscription;
use herald_protocol::{frames::EventFrame, methods::EVENT_TICK};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::app::AppState;
use crate::auth;
use crate::ws::{handshake, message, send};

/// WS connection states: linear progression, no backwards transitions.
pub enum ConnState {
    AwaitingConnect,
    Authenticated { user_id: UserId },
    Closing,
}

/// Axum handler: upgrades HTTP to WebSocket at GET /ws.
///
/// The upgrade request's `x-user-id`, when the identity layer set one, pins
/// the identity the `connect` handshake may claim.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let upstream = auth::caller_user_id(&headers);
    ws.max_message_size(MAX_PAYLOAD_BYTES)
        .on_upgrade(move |socket| run_connection(socket, state, upstream))
}

/// What the hub handed this connection since the last poll.
enum Push {
    Frame(String),
    Lagged(u64),
    Closed,
}

/// Next frame from the hub. Pends forever before registration.
async fn next_push(sub: &mut Option<PushSubscription>) -> Push {
    let Some(sub) = sub else {
        return std::future::pending().await;
    };
    tokio::select! {
        direct = sub.direct.recv() => direct.map_or(Push::Closed, Push::Frame),
        group = sub.group.recv() => match group {
            Ok(frame) => Push::Frame(frame),
            Err(RecvError::Lagged(n)) => Push::Lagged(n),
            Err(RecvError::Closed) => Push::Closed,
        },
    }
}

/// Per-connection event loop: lives for the entire WS session.
async fn run_connection(socket: WebSocket, state: Arc<AppState>, upstream: Option<UserId>) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    info!(conn_id = %conn_id, "new WS connection");

    let (mut tx, mut rx) = socket.split();

    // send challenge and enter AwaitingConnect state
    let nonce = handshake::make_nonce();
    if send::text(&mut tx, handshake::challenge_event(&nonce))
        .await
        .is_err()
    {
        return;
    }
    let mut conn_state = ConnState::AwaitingConnect;
    // Some once the connection is filed in the hub.
    let mut subscription: Option<PushSubscription> = None;

    // handshake must complete within 10s
    let deadline =
        tokio::time::Instant::now() + std::time::Duration::from_millis(HANDSHAKE_TIMEOUT_MS);
    let mut handshake_timer = Box::pin(tokio::time::sleep_until(deadline));

    // heartbeat tick after auth
    let mut tick = tokio::time::interval(std::time::Duration::from_secs(HEARTBEAT_INTERVAL_SECS));
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            msg = rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if text.len() > MAX_PAYLOAD_BYTES {
                            warn!(conn_id, size = text.len(), "payload too large");
                            break;
                        }
                        conn_state = message::handle(&conn_id, &text, conn_state, upstream.as_ref(), &mut tx, &state).await;
                        if matches!(conn_state, ConnState::Closing) { break; }
                        if subscription.is_none() {
                            if let Some(user_id) = message::authenticated_user(&conn_state) {
                                subscription = Some(state.hub.register(user_id, &conn_id));
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = tx.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }

            push = next_push(&mut subscription) => {
                match push {
                    Push::Frame(frame) => {
                        if send::text(&mut tx, frame).await.is_err() {
                            break;
                        }
                    }
                    Push::Lagged(n) => debug!(conn_id, skipped = n, "push receiver lagged"),
                    Push::Closed => break,
                }
            }

            _ = tick.tick() => {
                if matches!(conn_state, ConnState::Authenticated { .. }) {
                    let ev = EventFrame::new(
                        EVENT_TICK,
                        serde_json::json!({ "ts": chrono::Utc::now().timestamp_millis() }),
                    ).with_seq(state.hub.next_seq());
                    if send::text(&mut tx, ev.into_text()).await.is_err() {
                        break;
                    }
                }
            }

            _ = &mut handshake_timer, if matches!(conn_state, ConnState::AwaitingConnect) => {
                warn!(conn_id, "handshake timeout");
                break;
            }
        }
    }

    if let Some(user_id) = message::authenticated_user(&conn_state) {
        state.hub.unregister(user_id, &conn_id);
    }
    info!(conn_id, "WS connection closed");
}
