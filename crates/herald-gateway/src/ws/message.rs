use herald_core::UserId;
use herald_protocol::{
    frames::{Frame, ReqFrame, ResFrame},
    handshake::ConnectParams,
    methods::{CONNECT, PING},
};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use crate::app::AppState;
use crate::ws::connection::ConnState;
use crate::ws::handshake;
use crate::ws::send::{self, WsSink};

/// Process one inbound WS text frame. Returns the new connection state.
///
/// Only `req` frames are acted on; anything else a client sends is ignored.
pub async fn handle(
    conn_id: &str,
    text: &str,
    state: ConnState,
    upstream: Option<&UserId>,
    tx: &mut WsSink,
    app: &Arc<AppState>,
) -> ConnState {
    let req = match Frame::parse(text) {
        Ok(frame) => match frame.into_req() {
            Some(req) => req,
            None => return state,
        },
        Err(e) => {
            warn!(conn_id, error = %e, "malformed frame");
            return state;
        }
    };

    match state {
        ConnState::AwaitingConnect => handle_auth(conn_id, req, upstream, tx, app).await,
        ConnState::Authenticated { user_id } => {
            handle_method(req, tx).await;
            ConnState::Authenticated { user_id }
        }
        ConnState::Closing => ConnState::Closing,
    }
}

/// Pre-auth: only the `connect` method is accepted.
async fn handle_auth(
    conn_id: &str,
    req: ReqFrame,
    upstream: Option<&UserId>,
    tx: &mut WsSink,
    app: &Arc<AppState>,
) -> ConnState {
    if req.method != CONNECT {
        reply(tx, ResFrame::err(&req.id, "PROTOCOL_ERROR", "must authenticate first")).await;
        return ConnState::AwaitingConnect;
    }

    let params: ConnectParams = match req.params.and_then(|p| serde_json::from_value(p).ok()) {
        Some(p) => p,
        None => {
            reply(tx, ResFrame::err(&req.id, "PROTOCOL_ERROR", "invalid connect params")).await;
            return ConnState::Closing;
        }
    };

    match handshake::verify_auth(&params, upstream, &app.config) {
        Ok(user_id) => {
            reply(tx, ResFrame::ok(&req.id, handshake::hello_ok_payload(&user_id))).await;
            info!(conn_id, %user_id, "client authenticated");
            ConnState::Authenticated { user_id }
        }
        Err(reason) => {
            warn!(conn_id, %reason, "auth failed");
            reply(tx, ResFrame::err(&req.id, "AUTH_FAILED", &reason)).await;
            ConnState::Closing
        }
    }
}

/// Post-auth: the push channel is server-to-client, so `ping` is the only method.
async fn handle_method(req: ReqFrame, tx: &mut WsSink) {
    let res = match req.method.as_str() {
        PING => ResFrame::ok(
            &req.id,
            json!({ "pong": true, "ts": chrono::Utc::now().timestamp_millis() }),
        ),
        other => ResFrame::err(&req.id, "UNKNOWN_METHOD", &format!("unknown method: {other}")),
    };
    reply(tx, res).await;
}

/// A failed write surfaces on the next read, which ends the loop.
async fn reply(tx: &mut WsSink, res: ResFrame) {
    let _ = send::text(tx, res.into_text()).await;
}

/// Identity of an authenticated connection, if any.
pub fn authenticated_user(state: &ConnState) -> Option<&UserId> {
    match state {
        ConnState::Authenticated { user_id } => Some(user_id),
        _ => None,
    }
}
