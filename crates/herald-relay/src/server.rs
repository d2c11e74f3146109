//! Relay HTTP API used by the main application.
//!
//! - `POST /send-message` `{chatId?, message}`: one chat, or every linked chat
//!   plus the announcement chat when `chatId` is absent
//! - `GET /chats`: linked chats
//! - `GET /health`
//!
//! When `relay.api_token` is set, the first two require `Authorization: Bearer <token>`.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use futures_util::future::join_all;
use herald_core::ChatId;
use herald_protocol::relay::{ChatTarget, ChatsResponse, SendMessageRequest, SendMessageResponse};
use herald_users::ChatLinkRegistry;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::chat::ChatApi;
use crate::error::RelayError;

type ApiError = (StatusCode, Json<Value>);

/// Shared state for the relay's axum handlers.
pub struct RelayState {
    pub links: ChatLinkRegistry,
    pub chat: Arc<dyn ChatApi>,
    /// Extra broadcast recipient that never links (a channel or group).
    pub announcement_chat: Option<ChatId>,
    pub api_token: Option<String>,
    /// Per-chat send timeout.
    pub send_timeout: Duration,
}

pub fn build_router(state: Arc<RelayState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/chats", get(chats_handler))
        .route("/send-message", post(send_message_handler))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

async fn health_handler(State(state): State<Arc<RelayState>>) -> Json<Value> {
    let linked = state.links.list_linked().map(|l| l.len()).unwrap_or(0);
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "linked_chats": linked,
    }))
}

async fn chats_handler(
    State(state): State<Arc<RelayState>>,
    headers: HeaderMap,
) -> Result<Json<ChatsResponse>, ApiError> {
    verify_bearer_token(&headers, state.api_token.as_deref())?;
    let chats = state
        .links
        .list_linked()
        .map_err(|e| internal(RelayError::from(e)))?
        .into_iter()
        .map(|link| ChatTarget {
            chat_id: link.chat_id,
            user_id: link.user_id,
        })
        .collect();
    Ok(Json(ChatsResponse { chats }))
}

async fn send_message_handler(
    State(state): State<Arc<RelayState>>,
    headers: HeaderMap,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, ApiError> {
    verify_bearer_token(&headers, state.api_token.as_deref())?;

    if req.message.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "message must not be empty"})),
        ));
    }

    match req.chat_id {
        Some(chat_id) => {
            let chat_id = ChatId::from(chat_id);
            send_bounded(&state, &chat_id, &req.message)
                .await
                .map_err(|e| {
                    (
                        StatusCode::BAD_GATEWAY,
                        Json(json!({"error": e.to_string(), "chatId": chat_id.as_str()})),
                    )
                })?;
            Ok(Json(SendMessageResponse {
                delivered: 1,
                failed: 0,
            }))
        }
        None => {
            let recipients = broadcast_recipients(&state).map_err(internal)?;
            Ok(Json(fan_out(&state, &recipients, &req.message).await))
        }
    }
}

/// Every linked chat plus the announcement chat, without duplicates.
fn broadcast_recipients(state: &RelayState) -> crate::error::Result<Vec<ChatId>> {
    let mut recipients: Vec<ChatId> = state
        .links
        .list_linked()?
        .into_iter()
        .map(|link| ChatId::from(link.chat_id))
        .collect();
    if let Some(extra) = &state.announcement_chat {
        if !recipients.contains(extra) {
            recipients.push(extra.clone());
        }
    }
    Ok(recipients)
}

/// Send to every recipient concurrently; one failure never blocks the rest.
async fn fan_out(state: &RelayState, recipients: &[ChatId], text: &str) -> SendMessageResponse {
    let outcomes = join_all(
        recipients
            .iter()
            .map(|chat_id| send_bounded(state, chat_id, text)),
    )
    .await;

    let mut report = SendMessageResponse::default();
    for (chat_id, outcome) in recipients.iter().zip(outcomes) {
        match outcome {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                report.failed += 1;
                warn!(%chat_id, error = %e, "broadcast delivery failed");
            }
        }
    }
    info!(delivered = report.delivered, failed = report.failed, "broadcast sent");
    report
}

async fn send_bounded(state: &RelayState, chat_id: &ChatId, text: &str) -> crate::error::Result<()> {
    tokio::time::timeout(state.send_timeout, state.chat.send_text(chat_id, text))
        .await
        .map_err(|_| RelayError::Timeout {
            ms: state.send_timeout.as_millis() as u64,
        })?
}

/// Static bearer token check. `None` disables authentication.
fn verify_bearer_token(headers: &HeaderMap, expected: Option<&str>) -> Result<(), ApiError> {
    let Some(expected) = expected else {
        return Ok(());
    };
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    if token == Some(expected) {
        Ok(())
    } else {
        warn!("relay API request with missing or wrong bearer token");
        Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "authentication failed"})),
        ))
    }
}

fn internal(e: RelayError) -> ApiError {
    warn!(error = %e, "relay request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": e.to_string()})),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use rusqlite::Connection;
    use tower::ServiceExt;

    /// Records sends; chat "13" always fails.
    #[derive(Default)]
    struct FlakyChat {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ChatApi for FlakyChat {
        async fn send_text(&self, chat_id: &ChatId, _text: &str) -> crate::error::Result<()> {
            if chat_id.as_str() == "13" {
                return Err(RelayError::InvalidChatId("bot was blocked".into()));
            }
            self.sent.lock().unwrap().push(chat_id.to_string());
            Ok(())
        }
    }

    fn state(token: Option<&str>) -> (Arc<RelayState>, Arc<FlakyChat>) {
        let conn = Arc::new(Mutex::new(Connection::open_in_memory().unwrap()));
        let links = ChatLinkRegistry::new(conn).unwrap();
        links.link("11", "u1").unwrap();
        links.link("12", "u2").unwrap();
        links.link("13", "u3").unwrap();
        links.ensure("14").unwrap();
        let chat = Arc::new(FlakyChat::default());
        let state = Arc::new(RelayState {
            links,
            chat: chat.clone(),
            announcement_chat: Some(ChatId::from(-100i64)),
            api_token: token.map(String::from),
            send_timeout: Duration::from_secs(1),
        });
        (state, chat)
    }

    fn post_json(uri: &str, body: Value, token: Option<&str>) -> Request<Body> {
        let mut req = Request::post(uri).header("content-type", "application/json");
        if let Some(t) = token {
            req = req.header("authorization", format!("Bearer {t}"));
        }
        req.body(Body::from(body.to_string())).unwrap()
    }

    async fn body_json(resp: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn broadcast_reaches_linked_chats_and_announcement_chat() {
        let (state, chat) = state(None);
        let resp = build_router(state)
            .oneshot(post_json("/send-message", json!({"message": "Event: Town hall"}), None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["delivered"], 3);
        assert_eq!(body["failed"], 1);

        let mut sent = chat.sent.lock().unwrap().clone();
        sent.sort();
        assert_eq!(sent, ["-100", "11", "12"]);
    }

    #[tokio::test]
    async fn single_chat_failure_is_bad_gateway() {
        let (state, _) = state(None);
        let resp = build_router(state)
            .oneshot(post_json(
                "/send-message",
                json!({"chatId": "13", "message": "hi"}),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn token_is_required_when_configured() {
        let (state, _) = state(Some("s3cret"));
        let router = build_router(state);

        let denied = router
            .clone()
            .oneshot(post_json("/send-message", json!({"chatId": "11", "message": "x"}), None))
            .await
            .unwrap();
        assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);

        let allowed = router
            .oneshot(post_json(
                "/send-message",
                json!({"chatId": "11", "message": "x"}),
                Some("s3cret"),
            ))
            .await
            .unwrap();
        assert_eq!(allowed.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn chats_lists_linked_only() {
        let (state, _) = state(None);
        let resp = build_router(state)
            .oneshot(Request::get("/chats").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(resp).await;
        let chats = body["chats"].as_array().unwrap();
        assert_eq!(chats.len(), 3);
        let first = chats.iter().find(|c| c["chatId"] == "11").unwrap();
        assert_eq!(first["userId"], "u1");
        assert!(chats.iter().all(|c| c["chatId"] != "14"));
    }

    #[tokio::test]
    async fn empty_message_is_rejected() {
        let (state, chat) = state(None);
        let resp = build_router(state)
            .oneshot(post_json("/send-message", json!({"message": "  "}), None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(chat.sent.lock().unwrap().is_empty());
    }
}
