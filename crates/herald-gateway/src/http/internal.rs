//! Endpoints called by the relay and by operators, never by end users.
//!
//! Both require `Authorization: Bearer <gateway.internal_token>` when a token
//! is configured.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use herald_core::{Category, NotificationPayload};
use herald_notify::DeliveryReport;
use herald_protocol::relay::{parse_login, PostMessageRequest, PostMessageResponse};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::app::AppState;
use crate::auth::{error_body, verify_internal_token, ApiError};

/// POST /internal/post-message: resolve a `/login <email>` chat message to a
/// user. Anything that is not a login, or an unknown email, answers
/// `{"userId": null}`; the relay then keeps the chat unlinked.
pub async fn post_message(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<PostMessageRequest>,
) -> Result<Json<PostMessageResponse>, ApiError> {
    verify_internal_token(&headers, state.config.gateway.internal_token.as_deref())?;

    let update = req.chat_update;
    let Some(email) = parse_login(&update.text) else {
        return Ok(Json(PostMessageResponse::default()));
    };

    let user = state
        .users
        .find_by_email(email)
        .map_err(|e| error_body(StatusCode::INTERNAL_SERVER_ERROR, e))?;
    match user {
        Some(user) => {
            info!(chat_id = %update.chat_id, user_id = %user.id, "chat login resolved");
            Ok(Json(PostMessageResponse {
                user_id: Some(user.id),
            }))
        }
        None => {
            info!(chat_id = %update.chat_id, "chat login for unknown email");
            Ok(Json(PostMessageResponse::default()))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AnnounceRequest {
    pub title: String,
    /// Label shown before the title, e.g. `"Post"` or `"Document"`.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AnnounceResponse {
    pub phone: Option<DeliveryReport>,
    pub chat: Option<DeliveryReport>,
}

/// POST /internal/announce: broadcast `{title, type}` on both channels.
///
/// Channel failures are logged and reported as `null`; the request itself
/// succeeds once the input is valid.
pub async fn announce(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<AnnounceRequest>,
) -> Result<Json<AnnounceResponse>, ApiError> {
    verify_internal_token(&headers, state.config.gateway.internal_token.as_deref())?;

    if req.title.trim().is_empty() {
        return Err(error_body(
            StatusCode::UNPROCESSABLE_ENTITY,
            "title must not be empty",
        ));
    }
    let label = req
        .kind
        .filter(|k| !k.trim().is_empty())
        .unwrap_or_else(|| "Announcement".to_string());
    let payload = NotificationPayload::new(label, req.title.trim(), Category::Announcement);

    let (phone, chat) = tokio::join!(
        state.dispatch.dispatch_phone(&payload),
        state.dispatch.announce(&payload),
    );
    let phone = phone
        .inspect_err(|e| warn!(error = %e, "announcement push failed"))
        .ok();
    let chat = chat
        .inspect_err(|e| warn!(error = %e, "announcement chat relay failed"))
        .ok();
    Ok(Json(AnnounceResponse { phone, chat }))
}

#[cfg(test)]
mod tests {
    use crate::app::build_router;
    use crate::http::testing::{app_state, body_json, json_request};
    use axum::http::StatusCode;
    use herald_core::config::HeraldConfig;
    use herald_core::Category;
    use serde_json::json;
    use tower::ServiceExt;

    fn login(text: &str) -> serde_json::Value {
        json!({"chatUpdate": {"chatId": "42", "text": text, "username": "ada"}})
    }

    #[tokio::test]
    async fn login_resolves_known_email_case_insensitively() {
        let (state, _) = app_state(HeraldConfig::default());
        let user = state.users.create_user("ada@example.com", "Ada").unwrap();
        let router = build_router(state);

        let resp = router
            .clone()
            .oneshot(json_request(
                "POST",
                "/internal/post-message",
                login("/login ADA@example.com"),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["userId"], user.id.as_str());

        for text in ["/login who@example.com", "hello", "/login"] {
            let resp = router
                .clone()
                .oneshot(json_request("POST", "/internal/post-message", login(text)))
                .await
                .unwrap();
            assert!(body_json(resp).await["userId"].is_null(), "{text}");
        }
    }

    #[tokio::test]
    async fn internal_routes_require_token_when_configured() {
        let mut config = HeraldConfig::default();
        config.gateway.internal_token = Some("relay-secret".into());
        let (state, dispatch) = app_state(config);
        let router = build_router(state);

        let denied = router
            .clone()
            .oneshot(json_request("POST", "/internal/announce", json!({"title": "x"})))
            .await
            .unwrap();
        assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);
        assert!(dispatch.announced.lock().unwrap().is_empty());

        let mut req = json_request("POST", "/internal/post-message", login("/login a@b.c"));
        req.headers_mut()
            .insert("authorization", "Bearer relay-secret".parse().unwrap());
        let allowed = router.oneshot(req).await.unwrap();
        assert_eq!(allowed.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn announce_goes_out_on_both_channels() {
        let (state, dispatch) = app_state(HeraldConfig::default());
        let resp = build_router(state)
            .oneshot(json_request(
                "POST",
                "/internal/announce",
                json!({"title": "Office closed Friday", "type": "Post"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["phone"]["delivered"], 1);
        assert_eq!(body["chat"]["delivered"], 2);

        let announced = dispatch.announced.lock().unwrap();
        assert_eq!(announced[0].title, "Post");
        assert_eq!(announced[0].body, "Office closed Friday");
        assert_eq!(announced[0].category, Category::Announcement);
        assert_eq!(dispatch.phone.lock().unwrap().len(), 1);
    }
}
