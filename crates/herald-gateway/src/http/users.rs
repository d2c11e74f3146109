//! POST /users: seeds the user directory. Stands in for the identity layer
//! that owns users in a full deployment.

use axum::{extract::State, http::StatusCode, Json};
use herald_users::{User, UserError};
use serde::Deserialize;
use std::sync::Arc;

use crate::app::AppState;
use crate::auth::{error_body, ApiError};

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    #[serde(default)]
    pub display_name: String,
}

pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    match state.users.create_user(&req.email, &req.display_name) {
        Ok(user) => Ok((StatusCode::CREATED, Json(user))),
        Err(e @ UserError::AlreadyExists(_)) => Err(error_body(StatusCode::CONFLICT, e)),
        Err(e @ UserError::InvalidEmail(_)) => Err(error_body(StatusCode::UNPROCESSABLE_ENTITY, e)),
        Err(e) => Err(error_body(StatusCode::INTERNAL_SERVER_ERROR, e)),
    }
}

#[cfg(test)]
mod tests {
    use crate::app::build_router;
    use crate::http::testing::{app_state, body_json, json_request};
    use axum::http::StatusCode;
    use herald_core::config::HeraldConfig;
    use serde_json::json;
    use tower::ServiceExt;

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let (state, _) = app_state(HeraldConfig::default());
        let router = build_router(state);

        let body = json!({"email": "Ada@Example.com", "display_name": "Ada"});
        let first = router
            .clone()
            .oneshot(json_request("POST", "/users", body.clone()))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::CREATED);
        assert_eq!(body_json(first).await["email"], "ada@example.com");

        let again = router
            .clone()
            .oneshot(json_request("POST", "/users", json!({"email": "ada@example.com"})))
            .await
            .unwrap();
        assert_eq!(again.status(), StatusCode::CONFLICT);

        let bad = router
            .oneshot(json_request("POST", "/users", json!({"email": "not-an-email"})))
            .await
            .unwrap();
        assert_eq!(bad.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
