//! Request identity helpers shared by the HTTP handlers.

use axum::{
    http::{HeaderMap, StatusCode},
    Json,
};
use herald_core::UserId;
use serde_json::{json, Value};
use tracing::warn;

/// Error shape every handler returns.
pub type ApiError = (StatusCode, Json<Value>);

/// Header carrying the caller identity set by the upstream identity layer.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Caller identity from `x-user-id`, if present and non-empty.
pub fn caller_user_id(headers: &HeaderMap) -> Option<UserId> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(UserId::from)
}

/// Check `Authorization: Bearer <token>` against the configured internal
/// token. No token configured means the internal routes are open.
pub fn verify_internal_token(headers: &HeaderMap, expected: Option<&str>) -> Result<(), ApiError> {
    let Some(expected) = expected else {
        return Ok(());
    };
    let provided = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    match provided {
        Some(token) if token == expected => Ok(()),
        Some(_) => Err(auth_error("invalid bearer token")),
        None => Err(auth_error("missing Authorization: Bearer header")),
    }
}

fn auth_error(reason: &str) -> ApiError {
    warn!(reason, "internal request rejected");
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": "authentication failed"})),
    )
}

pub fn error_body(status: StatusCode, message: impl std::fmt::Display) -> ApiError {
    (status, Json(json!({"error": message.to_string()})))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caller_identity_ignores_blank_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(caller_user_id(&headers), None);
        headers.insert(USER_ID_HEADER, "  ".parse().unwrap());
        assert_eq!(caller_user_id(&headers), None);
        headers.insert(USER_ID_HEADER, "u-7".parse().unwrap());
        assert_eq!(caller_user_id(&headers), Some(UserId::from("u-7")));
    }

    #[test]
    fn internal_token_check() {
        let mut headers = HeaderMap::new();
        assert!(verify_internal_token(&headers, None).is_ok());
        assert!(verify_internal_token(&headers, Some("t")).is_err());
        headers.insert("authorization", "Bearer nope".parse().unwrap());
        assert!(verify_internal_token(&headers, Some("t")).is_err());
        headers.insert("authorization", "Bearer t".parse().unwrap());
        assert!(verify_internal_token(&headers, Some("t")).is_ok());
    }
}
