use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

use crate::app::AppState;

/// GET /health: liveness probe, returns server metadata.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let jobs = state.scheduler.status_counts().unwrap_or_else(|e| {
        warn!(error = %e, "health: job status counts unavailable");
        Default::default()
    });
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": herald_core::config::PROTOCOL_VERSION,
        "push_connections": state.hub.connection_count(),
        "push_users": state.hub.user_count(),
        "jobs": jobs,
    }))
}

#[cfg(test)]
mod tests {
    use crate::app::build_router;
    use crate::http::testing::{app_state, body_json};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use herald_core::{config::HeraldConfig, UserId};
    use tower::ServiceExt;

    #[tokio::test]
    async fn reports_push_connections() {
        let (state, _) = app_state(HeraldConfig::default());
        let _a = state.hub.register(&UserId::from("u-1"), "c1");
        let _b = state.hub.register(&UserId::from("u-1"), "c2");

        let resp = build_router(state)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["push_connections"], 2);
        assert_eq!(body["push_users"], 1);
    }
}
