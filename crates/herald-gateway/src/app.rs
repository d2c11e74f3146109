use axum::{
    routing::{get, post},
    Router,
};
use herald_core::config::HeraldConfig;
use herald_events::EventService;
use herald_notify::{NotificationDispatch, PushHub};
use herald_scheduler::SchedulerHandle;
use herald_users::UserDirectory;
use std::sync::Arc;

/// Central shared state: passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: HeraldConfig,
    pub hub: Arc<PushHub>,
    pub events: EventService,
    pub users: UserDirectory,
    pub scheduler: SchedulerHandle,
    /// Used directly by `/internal/announce`; the event service holds its own handle.
    pub dispatch: Arc<dyn NotificationDispatch>,
}

impl AppState {
    pub fn new(
        config: HeraldConfig,
        hub: Arc<PushHub>,
        events: EventService,
        users: UserDirectory,
        scheduler: SchedulerHandle,
        dispatch: Arc<dyn NotificationDispatch>,
    ) -> Self {
        Self {
            config,
            hub,
            events,
            users,
            scheduler,
            dispatch,
        }
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route("/ws", get(crate::ws::connection::ws_handler))
        .route(
            "/events",
            post(crate::http::events::create_event).get(crate::http::events::list_events),
        )
        .route(
            "/events/{id}",
            get(crate::http::events::get_event).delete(crate::http::events::delete_event),
        )
        .route("/jobs", get(crate::http::jobs::list_jobs))
        .route("/jobs/{id}", get(crate::http::jobs::get_job))
        .route("/users", post(crate::http::users::create_user))
        .route(
            "/internal/post-message",
            post(crate::http::internal::post_message),
        )
        .route("/internal/announce", post(crate::http::internal::announce))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
