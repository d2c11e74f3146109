//! Shared fixtures for router tests: in-memory SQLite plus a recording dispatcher.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use chrono::{TimeZone, Utc};
use herald_core::config::HeraldConfig;
use herald_core::{FixedClock, NotificationPayload};
use herald_events::{EventService, EventStore};
use herald_notify::{DeliveryReport, NotificationDispatch, PushHub};
use herald_scheduler::{JobQueue, SchedulerHandle};
use herald_users::UserDirectory;
use rusqlite::Connection;
use serde_json::Value;

use crate::app::AppState;

#[derive(Default)]
pub struct RecordingDispatch {
    pub phone: Mutex<Vec<NotificationPayload>>,
    pub announced: Mutex<Vec<NotificationPayload>>,
}

#[async_trait]
impl NotificationDispatch for RecordingDispatch {
    async fn dispatch_phone(&self, p: &NotificationPayload) -> herald_notify::Result<DeliveryReport> {
        self.phone.lock().unwrap().push(p.clone());
        Ok(DeliveryReport {
            delivered: 1,
            failed: 0,
        })
    }
    async fn dispatch_chat(&self, _p: &NotificationPayload) -> herald_notify::Result<DeliveryReport> {
        Ok(DeliveryReport::default())
    }
    async fn announce(&self, p: &NotificationPayload) -> herald_notify::Result<DeliveryReport> {
        self.announced.lock().unwrap().push(p.clone());
        Ok(DeliveryReport {
            delivered: 2,
            failed: 0,
        })
    }
}

pub fn now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()
}

/// App state over one shared in-memory database, clock fixed at [`now`].
pub fn app_state(config: HeraldConfig) -> (Arc<AppState>, Arc<RecordingDispatch>) {
    let db = Arc::new(Mutex::new(Connection::open_in_memory().unwrap()));
    let users = UserDirectory::new(db.clone()).unwrap();
    let scheduler = SchedulerHandle::new(db.clone()).unwrap();
    let dispatch = Arc::new(RecordingDispatch::default());
    let events = EventService::new(
        EventStore::new(db).unwrap(),
        users.clone(),
        dispatch.clone(),
        Arc::new(scheduler.clone()) as Arc<dyn JobQueue>,
        Arc::new(FixedClock(now())),
        Duration::from_secs(1),
    );
    let state = Arc::new(AppState::new(
        config,
        Arc::new(PushHub::new()),
        events,
        users,
        scheduler,
        dispatch.clone(),
    ));
    (state, dispatch)
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_json(resp: Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
