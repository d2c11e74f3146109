use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tokio::sync::Notify;

use crate::{
    engine::SchedulerEngine,
    error::Result,
    handler::HandlerRegistry,
    store::JobStore,
    types::{Invocation, Job, JobStatus},
};

/// Enqueue side of the scheduler, as seen by producers such as the event service.
pub trait JobQueue: Send + Sync {
    /// Run as soon as a worker is free.
    fn enqueue_now(&self, name: &str, invocation: Invocation) -> Result<Job>;

    /// Run no earlier than `due_at`.
    fn enqueue_at(&self, name: &str, invocation: Invocation, due_at: DateTime<Utc>)
        -> Result<Job>;
}

/// Shared handle for enqueueing and inspecting jobs while the engine loop runs.
///
/// Enqueueing wakes the engine immediately instead of waiting for the next poll.
#[derive(Clone)]
pub struct SchedulerHandle {
    pub(crate) store: JobStore,
    wake: Arc<Notify>,
}

impl SchedulerHandle {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Result<Self> {
        Ok(Self {
            store: JobStore::new(conn)?,
            wake: Arc::new(Notify::new()),
        })
    }

    /// Build the engine that drains this handle's queue.
    pub fn engine(
        &self,
        handlers: HandlerRegistry,
        workers: usize,
        poll_interval: Duration,
    ) -> SchedulerEngine {
        SchedulerEngine::new(
            self.store.clone(),
            handlers,
            workers,
            poll_interval,
            self.wake.clone(),
        )
    }

    pub fn list_jobs(&self) -> Result<Vec<Job>> {
        self.store.list()
    }

    pub fn get_job(&self, id: &str) -> Result<Option<Job>> {
        self.store.get(id)
    }

    pub fn status_counts(&self) -> Result<HashMap<JobStatus, u64>> {
        self.store.status_counts()
    }
}

impl JobQueue for SchedulerHandle {
    fn enqueue_now(&self, name: &str, invocation: Invocation) -> Result<Job> {
        self.enqueue_at(name, invocation, Utc::now())
    }

    fn enqueue_at(
        &self,
        name: &str,
        invocation: Invocation,
        due_at: DateTime<Utc>,
    ) -> Result<Job> {
        let job = self.store.insert(name, invocation, due_at)?;
        if job.due_at <= Utc::now() {
            self.wake.notify_one();
        }
        Ok(job)
    }
}
