use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{watch, Notify, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::{handler::HandlerRegistry, store::JobStore, types::Job};

/// Drives job execution: polls for due jobs and runs each on its own task,
/// at most `workers` at a time.
pub struct SchedulerEngine {
    store: JobStore,
    handlers: Arc<HandlerRegistry>,
    workers: Arc<Semaphore>,
    poll_interval: Duration,
    wake: Arc<Notify>,
}

impl SchedulerEngine {
    pub(crate) fn new(
        store: JobStore,
        handlers: HandlerRegistry,
        workers: usize,
        poll_interval: Duration,
        wake: Arc<Notify>,
    ) -> Self {
        Self {
            store,
            handlers: Arc::new(handlers),
            workers: Arc::new(Semaphore::new(workers.max(1))),
            poll_interval,
            wake,
        }
    }

    /// Main event loop. Runs until `shutdown` broadcasts `true`.
    ///
    /// In-flight jobs are not awaited on shutdown; whatever is still
    /// `executing` is picked up again on the next start.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            workers = self.workers.available_permits(),
            poll_ms = self.poll_interval.as_millis() as u64,
            handlers = ?self.handlers,
            "scheduler engine started"
        );
        if let Err(e) = self.store.recover_interrupted() {
            error!("interrupted-job recovery failed: {e}");
        }

        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.spawn_due();
                }
                _ = self.wake.notified() => {
                    self.spawn_due();
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("scheduler engine shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Claim and run every currently due job, waiting for all of them to finish.
    /// Returns how many jobs were started.
    pub async fn run_due(&self) -> usize {
        let handles = self.spawn_due();
        let n = handles.len();
        for outcome in futures_util::future::join_all(handles).await {
            if let Err(e) = outcome {
                error!("job task aborted: {e}");
            }
        }
        n
    }

    // --- private helpers ---------------------------------------------------

    /// Reserve every idle worker, claim at most that many due jobs and spawn
    /// one task per job holding its worker for the whole run.
    fn spawn_due(&self) -> Vec<JoinHandle<()>> {
        let mut permits = Vec::new();
        while let Ok(permit) = self.workers.clone().try_acquire_owned() {
            permits.push(permit);
        }
        if permits.is_empty() {
            debug!("all workers busy, deferring due jobs");
            return Vec::new();
        }
        let jobs = match self.store.claim_due(Utc::now(), permits.len()) {
            Ok(jobs) => jobs,
            Err(e) => {
                error!("scheduler poll error: {e}");
                return Vec::new();
            }
        };

        // Permits beyond the claimed jobs are released when `permits` drops.
        jobs.into_iter()
            .zip(permits)
            .map(|(job, permit)| {
                let store = self.store.clone();
                let handlers = self.handlers.clone();
                tokio::spawn(async move {
                    execute(store, handlers, job).await;
                    drop(permit);
                })
            })
            .collect()
    }
}

/// Run one claimed job and record the outcome. Never propagates: a bad job
/// must not take the engine down with it.
async fn execute(store: JobStore, handlers: Arc<HandlerRegistry>, job: Job) {
    let Job {
        id,
        name,
        invocation,
        attempts,
        ..
    } = job;

    let Some(handler) = handlers.get(&invocation.handler) else {
        warn!(job_id = %id, handler = %invocation.handler, "no handler registered");
        record(&store, &id, Err(format!("unknown handler: {}", invocation.handler)));
        return;
    };

    info!(job_id = %id, %name, handler = %invocation.handler, attempt = attempts, "executing job");

    // Inner task so a panicking handler surfaces as a JoinError instead of
    // unwinding through the worker.
    let args = invocation.args;
    let outcome = match tokio::spawn(async move { handler.handle(args).await }).await {
        Ok(result) => result,
        Err(e) if e.is_panic() => Err("handler panicked".to_string()),
        Err(e) => Err(format!("handler task cancelled: {e}")),
    };

    match &outcome {
        Ok(()) => info!(job_id = %id, %name, "job done"),
        Err(reason) => warn!(job_id = %id, %name, %reason, "job failed"),
    }
    record(&store, &id, outcome);
}

fn record(store: &JobStore, id: &str, outcome: Result<(), String>) {
    let res = match outcome {
        Ok(()) => store.mark_done(id),
        Err(reason) => store.mark_failed(id, &reason),
    };
    if let Err(e) = res {
        error!(job_id = %id, "failed to record job outcome: {e}");
    }
}
