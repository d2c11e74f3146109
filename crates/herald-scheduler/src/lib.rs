//! `herald-scheduler`: durable one-shot job queue with SQLite persistence
//! and a Tokio worker pool.
//!
//! # Overview
//!
//! A job is an [`Invocation`] (registered handler id + JSON arguments) plus a
//! due time. Jobs are persisted to the `scheduled_jobs` table, so nothing that
//! lives only in memory (closures, connections) can be scheduled.
//!
//! The [`SchedulerEngine`] polls for due jobs, claims them
//! (`pending → executing`), runs each on its own task bounded by a worker
//! semaphore, and records `done` or `failed`.
//!
//! # Delivery guarantee
//!
//! At-least-once. A job left `executing` by a crash is reset to `pending` on
//! the next start and runs again, so handlers must tolerate duplicates.
//! Failed jobs are not retried.
//!
//! | Status      | Meaning                                         |
//! |-------------|-------------------------------------------------|
//! | `pending`   | Waiting for `due_at`                            |
//! | `executing` | Claimed by a worker                             |
//! | `done`      | Handler returned `Ok`                           |
//! | `failed`    | Handler errored/panicked, or no such handler    |

pub mod db;
pub mod engine;
pub mod error;
pub mod handler;
pub mod queue;
pub mod store;
pub mod types;

pub use engine::SchedulerEngine;
pub use error::{Result, SchedulerError};
pub use handler::{HandlerRegistry, JobHandler};
pub use queue::{JobQueue, SchedulerHandle};
pub use store::JobStore;
pub use types::{Invocation, Job, JobStatus};
