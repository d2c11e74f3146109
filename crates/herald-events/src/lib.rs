//! `herald-events`: event creation with an immediate chat announcement and
//! reminder jobs a day and an hour before the start.

pub mod db;
pub mod error;
pub mod reminders;
pub mod service;
pub mod store;
pub mod types;

pub use error::{EventError, Result};
pub use reminders::{plan_reminders, PlannedReminder, ReminderOffset};
pub use service::EventService;
pub use store::EventStore;
pub use types::{Event, NewEvent};
