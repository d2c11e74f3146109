//! `herald-core`: types shared by the main application and the chat relay.

pub mod clock;
pub mod config;
pub mod error;
pub mod notification;
pub mod types;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{HeraldError, Result};
pub use notification::{Category, EventSnapshot, NotificationPayload, PayloadFields, Scope};
pub use types::{ChatId, UserId};
