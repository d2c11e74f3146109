//! `herald-notify`: delivers [`NotificationPayload`](herald_core::NotificationPayload)s
//! over the two channels: the in-process push hub and the chat relay.
//!
//! [`Dispatcher`] is the one implementation of [`NotificationDispatch`]; the
//! scheduler reaches it through the `notify.phone` / `notify.chat` job
//! handlers in [`handlers`].

pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod push;
pub mod relay_client;
pub mod targets;

pub use dispatch::{DeliveryReport, Dispatcher, NotificationDispatch};
pub use error::{NotifyError, Result};
pub use handlers::{register_handlers, CHAT_HANDLER, PHONE_HANDLER};
pub use push::{PushHub, PushSubscription};
pub use relay_client::{ChatRelay, HttpChatRelay};
pub use targets::{ChatTargetSource, HttpChatTargets, LocalChatTargets};
