//! `herald-relay`: the chat relay process.
//!
//! Owns the Telegram bot: receives inbound messages by long polling (linking
//! chats to users through `/login <email>`), and exposes a small HTTP API the
//! main application uses to send notifications to linked chats.

pub mod bot;
pub mod chat;
pub mod error;
pub mod poller;
pub mod resolver;
pub mod server;
pub mod telegram;

pub use bot::{InboundOutcome, RelayBot};
pub use chat::ChatApi;
pub use error::{RelayError, Result};
pub use resolver::{LinkResolver, MainAppClient};
pub use server::{build_router, RelayState};
pub use telegram::TelegramChatApi;
