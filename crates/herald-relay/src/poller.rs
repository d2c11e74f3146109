//! Telegram long-polling loop.
//!
//! Wraps a teloxide `Dispatcher` and feeds every inbound message into
//! [`RelayBot::handle_inbound`]. No public URL required.

use std::sync::Arc;

use teloxide::prelude::*;
use tracing::{info, warn};

use crate::bot::RelayBot;

/// Drive the long-polling dispatcher for the lifetime of the process.
pub async fn run(bot: Bot, relay: Arc<RelayBot>) {
    info!("Telegram: starting long-polling dispatcher");

    let handler = Update::filter_message().endpoint(handle_message);

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![relay])
        .default_handler(|_upd| async {})
        .build()
        .dispatch()
        .await;

    warn!("Telegram dispatcher stopped");
}

async fn handle_message(msg: Message, relay: Arc<RelayBot>) -> ResponseResult<()> {
    if msg.from.as_ref().map(|u| u.is_bot).unwrap_or(false) {
        return Ok(());
    }

    let chat_id = herald_core::ChatId::from(msg.chat.id.0);
    let text = msg.text().or(msg.caption()).unwrap_or("");
    let username = msg.from.as_ref().and_then(|u| u.username.as_deref());

    // Registry failures are logged; returning them would only make teloxide
    // log the same error again.
    if let Err(e) = relay.handle_inbound(&chat_id, text, username).await {
        warn!(%chat_id, error = %e, "inbound message handling failed");
    }
    Ok(())
}
