use async_trait::async_trait;
use herald_core::ChatId;

use crate::error::Result;

/// Outbound text to one chat on the platform.
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn send_text(&self, chat_id: &ChatId, text: &str) -> Result<()>;
}
