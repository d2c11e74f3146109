use serde::{Deserialize, Serialize};

/// Application user as far as notifications are concerned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// UUIDv7: time-sortable, useful for log correlation across processes.
    pub id: String,
    /// Stored lower-cased; lookups are case-insensitive.
    pub email: String,
    pub display_name: String,
    pub created_at: String,
}

/// Association between a chat on the bot platform and an application user.
///
/// `user_id == None` means the chat has talked to the bot but has not logged in yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatLink {
    pub chat_id: String,
    pub user_id: Option<String>,
    pub created_at: String,
    pub linked_at: Option<String>,
}

impl ChatLink {
    pub fn is_linked(&self) -> bool {
        self.user_id.is_some()
    }
}
