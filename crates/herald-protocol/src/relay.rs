//! JSON bodies exchanged between the main application and the chat relay.
//!
//! Field names are camelCase on the wire (`chatId`, `userId`, `chatUpdate`).

use serde::{Deserialize, Serialize};

/// `POST {relay}/send-message`. Without `chat_id` the relay broadcasts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
    pub message: String,
}

/// Relay reply to `/send-message`: how many chats accepted the text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessageResponse {
    pub delivered: usize,
    pub failed: usize,
}

/// One linked chat as listed by `GET {relay}/chats`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTarget {
    pub chat_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatsResponse {
    pub chats: Vec<ChatTarget>,
}

/// `POST {main}/internal/post-message`: an inbound chat message the relay
/// could not handle by itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostMessageRequest {
    pub chat_update: ChatUpdate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatUpdate {
    pub chat_id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// Main application's verdict on a `/login` attempt. `user_id` is set only
/// when the email resolved to a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostMessageResponse {
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Extract the email from a `/login <email>` command, if `text` is one.
///
/// Accepts the `/login@BotName` form Telegram produces in groups.
pub fn parse_login(text: &str) -> Option<&str> {
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let command = parts.next()?;
    let command = command.split('@').next().unwrap_or(command);
    if !command.eq_ignore_ascii_case("/login") {
        return None;
    }
    let email = parts.next()?.trim();
    (!email.is_empty()).then_some(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_command_parsing() {
        assert_eq!(parse_login("/login a@b.io"), Some("a@b.io"));
        assert_eq!(parse_login("  /LOGIN   a@b.io  "), Some("a@b.io"));
        assert_eq!(parse_login("/login@HeraldBot a@b.io"), Some("a@b.io"));
        assert_eq!(parse_login("/login"), None);
        assert_eq!(parse_login("/start"), None);
        assert_eq!(parse_login("hello /login a@b.io"), None);
    }
}
