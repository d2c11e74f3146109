//! Telegram Bot API adapter for [`ChatApi`].
//!
//! Telegram caps a message at 4096 characters; notifications are split at
//! 4090. Each part is sent as MarkdownV2 first and re-sent as plain text if
//! Telegram rejects the markup.

use std::time::Duration;

use async_trait::async_trait;
use herald_core::ChatId;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use tracing::{debug, warn};

use crate::chat::ChatApi;
use crate::error::{RelayError, Result};

const PART_MAX: usize = 4090;
/// Pause between parts of one long message, to stay clear of flood limits.
const PART_GAP: Duration = Duration::from_millis(100);

pub struct TelegramChatApi {
    bot: Bot,
}

impl TelegramChatApi {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    async fn send_part(&self, chat: teloxide::types::ChatId, part: &str) -> Result<()> {
        let formatted = self
            .bot
            .send_message(chat, escape_markdown(part))
            .parse_mode(ParseMode::MarkdownV2)
            .await;
        if let Err(e) = formatted {
            debug!(chat_id = chat.0, error = %e, "MarkdownV2 rejected, sending plain text");
            self.bot.send_message(chat, part).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ChatApi for TelegramChatApi {
    async fn send_text(&self, chat_id: &ChatId, text: &str) -> Result<()> {
        let chat = chat_id
            .as_i64()
            .map(teloxide::types::ChatId)
            .ok_or_else(|| RelayError::InvalidChatId(chat_id.to_string()))?;

        let parts = split_message(text);
        let last = parts.len().saturating_sub(1);
        for (i, part) in parts.iter().enumerate() {
            if let Err(e) = self.send_part(chat, part).await {
                warn!(%chat_id, part = i, error = %e, "Telegram send failed");
                return Err(e);
            }
            if i < last {
                tokio::time::sleep(PART_GAP).await;
            }
        }
        Ok(())
    }
}

/// Split `text` into parts of at most [`PART_MAX`] bytes.
///
/// Breaks on line boundaries where possible. A code fence that is open at a
/// break is closed at the end of the part and reopened (same language tag)
/// at the start of the next.
pub fn split_message(text: &str) -> Vec<String> {
    if text.len() <= PART_MAX {
        return vec![text.to_string()];
    }

    let mut parts = Vec::new();
    let mut current = String::new();
    let mut open_fence: Option<String> = None;

    for line in text.split('\n') {
        let needed = if current.is_empty() { line.len() } else { line.len() + 1 };
        if !current.is_empty() && current.len() + needed > PART_MAX {
            if open_fence.is_some() {
                current.push_str("\n```");
            }
            parts.push(std::mem::take(&mut current));
            if let Some(lang) = &open_fence {
                current.push_str("```");
                current.push_str(lang);
            }
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line);

        if let Some(tag) = line.trim_start().strip_prefix("```") {
            open_fence = match open_fence {
                Some(_) => None,
                None => Some(tag.trim().to_string()),
            };
        }
    }
    if !current.is_empty() {
        parts.push(current);
    }

    parts.into_iter().flat_map(hard_split).collect()
}

/// Last resort for a single line longer than a part: break at the last
/// newline or space before the limit, else mid-word.
fn hard_split(part: String) -> Vec<String> {
    if part.len() <= PART_MAX {
        return vec![part];
    }
    let mut out = Vec::new();
    let mut rest = part.as_str();
    while rest.len() > PART_MAX {
        let mut limit = PART_MAX;
        while !rest.is_char_boundary(limit) {
            limit -= 1;
        }
        let head = &rest[..limit];
        let at = head
            .rfind('\n')
            .or_else(|| head.rfind(' '))
            .filter(|&i| i > 0)
            .unwrap_or(limit);
        out.push(rest[..at].to_string());
        rest = rest[at..].trim_start();
    }
    if !rest.is_empty() {
        out.push(rest.to_string());
    }
    out
}

/// Backslash-escape every character MarkdownV2 treats as markup.
pub fn escape_markdown(text: &str) -> String {
    const SPECIAL: &[char] = &[
        '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
    ];
    let mut out = String::with_capacity(text.len() + 16);
    for ch in text.chars() {
        if SPECIAL.contains(&ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_message_is_one_part() {
        assert_eq!(split_message("Reminder: Standup"), ["Reminder: Standup"]);
        assert_eq!(split_message(&"a".repeat(PART_MAX)).len(), 1);
    }

    #[test]
    fn long_message_breaks_on_lines() {
        let line = "b".repeat(1500);
        let text = vec![line.as_str(); 5].join("\n");
        let parts = split_message(&text);
        assert_eq!(parts.len(), 3);
        assert!(parts.iter().all(|p| p.len() <= PART_MAX));
        assert!(parts.iter().all(|p| !p.starts_with('\n')));
    }

    #[test]
    fn oversized_line_is_force_split() {
        let parts = split_message(&"x".repeat(9000));
        assert_eq!(parts.len(), 3);
        assert!(parts.iter().all(|p| p.len() <= PART_MAX));
    }

    #[test]
    fn multibyte_text_splits_on_char_boundaries() {
        let parts = split_message(&"é".repeat(5000));
        assert!(parts.len() >= 2);
        assert!(parts.iter().all(|p| p.len() <= PART_MAX));
    }

    #[test]
    fn open_fence_is_carried_into_next_part() {
        let mut text = String::from("Agenda\n```text\n");
        for i in 0..150 {
            text.push_str(&format!("{i:04} item with a reasonably long description\n"));
        }
        text.push_str("```\nSee you there.");

        let parts = split_message(&text);
        assert!(parts.len() >= 2);
        assert!(parts[0].ends_with("```"));
        assert!(parts[1].starts_with("```text\n"));
    }

    #[test]
    fn escaping_covers_markup_characters() {
        assert_eq!(escape_markdown("Starts: 09:30 (Room 4)."), "Starts: 09:30 \\(Room 4\\)\\.");
        assert_eq!(escape_markdown("plain words 123"), "plain words 123");
    }
}
