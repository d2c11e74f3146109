//! Notification payload: shared between the event service, the scheduler's
//! job arguments and every delivery channel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::UserId;

/// Who a notification is for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "user_id", rename_all = "snake_case")]
pub enum Scope {
    /// Everyone currently reachable on the channel.
    Broadcast,
    /// A single application user.
    User(UserId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// A new event was created.
    Event,
    /// A scheduled reminder before an event starts.
    Reminder,
    /// Free-form announcement pushed by an operator.
    Announcement,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Category::Event => "event",
            Category::Reminder => "reminder",
            Category::Announcement => "announcement",
        };
        write!(f, "{s}")
    }
}

/// The event fields a notification needs; a copy, not a reference to the row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSnapshot {
    pub id: String,
    pub title: String,
    pub description: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub location: String,
    pub is_public: bool,
}

/// Structured data attached to a payload, one variant per known kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum PayloadFields {
    Event(EventSnapshot),
}

/// A notification ready for dispatch.
///
/// Stored verbatim as the `args` of `notify.*` scheduler jobs, so every field
/// must stay serde-compatible across releases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<PayloadFields>,
    pub scope: Scope,
    /// Routing hint for the chat channel (relay endpoint override). `None` uses the
    /// configured relay.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_endpoint: Option<String>,
}

impl NotificationPayload {
    pub fn new(title: impl Into<String>, body: impl Into<String>, category: Category) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            category,
            fields: None,
            scope: Scope::Broadcast,
            chat_endpoint: None,
        }
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_event(mut self, event: EventSnapshot) -> Self {
        self.fields = Some(PayloadFields::Event(event));
        self
    }

    pub fn event(&self) -> Option<&EventSnapshot> {
        match &self.fields {
            Some(PayloadFields::Event(e)) => Some(e),
            None => None,
        }
    }

    /// Plain-text rendering used by the chat channel.
    pub fn render_text(&self) -> String {
        let mut out = format!("{}: {}", self.title, self.body);
        if let Some(event) = self.event() {
            out.push_str(&format!(
                "\nStarts: {}",
                event.start_at.format("%Y-%m-%d %H:%M UTC")
            ));
            if !event.location.is_empty() {
                out.push_str(&format!("\nWhere: {}", event.location));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn snapshot() -> EventSnapshot {
        EventSnapshot {
            id: "ev-1".into(),
            title: "Board meeting".into(),
            description: "Quarterly review".into(),
            start_at: Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap(),
            end_at: Utc.with_ymd_and_hms(2026, 3, 1, 11, 0, 0).unwrap(),
            location: "Room 4".into(),
            is_public: false,
        }
    }

    #[test]
    fn scope_wire_format() {
        let json = serde_json::to_string(&Scope::Broadcast).unwrap();
        assert_eq!(json, r#"{"kind":"broadcast"}"#);

        let json = serde_json::to_string(&Scope::User(UserId::from("u1"))).unwrap();
        assert_eq!(json, r#"{"kind":"user","user_id":"u1"}"#);
    }

    #[test]
    fn payload_survives_job_args_encoding() {
        let payload = NotificationPayload::new("Reminder", "Board meeting", Category::Reminder)
            .with_scope(Scope::User(UserId::from("u1")))
            .with_event(snapshot());
        let value = serde_json::to_value(&payload).unwrap();
        let back: NotificationPayload = serde_json::from_value(value).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn render_text_includes_event_details() {
        let payload = NotificationPayload::new("Reminder", "Board meeting", Category::Reminder)
            .with_event(snapshot());
        let text = payload.render_text();
        assert!(text.starts_with("Reminder: Board meeting"));
        assert!(text.contains("2026-03-01 09:30 UTC"));
        assert!(text.contains("Room 4"));
    }

    #[test]
    fn render_text_plain_announcement() {
        let payload = NotificationPayload::new("Event", "Town hall", Category::Event);
        assert_eq!(payload.render_text(), "Event: Town hall");
    }
}
