use chrono::{DateTime, Utc};
use herald_core::{EventSnapshot, UserId};
use serde::{Deserialize, Serialize};

/// A persisted calendar event. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// UUID v7 string.
    pub id: String,
    pub title: String,
    pub description: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub location: String,
    pub is_public: bool,
    pub organizer_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

impl Event {
    /// Copy of the fields carried inside notification payloads.
    pub fn snapshot(&self) -> EventSnapshot {
        EventSnapshot {
            id: self.id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            start_at: self.start_at,
            end_at: self.end_at,
            location: self.location.clone(),
            is_public: self.is_public,
        }
    }
}

/// Input to [`EventService::create_event`](crate::EventService::create_event).
#[derive(Debug, Clone, Deserialize)]
pub struct NewEvent {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    #[serde(default)]
    pub location: String,
    #[serde(default = "default_public")]
    pub is_public: bool,
    #[serde(default)]
    pub organizer_id: Option<UserId>,
}

fn default_public() -> bool {
    true
}
