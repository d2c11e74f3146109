use chrono::{DateTime, Duration, Utc};
use herald_notify::{CHAT_HANDLER, PHONE_HANDLER};

use crate::types::Event;

/// How long before the start a reminder fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderOffset {
    DayBefore,
    HourBefore,
}

impl ReminderOffset {
    pub const ALL: [ReminderOffset; 2] = [ReminderOffset::DayBefore, ReminderOffset::HourBefore];

    pub fn lead(&self) -> Duration {
        match self {
            ReminderOffset::DayBefore => Duration::days(1),
            ReminderOffset::HourBefore => Duration::hours(1),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderOffset::DayBefore => "day-before",
            ReminderOffset::HourBefore => "hour-before",
        }
    }
}

/// Job handlers each reminder offset is scheduled on.
const CHANNELS: [&str; 2] = [PHONE_HANDLER, CHAT_HANDLER];

/// One reminder job to enqueue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedReminder {
    pub offset: ReminderOffset,
    pub handler: &'static str,
    pub due_at: DateTime<Utc>,
}

impl PlannedReminder {
    /// Job name, used only for logs and inspection.
    pub fn job_name(&self, event_id: &str) -> String {
        format!("reminder:{event_id}:{}:{}", self.offset.as_str(), self.handler)
    }
}

/// Decide which reminder jobs `event` gets when created at `now`.
///
/// Every offset yields one job per channel. An offset whose due time is at or
/// before `now` is dropped entirely: late reminders are never sent. So is an
/// offset that falls outside the representable date range.
pub fn plan_reminders(event: &Event, now: DateTime<Utc>) -> Vec<PlannedReminder> {
    ReminderOffset::ALL
        .iter()
        .filter_map(|offset| Some((*offset, event.start_at.checked_sub_signed(offset.lead())?)))
        .filter(|(_, due_at)| *due_at > now)
        .flat_map(|(offset, due_at)| {
            CHANNELS.into_iter().map(move |handler| PlannedReminder {
                offset,
                handler,
                due_at,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()
    }

    fn starting_in(lead: Duration) -> Event {
        let start = now() + lead;
        Event {
            id: "ev".into(),
            title: "Offsite".into(),
            description: String::new(),
            start_at: start,
            end_at: start + Duration::hours(2),
            location: String::new(),
            is_public: true,
            organizer_id: None,
            created_at: now(),
        }
    }

    #[test]
    fn more_than_a_day_away_gets_four_jobs() {
        let plan = plan_reminders(&starting_in(Duration::days(3)), now());
        assert_eq!(plan.len(), 4);
        let day = now() + Duration::days(2);
        let hour = now() + Duration::days(3) - Duration::hours(1);
        assert_eq!(plan.iter().filter(|p| p.due_at == day).count(), 2);
        assert_eq!(plan.iter().filter(|p| p.due_at == hour).count(), 2);
        for due in [day, hour] {
            let handlers: Vec<_> = plan
                .iter()
                .filter(|p| p.due_at == due)
                .map(|p| p.handler)
                .collect();
            assert_eq!(handlers, [PHONE_HANDLER, CHAT_HANDLER]);
        }
    }

    #[test]
    fn between_an_hour_and_a_day_gets_hour_before_only() {
        let plan = plan_reminders(&starting_in(Duration::hours(5)), now());
        assert_eq!(plan.len(), 2);
        assert!(plan.iter().all(|p| p.offset == ReminderOffset::HourBefore));
        assert!(plan.iter().all(|p| p.due_at == now() + Duration::hours(4)));
    }

    #[test]
    fn start_at_the_minimum_date_does_not_overflow() {
        let start: DateTime<Utc> = serde_json::from_str("\"-262143-01-01T00:30:00Z\"").unwrap();
        let mut event = starting_in(Duration::days(3));
        event.start_at = start;
        event.end_at = start + Duration::hours(1);
        assert!(plan_reminders(&event, now()).is_empty());
    }

    #[test]
    fn under_an_hour_away_gets_nothing() {
        assert!(plan_reminders(&starting_in(Duration::minutes(30)), now()).is_empty());
    }

    #[test]
    fn past_event_gets_nothing() {
        assert!(plan_reminders(&starting_in(Duration::days(-1)), now()).is_empty());
    }

    #[test]
    fn due_exactly_now_is_skipped() {
        // Day-before lands exactly on `now`; only hour-before survives.
        let plan = plan_reminders(&starting_in(Duration::days(1)), now());
        assert_eq!(plan.len(), 2);
        assert!(plan.iter().all(|p| p.offset == ReminderOffset::HourBefore));
    }

    #[test]
    fn job_names_identify_event_offset_and_channel() {
        let plan = plan_reminders(&starting_in(Duration::days(3)), now());
        assert_eq!(plan[0].job_name("ev"), "reminder:ev:day-before:notify.phone");
    }
}
