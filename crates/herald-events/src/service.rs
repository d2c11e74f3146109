use std::sync::Arc;
use std::time::Duration;

use herald_core::{Category, Clock, NotificationPayload, Scope};
use herald_notify::NotificationDispatch;
use herald_scheduler::{Invocation, JobQueue};
use herald_users::UserDirectory;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::{EventError, Result};
use crate::reminders::plan_reminders;
use crate::store::EventStore;
use crate::types::{Event, NewEvent};

/// Creates events and wires up their notifications.
///
/// Everything past the insert (announcement, reminder jobs) is best-effort: a
/// failure there is logged and the created event is still returned.
pub struct EventService {
    store: EventStore,
    users: UserDirectory,
    dispatch: Arc<dyn NotificationDispatch>,
    jobs: Arc<dyn JobQueue>,
    clock: Arc<dyn Clock>,
    announce_timeout: Duration,
}

impl EventService {
    pub fn new(
        store: EventStore,
        users: UserDirectory,
        dispatch: Arc<dyn NotificationDispatch>,
        jobs: Arc<dyn JobQueue>,
        clock: Arc<dyn Clock>,
        announce_timeout: Duration,
    ) -> Self {
        Self {
            store,
            users,
            dispatch,
            jobs,
            clock,
            announce_timeout,
        }
    }

    #[instrument(skip_all, fields(title = %input.title))]
    pub async fn create_event(&self, input: NewEvent) -> Result<Event> {
        self.validate(&input)?;

        let event = Event {
            id: Uuid::now_v7().to_string(),
            title: input.title.trim().to_string(),
            description: input.description,
            start_at: input.start_at,
            end_at: input.end_at,
            location: input.location,
            is_public: input.is_public,
            organizer_id: input.organizer_id,
            created_at: self.clock.now(),
        };
        self.store.insert(&event)?;
        info!(event_id = %event.id, start_at = %event.start_at, public = event.is_public, "event created");

        self.announce(&event).await;
        self.schedule_reminders(&event);
        Ok(event)
    }

    pub fn get_event(&self, id: &str) -> Result<Event> {
        self.store
            .get(id)?
            .ok_or_else(|| EventError::NotFound(id.to_string()))
    }

    pub fn list_events(&self) -> Result<Vec<Event>> {
        self.store.list()
    }

    /// Remove the event row. Reminder jobs already scheduled for it stay
    /// pending and still fire.
    #[instrument(skip(self))]
    pub fn delete_event(&self, id: &str) -> Result<()> {
        if !self.store.delete(id)? {
            return Err(EventError::NotFound(id.to_string()));
        }
        warn!(event_id = %id, "event deleted; its scheduled reminders are not cancelled");
        Ok(())
    }

    fn validate(&self, input: &NewEvent) -> Result<()> {
        if input.title.trim().is_empty() {
            return Err(EventError::Validation("title must not be empty".into()));
        }
        if input.start_at >= input.end_at {
            return Err(EventError::Validation("start_at must be before end_at".into()));
        }
        if !input.is_public {
            let Some(organizer) = &input.organizer_id else {
                return Err(EventError::Validation(
                    "a private event needs an organizer".into(),
                ));
            };
            if !self.users.exists(organizer.as_str())? {
                return Err(EventError::OrganizerNotFound(organizer.to_string()));
            }
        }
        Ok(())
    }

    /// Single broadcast relay call, bounded by `announce_timeout`. The outcome
    /// never affects creation.
    async fn announce(&self, event: &Event) {
        let payload = NotificationPayload::new("Event", event.title.clone(), Category::Event);
        match tokio::time::timeout(self.announce_timeout, self.dispatch.announce(&payload)).await {
            Ok(Ok(report)) => {
                info!(event_id = %event.id, delivered = report.delivered, "event announced")
            }
            Ok(Err(e)) => warn!(event_id = %event.id, error = %e, "event announcement failed"),
            Err(_) => warn!(
                event_id = %event.id,
                timeout_ms = self.announce_timeout.as_millis() as u64,
                "event announcement timed out"
            ),
        }
    }

    fn schedule_reminders(&self, event: &Event) {
        let plan = plan_reminders(event, self.clock.now());
        if plan.is_empty() {
            info!(event_id = %event.id, "no reminders: every offset is already past");
            return;
        }

        let scope = match (&event.organizer_id, event.is_public) {
            (Some(organizer), false) => Scope::User(organizer.clone()),
            _ => Scope::Broadcast,
        };
        let payload = NotificationPayload::new("Reminder", event.title.clone(), Category::Reminder)
            .with_scope(scope)
            .with_event(event.snapshot());
        let args = match serde_json::to_value(&payload) {
            Ok(args) => args,
            Err(e) => {
                warn!(event_id = %event.id, error = %e, "reminder payload not serializable");
                return;
            }
        };

        for reminder in plan {
            let name = reminder.job_name(&event.id);
            let invocation = Invocation::new(reminder.handler, args.clone());
            if let Err(e) = self.jobs.enqueue_at(&name, invocation, reminder.due_at) {
                warn!(event_id = %event.id, job = %name, error = %e, "failed to schedule reminder");
            }
        }
    }
}
