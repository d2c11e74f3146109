//! Scheduler job handlers that turn a stored payload into a dispatch call.
//!
//! Both handlers are safe to run twice with the same arguments: the
//! scheduler is at-least-once and a duplicate just delivers again.

use std::sync::Arc;

use async_trait::async_trait;
use herald_core::NotificationPayload;
use herald_scheduler::{HandlerRegistry, JobHandler};
use tracing::warn;

use crate::dispatch::NotificationDispatch;

pub const PHONE_HANDLER: &str = "notify.phone";
pub const CHAT_HANDLER: &str = "notify.chat";

/// Register `notify.phone` and `notify.chat` against `dispatch`.
pub fn register_handlers(registry: &mut HandlerRegistry, dispatch: Arc<dyn NotificationDispatch>) {
    registry.register(
        PHONE_HANDLER,
        Arc::new(PhoneHandler {
            dispatch: dispatch.clone(),
        }),
    );
    registry.register(CHAT_HANDLER, Arc::new(ChatHandler { dispatch }));
}

fn decode(args: serde_json::Value) -> Result<NotificationPayload, String> {
    serde_json::from_value(args).map_err(|e| format!("invalid notification payload: {e}"))
}

struct PhoneHandler {
    dispatch: Arc<dyn NotificationDispatch>,
}

#[async_trait]
impl JobHandler for PhoneHandler {
    async fn handle(&self, args: serde_json::Value) -> Result<(), String> {
        let payload = decode(args)?;
        self.dispatch
            .dispatch_phone(&payload)
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

struct ChatHandler {
    dispatch: Arc<dyn NotificationDispatch>,
}

#[async_trait]
impl JobHandler for ChatHandler {
    async fn handle(&self, args: serde_json::Value) -> Result<(), String> {
        let payload = decode(args)?;
        let report = self
            .dispatch
            .dispatch_chat(&payload)
            .await
            .map_err(|e| e.to_string())?;
        // Per-recipient failures were already logged; the job itself succeeded.
        if report.failed > 0 {
            warn!(failed = report.failed, delivered = report.delivered, "chat reminder partially delivered");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use herald_core::Category;

    use crate::dispatch::DeliveryReport;
    use crate::error::{NotifyError, Result};

    #[derive(Default)]
    struct CountingDispatch {
        phone: AtomicUsize,
        chat: AtomicUsize,
    }

    #[async_trait]
    impl NotificationDispatch for CountingDispatch {
        async fn dispatch_phone(&self, _p: &NotificationPayload) -> Result<DeliveryReport> {
            self.phone.fetch_add(1, Ordering::SeqCst);
            Ok(DeliveryReport::default())
        }
        async fn dispatch_chat(&self, _p: &NotificationPayload) -> Result<DeliveryReport> {
            self.chat.fetch_add(1, Ordering::SeqCst);
            Ok(DeliveryReport {
                delivered: 1,
                failed: 1,
            })
        }
        async fn announce(&self, _p: &NotificationPayload) -> Result<DeliveryReport> {
            Err(NotifyError::Timeout { ms: 1 })
        }
    }

    fn registry(dispatch: Arc<CountingDispatch>) -> HandlerRegistry {
        let mut registry = HandlerRegistry::new();
        register_handlers(&mut registry, dispatch);
        registry
    }

    fn args() -> serde_json::Value {
        serde_json::to_value(NotificationPayload::new("Reminder", "Standup", Category::Reminder))
            .unwrap()
    }

    #[tokio::test]
    async fn running_the_same_job_twice_is_fine() {
        let dispatch = Arc::new(CountingDispatch::default());
        let registry = registry(dispatch.clone());

        for _ in 0..2 {
            registry.get(PHONE_HANDLER).unwrap().handle(args()).await.unwrap();
            registry.get(CHAT_HANDLER).unwrap().handle(args()).await.unwrap();
        }
        assert_eq!(dispatch.phone.load(Ordering::SeqCst), 2);
        assert_eq!(dispatch.chat.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn garbage_args_fail_the_job() {
        let registry = registry(Arc::new(CountingDispatch::default()));
        let err = registry
            .get(CHAT_HANDLER)
            .unwrap()
            .handle(serde_json::json!({"nope": true}))
            .await
            .unwrap_err();
        assert!(err.contains("invalid notification payload"));
    }
}
