use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use herald_core::config::ChatUserScope;
use herald_core::{NotificationPayload, Scope};
use herald_protocol::relay::{ChatTarget, SendMessageRequest};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::error::{NotifyError, Result};
use crate::push::PushHub;
use crate::relay_client::ChatRelay;
use crate::targets::ChatTargetSource;

/// Outcome of one dispatch: how many endpoints took the message.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Delivery over the push and chat channels.
#[async_trait]
pub trait NotificationDispatch: Send + Sync {
    /// Push channel: the broadcast group or one user's live connections.
    async fn dispatch_phone(&self, payload: &NotificationPayload) -> Result<DeliveryReport>;

    /// Chat channel: one relay call per resolved linked chat.
    async fn dispatch_chat(&self, payload: &NotificationPayload) -> Result<DeliveryReport>;

    /// Chat channel, broadcast variant: a single relay call without a chat id.
    async fn announce(&self, payload: &NotificationPayload) -> Result<DeliveryReport>;
}

pub struct Dispatcher {
    hub: Arc<PushHub>,
    relay: Arc<dyn ChatRelay>,
    targets: Arc<dyn ChatTargetSource>,
    user_scope: ChatUserScope,
    request_timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        hub: Arc<PushHub>,
        relay: Arc<dyn ChatRelay>,
        targets: Arc<dyn ChatTargetSource>,
        user_scope: ChatUserScope,
        request_timeout: Duration,
    ) -> Self {
        Self {
            hub,
            relay,
            targets,
            user_scope,
            request_timeout,
        }
    }

    /// Narrow the linked chats to the ones `scope` addresses.
    fn resolve_targets(&self, scope: &Scope, all: Vec<ChatTarget>) -> Vec<ChatTarget> {
        match (scope, self.user_scope) {
            (Scope::Broadcast, _) | (Scope::User(_), ChatUserScope::AllLinked) => all,
            (Scope::User(user_id), ChatUserScope::LinkedUser) => all
                .into_iter()
                .filter(|t| t.user_id.as_deref() == Some(user_id.as_str()))
                .collect(),
        }
    }

    async fn send_one(&self, target: &ChatTarget, text: &str, endpoint: Option<&str>) -> Result<()> {
        let request = SendMessageRequest {
            chat_id: Some(target.chat_id.clone()),
            message: text.to_string(),
        };
        match tokio::time::timeout(
            self.request_timeout,
            self.relay.send_message(&request, endpoint),
        )
        .await
        {
            Ok(res) => res.map(|_| ()),
            Err(_) => Err(NotifyError::Timeout {
                ms: self.request_timeout.as_millis() as u64,
            }),
        }
    }
}

#[async_trait]
impl NotificationDispatch for Dispatcher {
    #[instrument(skip_all, fields(category = %payload.category))]
    async fn dispatch_phone(&self, payload: &NotificationPayload) -> Result<DeliveryReport> {
        let frame = self.hub.notification_frame(payload);
        let delivered = match &payload.scope {
            Scope::Broadcast => self.hub.send_to_group(&frame),
            Scope::User(user_id) => self.hub.send_to_user(user_id, &frame),
        };
        info!(delivered, scope = ?payload.scope, "push notification sent");
        Ok(DeliveryReport {
            delivered,
            failed: 0,
        })
    }

    #[instrument(skip_all, fields(category = %payload.category))]
    async fn dispatch_chat(&self, payload: &NotificationPayload) -> Result<DeliveryReport> {
        let all = self.targets.list_targets().await?;
        let targets = self.resolve_targets(&payload.scope, all);
        if targets.is_empty() {
            info!(scope = ?payload.scope, "no linked chats for notification");
            return Ok(DeliveryReport::default());
        }

        let text = payload.render_text();
        let endpoint = payload.chat_endpoint.as_deref();
        let outcomes = join_all(
            targets
                .iter()
                .map(|target| self.send_one(target, &text, endpoint)),
        )
        .await;

        let mut report = DeliveryReport::default();
        for (target, outcome) in targets.iter().zip(outcomes) {
            match outcome {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(chat_id = %target.chat_id, error = %e, "chat delivery failed");
                }
            }
        }
        info!(
            delivered = report.delivered,
            failed = report.failed,
            "chat notification fan-out complete"
        );
        Ok(report)
    }

    #[instrument(skip_all, fields(category = %payload.category))]
    async fn announce(&self, payload: &NotificationPayload) -> Result<DeliveryReport> {
        let request = SendMessageRequest {
            chat_id: None,
            message: payload.render_text(),
        };
        let resp = tokio::time::timeout(
            self.request_timeout,
            self.relay
                .send_message(&request, payload.chat_endpoint.as_deref()),
        )
        .await
        .map_err(|_| NotifyError::Timeout {
            ms: self.request_timeout.as_millis() as u64,
        })??;
        info!(delivered = resp.delivered, failed = resp.failed, "announcement relayed");
        Ok(DeliveryReport {
            delivered: resp.delivered,
            failed: resp.failed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use herald_core::{Category, UserId};
    use herald_protocol::relay::SendMessageResponse;

    /// Records every request; fails for `fail_chat`, hangs for `slow_chat`.
    #[derive(Default)]
    struct FakeRelay {
        sent: Mutex<Vec<(Option<String>, String, Option<String>)>>,
        fail_chat: Option<String>,
        slow_chat: Option<String>,
    }

    #[async_trait]
    impl ChatRelay for FakeRelay {
        async fn send_message(
            &self,
            request: &SendMessageRequest,
            endpoint: Option<&str>,
        ) -> Result<SendMessageResponse> {
            if request.chat_id.is_some() && request.chat_id == self.slow_chat {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            self.sent.lock().unwrap().push((
                request.chat_id.clone(),
                request.message.clone(),
                endpoint.map(String::from),
            ));
            if request.chat_id.is_some() && request.chat_id == self.fail_chat {
                return Err(NotifyError::Relay {
                    status: 502,
                    message: "chat blocked the bot".into(),
                });
            }
            Ok(SendMessageResponse {
                delivered: if request.chat_id.is_some() { 1 } else { 3 },
                failed: 0,
            })
        }
    }

    struct StaticTargets(Vec<ChatTarget>);

    #[async_trait]
    impl ChatTargetSource for StaticTargets {
        async fn list_targets(&self) -> Result<Vec<ChatTarget>> {
            Ok(self.0.clone())
        }
    }

    fn target(chat: &str, user: &str) -> ChatTarget {
        ChatTarget {
            chat_id: chat.into(),
            user_id: Some(user.into()),
        }
    }

    fn dispatcher(relay: Arc<FakeRelay>, scope: ChatUserScope) -> Dispatcher {
        let targets = StaticTargets(vec![
            target("1", "alice"),
            target("2", "alice"),
            target("3", "bob"),
            target("4", "carol"),
        ]);
        Dispatcher::new(
            Arc::new(PushHub::new()),
            relay,
            Arc::new(targets),
            scope,
            Duration::from_millis(200),
        )
    }

    fn reminder() -> NotificationPayload {
        NotificationPayload::new("Reminder", "Standup", Category::Reminder)
    }

    #[tokio::test]
    async fn one_failing_chat_does_not_stop_the_others() {
        let relay = Arc::new(FakeRelay {
            fail_chat: Some("3".into()),
            ..Default::default()
        });
        let d = dispatcher(relay.clone(), ChatUserScope::LinkedUser);

        let report = d.dispatch_chat(&reminder()).await.unwrap();
        assert_eq!(report, DeliveryReport { delivered: 3, failed: 1 });
        assert_eq!(relay.sent.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn slow_chat_times_out_independently() {
        let relay = Arc::new(FakeRelay {
            slow_chat: Some("2".into()),
            ..Default::default()
        });
        let d = dispatcher(relay, ChatUserScope::LinkedUser);

        let report = d.dispatch_chat(&reminder()).await.unwrap();
        assert_eq!(report, DeliveryReport { delivered: 3, failed: 1 });
    }

    #[tokio::test]
    async fn user_scope_reaches_only_that_users_chats() {
        let relay = Arc::new(FakeRelay::default());
        let d = dispatcher(relay.clone(), ChatUserScope::LinkedUser);
        let payload = reminder().with_scope(Scope::User(UserId::from("alice")));

        let report = d.dispatch_chat(&payload).await.unwrap();
        assert_eq!(report.delivered, 2);
        let mut chats: Vec<_> = relay
            .sent
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(c, _, _)| c.clone())
            .collect();
        chats.sort();
        assert_eq!(chats, ["1", "2"]);
    }

    #[tokio::test]
    async fn legacy_scope_reaches_every_linked_chat() {
        let relay = Arc::new(FakeRelay::default());
        let d = dispatcher(relay, ChatUserScope::AllLinked);
        let payload = reminder().with_scope(Scope::User(UserId::from("alice")));

        let report = d.dispatch_chat(&payload).await.unwrap();
        assert_eq!(report.delivered, 4);
    }

    #[tokio::test]
    async fn chat_endpoint_hint_is_forwarded() {
        let relay = Arc::new(FakeRelay::default());
        let d = dispatcher(relay.clone(), ChatUserScope::LinkedUser);
        let mut payload = reminder().with_scope(Scope::User(UserId::from("bob")));
        payload.chat_endpoint = Some("http://relay-b:9000".into());

        d.dispatch_chat(&payload).await.unwrap();
        let sent = relay.sent.lock().unwrap();
        assert_eq!(sent[0].2.as_deref(), Some("http://relay-b:9000"));
        assert_eq!(sent[0].1, "Reminder: Standup");
    }

    #[tokio::test]
    async fn announce_is_a_single_broadcast_call() {
        let relay = Arc::new(FakeRelay::default());
        let d = dispatcher(relay.clone(), ChatUserScope::LinkedUser);

        let payload = NotificationPayload::new("Event", "Town hall", Category::Event);
        let report = d.announce(&payload).await.unwrap();
        assert_eq!(report.delivered, 3);

        let sent = relay.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, None);
        assert_eq!(sent[0].1, "Event: Town hall");
    }

    #[tokio::test]
    async fn phone_dispatch_follows_scope() {
        let hub = Arc::new(PushHub::new());
        let mut alice = hub.register(&UserId::from("alice"), "c1");
        let mut bob = hub.register(&UserId::from("bob"), "c2");
        let d = Dispatcher::new(
            hub,
            Arc::new(FakeRelay::default()),
            Arc::new(StaticTargets(vec![])),
            ChatUserScope::LinkedUser,
            Duration::from_millis(200),
        );

        let private = reminder().with_scope(Scope::User(UserId::from("alice")));
        assert_eq!(d.dispatch_phone(&private).await.unwrap().delivered, 1);
        let frame: serde_json::Value =
            serde_json::from_str(&alice.direct.recv().await.unwrap()).unwrap();
        assert_eq!(frame["event"], "notification");
        assert_eq!(frame["payload"]["category"], "reminder");
        assert!(bob.direct.try_recv().is_err());

        assert_eq!(d.dispatch_phone(&reminder()).await.unwrap().delivered, 2);
        assert!(bob.group.recv().await.is_ok());
    }
}
