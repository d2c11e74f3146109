//! Real-time push hub: the registry of live WebSocket connections.
//!
//! Connections are filed under the user id they authenticated as (one user may
//! have several) and all of them share one broadcast group. Delivery reaches
//! whoever is connected right now; nothing is queued for absent users.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use herald_core::UserId;
use herald_protocol::{frames::EventFrame, methods::EVENT_NOTIFICATION};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info};

const BROADCAST_CAPACITY: usize = 256;
const PER_CONNECTION_CAPACITY: usize = 64;

/// Name reported to clients for the broadcast group.
pub const BROADCAST_GROUP: &str = "broadcast";

/// Receiving ends handed to a WebSocket task on [`PushHub::register`].
pub struct PushSubscription {
    /// Messages addressed to this connection's user.
    pub direct: mpsc::Receiver<String>,
    /// Messages for everyone.
    pub group: broadcast::Receiver<String>,
}

pub struct PushHub {
    users: DashMap<UserId, DashMap<String, mpsc::Sender<String>>>,
    group: broadcast::Sender<String>,
    seq: AtomicU64,
}

impl PushHub {
    pub fn new() -> Self {
        let (group, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            users: DashMap::new(),
            group,
            seq: AtomicU64::new(0),
        }
    }

    /// File `conn_id` under `user_id` and subscribe it to the broadcast group.
    pub fn register(&self, user_id: &UserId, conn_id: &str) -> PushSubscription {
        let (tx, rx) = mpsc::channel(PER_CONNECTION_CAPACITY);
        self.users
            .entry(user_id.clone())
            .or_default()
            .insert(conn_id.to_string(), tx);
        info!(%user_id, conn_id, "push connection registered");
        PushSubscription {
            direct: rx,
            group: self.group.subscribe(),
        }
    }

    pub fn unregister(&self, user_id: &UserId, conn_id: &str) {
        if let Some(conns) = self.users.get(user_id) {
            conns.remove(conn_id);
        }
        self.users.remove_if(user_id, |_, conns| conns.is_empty());
        debug!(%user_id, conn_id, "push connection unregistered");
    }

    /// Deliver `msg` to every live connection of `user_id`.
    ///
    /// Returns the number of connections that accepted it. Connections whose
    /// receiver is gone are pruned; a full buffer drops the message for that
    /// connection only.
    pub fn send_to_user(&self, user_id: &UserId, msg: &str) -> usize {
        let Some(conns) = self.users.get(user_id) else {
            return 0;
        };
        let mut delivered = 0;
        let mut dead = Vec::new();
        for entry in conns.iter() {
            match entry.value().try_send(msg.to_string()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    debug!(%user_id, conn_id = %entry.key(), "push buffer full, message dropped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => dead.push(entry.key().clone()),
            }
        }
        for conn_id in dead {
            conns.remove(&conn_id);
        }
        delivered
    }

    /// Deliver `msg` to every connection. Returns the subscriber count.
    pub fn send_to_group(&self, msg: &str) -> usize {
        self.group.send(msg.to_string()).unwrap_or(0)
    }

    /// Wrap `payload` in a `notification` event frame with the next sequence number.
    pub fn notification_frame(&self, payload: impl Serialize) -> String {
        EventFrame::new(EVENT_NOTIFICATION, payload)
            .with_seq(self.next_seq())
            .into_text()
    }

    /// Monotonically increasing sequence shared by every frame the hub emits.
    pub fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }

    pub fn connection_count(&self) -> usize {
        self.users.iter().map(|conns| conns.len()).sum()
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }
}

impl Default for PushHub {
    fn default() -> Self {
        Self::new()
    }
}
