use std::time::Duration;

use async_trait::async_trait;
use herald_protocol::relay::{ChatTarget, ChatsResponse};
use herald_users::ChatLinkRegistry;
use tracing::warn;

use crate::error::{NotifyError, Result};
use crate::relay_client::map_send_error;

/// Where the chat handler learns which chats are linked.
#[async_trait]
pub trait ChatTargetSource: Send + Sync {
    async fn list_targets(&self) -> Result<Vec<ChatTarget>>;
}

/// Reads the link registry directly (main app and relay share the database file).
pub struct LocalChatTargets {
    links: ChatLinkRegistry,
}

impl LocalChatTargets {
    pub fn new(links: ChatLinkRegistry) -> Self {
        Self { links }
    }
}

#[async_trait]
impl ChatTargetSource for LocalChatTargets {
    async fn list_targets(&self) -> Result<Vec<ChatTarget>> {
        let targets = self
            .links
            .list_linked()?
            .into_iter()
            .map(|link| ChatTarget {
                chat_id: link.chat_id,
                user_id: link.user_id,
            })
            .collect();
        Ok(targets)
    }
}

/// Asks the relay: `GET {relay}/chats`.
pub struct HttpChatTargets {
    client: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
}

impl HttpChatTargets {
    pub fn new(base_url: &str, api_token: Option<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
        })
    }
}

#[async_trait]
impl ChatTargetSource for HttpChatTargets {
    async fn list_targets(&self) -> Result<Vec<ChatTarget>> {
        let url = format!("{}/chats", self.base_url);
        let mut req = self.client.get(&url);
        if let Some(token) = &self.api_token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await.map_err(map_send_error)?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %text, "relay rejected chat listing");
            return Err(NotifyError::Relay {
                status: status.as_u16(),
                message: text,
            });
        }
        let body: ChatsResponse = resp.json().await?;
        Ok(body.chats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use axum::{routing::get, Json, Router};
    use rusqlite::Connection;

    #[tokio::test]
    async fn local_targets_are_linked_chats_only() {
        let conn = Arc::new(Mutex::new(Connection::open_in_memory().unwrap()));
        let links = ChatLinkRegistry::new(conn).unwrap();
        links.link("100", "u1").unwrap();
        links.link("200", "u2").unwrap();
        links.ensure("300").unwrap();

        let targets = LocalChatTargets::new(links).list_targets().await.unwrap();
        let ids: Vec<_> = targets.iter().map(|t| t.chat_id.as_str()).collect();
        assert_eq!(ids, ["100", "200"]);
        assert_eq!(targets[1].user_id.as_deref(), Some("u2"));
    }

    #[tokio::test]
    async fn http_targets_read_relay_listing() {
        let router = Router::new().route(
            "/chats",
            get(|| async {
                Json(ChatsResponse {
                    chats: vec![ChatTarget {
                        chat_id: "7".into(),
                        user_id: Some("u7".into()),
                    }],
                })
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let source =
            HttpChatTargets::new(&format!("http://{addr}/"), None, Duration::from_secs(5)).unwrap();
        let targets = source.list_targets().await.unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].chat_id, "7");
    }
}
