use std::time::Duration;

use async_trait::async_trait;
use herald_core::UserId;
use herald_protocol::relay::{ChatUpdate, PostMessageRequest, PostMessageResponse};
use tracing::{debug, warn};

use crate::error::{RelayError, Result};

/// Asks the main application which user a `/login` message belongs to.
#[async_trait]
pub trait LinkResolver: Send + Sync {
    /// `Ok(None)` means the main application did not recognise the email.
    async fn resolve(&self, update: &ChatUpdate) -> Result<Option<UserId>>;
}

/// [`LinkResolver`] backed by `POST {main}/internal/post-message`.
pub struct MainAppClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl MainAppClient {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }
}

#[async_trait]
impl LinkResolver for MainAppClient {
    async fn resolve(&self, update: &ChatUpdate) -> Result<Option<UserId>> {
        let url = format!("{}/internal/post-message", self.base_url);
        debug!(chat_id = %update.chat_id, "forwarding login to main application");

        let body = PostMessageRequest {
            chat_update: update.clone(),
        };
        let mut req = self.client.post(&url).json(&body);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %text, "main application rejected post-message");
            return Err(RelayError::MainApp {
                status: status.as_u16(),
                message: text,
            });
        }
        let verdict: PostMessageResponse = resp.json().await?;
        Ok(verdict.user_id.map(UserId::from))
    }
}
