use std::time::Duration;

use async_trait::async_trait;
use herald_protocol::relay::{SendMessageRequest, SendMessageResponse};
use tracing::{debug, warn};

use crate::error::{NotifyError, Result};

/// Outbound side of the chat relay as the main application sees it.
#[async_trait]
pub trait ChatRelay: Send + Sync {
    /// `POST /send-message`. `endpoint` overrides the configured relay base URL
    /// (the payload's `chat_endpoint` routing hint).
    async fn send_message(
        &self,
        request: &SendMessageRequest,
        endpoint: Option<&str>,
    ) -> Result<SendMessageResponse>;
}

/// [`ChatRelay`] over HTTP with an optional bearer token.
#[derive(Clone)]
pub struct HttpChatRelay {
    client: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
}

impl HttpChatRelay {
    pub fn new(base_url: &str, api_token: Option<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
        })
    }
}

#[async_trait]
impl ChatRelay for HttpChatRelay {
    async fn send_message(
        &self,
        request: &SendMessageRequest,
        endpoint: Option<&str>,
    ) -> Result<SendMessageResponse> {
        let base = endpoint
            .map(|e| e.trim_end_matches('/'))
            .unwrap_or(&self.base_url);
        let url = format!("{base}/send-message");
        debug!(%url, chat_id = ?request.chat_id, "relay send-message");

        let mut req = self.client.post(&url).json(request);
        if let Some(token) = &self.api_token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await.map_err(map_send_error)?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %text, "relay rejected send-message");
            return Err(NotifyError::Relay {
                status: status.as_u16(),
                message: text,
            });
        }
        Ok(resp.json().await?)
    }
}

/// Connection and timeout failures mean the relay is down, not that it refused.
pub(crate) fn map_send_error(e: reqwest::Error) -> NotifyError {
    if e.is_connect() || e.is_timeout() {
        NotifyError::Unavailable(e.to_string())
    } else {
        NotifyError::Http(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::HeaderMap, routing::post, Json, Router};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn posts_camel_case_body_with_bearer_token() {
        let router = Router::new().route(
            "/send-message",
            post(
                |headers: HeaderMap, Json(body): Json<serde_json::Value>| async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    assert_eq!(auth, "Bearer s3cret");
                    assert_eq!(body["chatId"], "42");
                    assert_eq!(body["message"], "hello");
                    Json(SendMessageResponse {
                        delivered: 1,
                        failed: 0,
                    })
                },
            ),
        );
        let base = serve(router).await;
        let relay =
            HttpChatRelay::new(&base, Some("s3cret".into()), Duration::from_secs(5)).unwrap();

        let resp = relay
            .send_message(
                &SendMessageRequest {
                    chat_id: Some("42".into()),
                    message: "hello".into(),
                },
                None,
            )
            .await
            .unwrap();
        assert_eq!(resp.delivered, 1);
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let router = Router::new().route(
            "/send-message",
            post(|| async { (axum::http::StatusCode::BAD_GATEWAY, "telegram down") }),
        );
        let base = serve(router).await;
        let relay = HttpChatRelay::new("http://unused.invalid", None, Duration::from_secs(5)).unwrap();

        // Routed through the per-payload endpoint override.
        let err = relay
            .send_message(
                &SendMessageRequest {
                    chat_id: None,
                    message: "x".into(),
                },
                Some(&base),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, NotifyError::Relay { status: 502, .. }));
    }
}
