//! Per-chat link state machine driven by inbound messages.
//!
//! | State    | Inbound message                     | Effect                       |
//! |----------|-------------------------------------|------------------------------|
//! | (none)   | first contact, anything             | row created, welcome text    |
//! | Unlinked | `/login <email>`, email resolves    | link written, confirmation   |
//! | Unlinked | anything else (or unresolved login) | welcome text, every time     |
//! | Linked   | anything                            | nothing                      |
//!
//! A first contact is then handled as Unlinked, minus a second welcome, so a
//! resolving `/login` as the very first message links the chat right away.

use std::sync::Arc;

use herald_core::{ChatId, UserId};
use herald_protocol::relay::{parse_login, ChatUpdate};
use herald_users::{ChatLinkRegistry, LinkOutcome};
use tracing::{info, instrument, warn};

use crate::chat::ChatApi;
use crate::error::Result;
use crate::resolver::LinkResolver;

pub const LINKED_TEXT: &str =
    "This chat is now linked to your account. Event notifications will arrive here.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundOutcome {
    /// The chat was already linked; the message was ignored.
    AlreadyLinked,
    /// This message completed the link.
    Linked(UserId),
    /// The chat is still unlinked and got the welcome text.
    Welcomed,
}

pub struct RelayBot {
    links: ChatLinkRegistry,
    resolver: Arc<dyn LinkResolver>,
    chat: Arc<dyn ChatApi>,
    welcome_text: String,
}

impl RelayBot {
    pub fn new(
        links: ChatLinkRegistry,
        resolver: Arc<dyn LinkResolver>,
        chat: Arc<dyn ChatApi>,
        welcome_text: String,
    ) -> Self {
        Self {
            links,
            resolver,
            chat,
            welcome_text,
        }
    }

    /// Advance the state machine for one inbound message.
    ///
    /// Only registry failures are returned as errors; reply and resolver
    /// failures are logged.
    #[instrument(skip(self, text, username), fields(chat_id = %chat_id))]
    pub async fn handle_inbound(
        &self,
        chat_id: &ChatId,
        text: &str,
        username: Option<&str>,
    ) -> Result<InboundOutcome> {
        let first_contact = self.links.get(chat_id.as_str())?.is_none();
        let link = self.links.ensure(chat_id.as_str())?;
        if link.is_linked() {
            return Ok(InboundOutcome::AlreadyLinked);
        }

        if first_contact {
            self.reply(chat_id, &self.welcome_text).await;
        }

        if parse_login(text).is_some() {
            if let Some(outcome) = self.try_link(chat_id, text, username).await? {
                return Ok(outcome);
            }
        }

        if !first_contact {
            self.reply(chat_id, &self.welcome_text).await;
        }
        Ok(InboundOutcome::Welcomed)
    }

    /// `Ok(None)` when the login did not resolve and the welcome should follow.
    async fn try_link(
        &self,
        chat_id: &ChatId,
        text: &str,
        username: Option<&str>,
    ) -> Result<Option<InboundOutcome>> {
        let update = ChatUpdate {
            chat_id: chat_id.to_string(),
            text: text.to_string(),
            username: username.map(String::from),
        };
        let user_id = match self.resolver.resolve(&update).await {
            Ok(Some(user_id)) => user_id,
            Ok(None) => {
                info!("login email not recognised");
                return Ok(None);
            }
            Err(e) => {
                warn!(error = %e, "login resolution failed");
                return Ok(None);
            }
        };

        match self.links.link(chat_id.as_str(), user_id.as_str())? {
            LinkOutcome::Linked(_) => {
                info!(%user_id, "chat linked via /login");
                self.reply(chat_id, LINKED_TEXT).await;
                Ok(Some(InboundOutcome::Linked(user_id)))
            }
            // Another message won the race; the chat is linked either way.
            LinkOutcome::AlreadyLinked(_) => Ok(Some(InboundOutcome::AlreadyLinked)),
        }
    }

    async fn reply(&self, chat_id: &ChatId, text: &str) {
        if let Err(e) = self.chat.send_text(chat_id, text).await {
            warn!(%chat_id, error = %e, "reply to chat failed");
        }
    }
}
