use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::HeraldError;

pub const DEFAULT_PORT: u16 = 18790;
pub const DEFAULT_RELAY_PORT: u16 = 18791;
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const MAX_PAYLOAD_BYTES: usize = 64 * 1024; // hard cap per inbound WS frame
pub const HANDSHAKE_TIMEOUT_MS: u64 = 10_000; // close if client doesn't connect in 10s
pub const HEARTBEAT_INTERVAL_SECS: u64 = 30; // tick event cadence
pub const PROTOCOL_VERSION: u32 = 1;

/// Top-level config (herald.toml + HERALD_* env overrides).
///
/// Both binaries load the same file: the gateway reads everything except
/// `relay`, the relay reads `relay` only.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HeraldConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub relay_client: RelayClientConfig,
    #[serde(default)]
    pub relay: RelayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Shared secret for `/internal/*` routes and WS connect. `None` disables the check.
    #[serde(default)]
    pub internal_token: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
            internal_token: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Number of jobs allowed to execute concurrently.
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Upper bound for the immediate chat announcement on event creation.
    #[serde(default = "default_announce_timeout_ms")]
    pub announce_timeout_ms: u64,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            announce_timeout_ms: default_announce_timeout_ms(),
        }
    }
}

/// Where the chat handler gets its list of linked chats from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ChatTargetSourceKind {
    /// `GET {relay}/chats`
    #[default]
    Http,
    /// Read the relay's link table directly (`notify.links_db_path`).
    Local,
}

/// How a `User(id)` scope resolves on the chat channel.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ChatUserScope {
    /// Only chats linked to that user.
    #[default]
    LinkedUser,
    /// Every linked chat, regardless of owner (legacy behaviour).
    AllLinked,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub chat_targets: ChatTargetSourceKind,
    #[serde(default)]
    pub chat_user_scope: ChatUserScope,
    /// SQLite file holding `chat_links`; required when `chat_targets = "local"`.
    #[serde(default)]
    pub links_db_path: Option<String>,
    /// Per-recipient timeout for relay calls.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            chat_targets: ChatTargetSourceKind::default(),
            chat_user_scope: ChatUserScope::default(),
            links_db_path: None,
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// How the main application reaches the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayClientConfig {
    #[serde(default = "default_relay_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_token: Option<String>,
}

impl Default for RelayClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_relay_base_url(),
            api_token: None,
        }
    }
}

/// Chat relay process settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_relay_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_relay_db_path")]
    pub database_path: String,
    /// Bearer token required on `/send-message` and `/chats`.
    #[serde(default)]
    pub api_token: Option<String>,
    /// Base URL of the main application (for `/internal/post-message`).
    #[serde(default = "default_main_base_url")]
    pub main_base_url: String,
    #[serde(default)]
    pub main_token: Option<String>,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub telegram: Option<TelegramConfig>,
    #[serde(default = "default_welcome_text")]
    pub welcome_text: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_RELAY_PORT,
            bind: DEFAULT_BIND.to_string(),
            database_path: default_relay_db_path(),
            api_token: None,
            main_base_url: default_main_base_url(),
            main_token: None,
            request_timeout_ms: default_request_timeout_ms(),
            telegram: None,
            welcome_text: default_welcome_text(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// Chat (usually a channel or group) that also receives broadcast announcements.
    #[serde(default)]
    pub announcement_chat_id: Option<i64>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_relay_port() -> u16 {
    DEFAULT_RELAY_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_workers() -> usize {
    4
}
fn default_poll_interval_ms() -> u64 {
    1_000
}
fn default_announce_timeout_ms() -> u64 {
    3_000
}
fn default_request_timeout_ms() -> u64 {
    5_000
}
fn default_relay_base_url() -> String {
    format!("http://{DEFAULT_BIND}:{DEFAULT_RELAY_PORT}")
}
fn default_main_base_url() -> String {
    format!("http://{DEFAULT_BIND}:{DEFAULT_PORT}")
}
fn default_welcome_text() -> String {
    "Welcome! To receive event notifications, link this chat by sending \
     /login followed by the email you registered with, e.g. /login you@example.com"
        .to_string()
}
fn home_dir() -> String {
    std::env::var("HOME").unwrap_or_else(|_| ".".to_string())
}
fn default_db_path() -> String {
    format!("{}/.herald/herald.db", home_dir())
}
fn default_relay_db_path() -> String {
    format!("{}/.herald/relay.db", home_dir())
}

impl HeraldConfig {
    /// Load config from a TOML file with HERALD_* env var overrides.
    ///
    /// Nested keys use a double underscore, e.g.
    /// `HERALD_RELAY__TELEGRAM__BOT_TOKEN`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: HeraldConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("HERALD_").split("__"))
            .extract()
            .map_err(|e| HeraldError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values that parse but cannot work.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.scheduler.workers == 0 {
            return Err(invalid("scheduler.workers", "must be at least 1"));
        }
        if self.scheduler.poll_interval_ms == 0 {
            return Err(invalid("scheduler.poll_interval_ms", "must be positive"));
        }
        if self.notify.chat_targets == ChatTargetSourceKind::Local
            && self.notify.links_db_path.is_none()
        {
            return Err(invalid(
                "notify.links_db_path",
                "required when chat_targets = \"local\"",
            ));
        }
        if let Some(tg) = &self.relay.telegram {
            if tg.bot_token.trim().is_empty() {
                return Err(invalid("relay.telegram.bot_token", "must not be empty"));
            }
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> HeraldError {
    HeraldError::InvalidConfig {
        field,
        reason: reason.to_string(),
    }
}

fn default_config_path() -> String {
    format!("{}/.herald/herald.toml", home_dir())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config: HeraldConfig = Figment::new()
            .merge(Toml::string(""))
            .extract()
            .unwrap();
        assert_eq!(config.gateway.port, DEFAULT_PORT);
        assert_eq!(config.scheduler.workers, 4);
        assert_eq!(config.notify.chat_targets, ChatTargetSourceKind::Http);
        assert_eq!(config.notify.chat_user_scope, ChatUserScope::LinkedUser);
        assert!(config.relay.telegram.is_none());
    }

    #[test]
    fn kebab_case_enums_parse() {
        let toml = r#"
            [notify]
            chat_targets = "local"
            chat_user_scope = "all-linked"
            links_db_path = "/tmp/relay.db"

            [relay.telegram]
            bot_token = "123:abc"
            announcement_chat_id = -1001
        "#;
        let config: HeraldConfig = Figment::new().merge(Toml::string(toml)).extract().unwrap();
        assert_eq!(config.notify.chat_targets, ChatTargetSourceKind::Local);
        assert_eq!(config.notify.chat_user_scope, ChatUserScope::AllLinked);
        let tg = config.relay.telegram.as_ref().unwrap();
        assert_eq!(tg.announcement_chat_id, Some(-1001));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_unusable_values() {
        let mut config = HeraldConfig::default();
        assert!(config.validate().is_ok());

        config.scheduler.workers = 0;
        let err = config.validate().unwrap_err();
        assert_eq!(err.code(), "CONFIG_INVALID");
        assert!(err.to_string().contains("scheduler.workers"));

        let mut config = HeraldConfig::default();
        config.notify.chat_targets = ChatTargetSourceKind::Local;
        assert!(config.validate().is_err());
        config.notify.links_db_path = Some("/tmp/relay.db".into());
        assert!(config.validate().is_ok());
    }
}
