use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use herald_core::config::HeraldConfig;
use herald_core::ChatId;
use herald_relay::{build_router, MainAppClient, RelayBot, RelayState, TelegramChatApi};
use herald_users::ChatLinkRegistry;
use teloxide::Bot;
use tracing::info;

/// Chat relay: Telegram long polling plus the `/send-message` API.
#[derive(Debug, Parser)]
#[command(name = "herald-relay", version)]
struct Args {
    /// Config file (default: HERALD_CONFIG, then ~/.herald/herald.toml)
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "herald_relay=info,tower_http=debug".into()),
        )
        .init();

    let args = Args::parse();
    let config_path = args.config.or_else(|| std::env::var("HERALD_CONFIG").ok());
    let config = HeraldConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        tracing::warn!(code = e.code(), "Config load failed ({}), using defaults", e);
        HeraldConfig::default()
    });
    let relay = config.relay;

    let telegram = relay
        .telegram
        .clone()
        .context("relay.telegram.bot_token is not configured")?;

    let db_path = &relay.database_path;
    ensure_parent_dir(db_path);
    info!(path = %db_path, "opening relay database");
    let db = rusqlite::Connection::open(db_path)?;
    db.execute_batch("PRAGMA journal_mode=WAL;")?;
    let links = ChatLinkRegistry::new(Arc::new(Mutex::new(db)))?;

    let timeout = Duration::from_millis(relay.request_timeout_ms);
    let bot = Bot::new(&telegram.bot_token);
    let chat = Arc::new(TelegramChatApi::new(bot.clone()));
    let resolver = Arc::new(MainAppClient::new(
        &relay.main_base_url,
        relay.main_token.clone(),
        timeout,
    )?);
    let relay_bot = Arc::new(RelayBot::new(
        links.clone(),
        resolver,
        chat.clone(),
        relay.welcome_text.clone(),
    ));

    tokio::spawn(herald_relay::poller::run(bot, relay_bot));
    info!("Telegram bot started");

    let state = Arc::new(RelayState {
        links,
        chat,
        announcement_chat: telegram.announcement_chat_id.map(ChatId::from),
        api_token: relay.api_token.clone(),
        send_timeout: timeout,
    });
    let router = build_router(state);

    let addr: SocketAddr = format!("{}:{}", relay.bind, relay.port).parse()?;
    info!("Herald relay listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}
