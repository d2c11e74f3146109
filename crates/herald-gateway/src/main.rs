use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use herald_core::config::{ChatTargetSourceKind, HeraldConfig};
use herald_core::SystemClock;
use herald_notify::{
    ChatTargetSource, Dispatcher, HttpChatRelay, HttpChatTargets, LocalChatTargets,
    NotificationDispatch, PushHub,
};
use herald_scheduler::{HandlerRegistry, JobQueue};
use rusqlite::Connection;
use tracing::info;

mod app;
mod auth;
mod http;
mod ws;

/// Main application: event API, push hub and reminder scheduler.
#[derive(Debug, Parser)]
#[command(name = "herald-gateway", version)]
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
                .unwrap_or_else(|_| "herald_gateway=info,tower_http=debug".into()),
        )
        .init();

    // load config: --config > HERALD_CONFIG env > ~/.herald/herald.toml
    let args = Args::parse();
    let config_path = args.config.or_else(|| std::env::var("HERALD_CONFIG").ok());
    let config = HeraldConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        tracing::warn!(code = e.code(), "Config load failed ({}), using defaults", e);
        HeraldConfig::default()
    });

    let bind = config.gateway.bind.clone();
    let port = config.gateway.port;

    // single SQLite file for users, events and jobs
    let db_path = &config.database.path;
    ensure_parent_dir(db_path);
    info!(path = %db_path, "opening SQLite database");
    let db = Arc::new(Mutex::new(open_wal(db_path)?));

    // each store runs its own idempotent migrations
    let users = herald_users::UserDirectory::new(db.clone())?;
    let events_store = herald_events::EventStore::new(db.clone())?;
    let scheduler = herald_scheduler::SchedulerHandle::new(db)?;
    info!("database migrations complete");

    // notification dispatch: in-process push hub + HTTP chat relay
    let request_timeout = Duration::from_millis(config.notify.request_timeout_ms);
    let hub = Arc::new(PushHub::new());
    let relay = Arc::new(HttpChatRelay::new(
        &config.relay_client.base_url,
        config.relay_client.api_token.clone(),
        request_timeout,
    )?);
    let targets = build_targets(&config, request_timeout)?;
    let dispatch: Arc<dyn NotificationDispatch> = Arc::new(Dispatcher::new(
        hub.clone(),
        relay,
        targets,
        config.notify.chat_user_scope,
        request_timeout,
    ));

    // scheduler engine with the notify.* handlers
    let mut handlers = HandlerRegistry::default();
    herald_notify::register_handlers(&mut handlers, dispatch.clone());
    let engine = scheduler.engine(
        handlers,
        config.scheduler.workers,
        Duration::from_millis(config.scheduler.poll_interval_ms),
    );
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let engine_task = tokio::spawn(async move { engine.run(shutdown_rx).await });

    let events = herald_events::EventService::new(
        events_store,
        users.clone(),
        dispatch.clone(),
        Arc::new(scheduler.clone()) as Arc<dyn JobQueue>,
        Arc::new(SystemClock),
        Duration::from_millis(config.events.announce_timeout_ms),
    );

    let state = Arc::new(app::AppState::new(
        config, hub, events, users, scheduler, dispatch,
    ));
    let router = app::build_router(state);

    let addr: SocketAddr = format!("{}:{}", bind, port).parse()?;
    info!("Herald gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    // signal scheduler to stop and let in-flight claims settle
    let _ = shutdown_tx.send(true);
    let _ = engine_task.await;
    Ok(())
}

/// Where the chat handler gets linked chats: the relay's API, or its database file.
fn build_targets(
    config: &HeraldConfig,
    timeout: Duration,
) -> anyhow::Result<Arc<dyn ChatTargetSource>> {
    match config.notify.chat_targets {
        ChatTargetSourceKind::Http => Ok(Arc::new(HttpChatTargets::new(
            &config.relay_client.base_url,
            config.relay_client.api_token.clone(),
            timeout,
        )?)),
        ChatTargetSourceKind::Local => {
            let path = config
                .notify
                .links_db_path
                .as_deref()
                .context("notify.links_db_path is required when chat_targets = \"local\"")?;
            info!(path, "reading chat links from relay database");
            let links = herald_users::ChatLinkRegistry::new(Arc::new(Mutex::new(open_wal(path)?)))?;
            Ok(Arc::new(LocalChatTargets::new(links)))
        }
    }
}

fn open_wal(path: &str) -> anyhow::Result<Connection> {
    let db = Connection::open(path)?;
    db.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(db)
}

fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}
