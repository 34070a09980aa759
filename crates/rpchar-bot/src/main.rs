//! RPChar Bot - Main entry point.

use anyhow::Context;
use character_store::Store;
use kik_client::KikClient;
use rpchar_bot::server::{create_router, AppState};
use rpchar_bot::{AppResult, Config, Dispatcher, Services};
use secrecy::ExposeSecret;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> AppResult<()> {
    let config = Config::load().context("Failed to load configuration")?;

    init_logging(&config.log_level);

    info!("Starting RPChar Bot as @{}...", config.bot_username);

    let store = Store::open(&config.database_file()).await?;
    info!("Database ready at {}", config.database_file());

    let picture_dir = config.picture_dir();
    tokio::fs::create_dir_all(&picture_dir)
        .await
        .with_context(|| format!("Failed to create {}", picture_dir.display()))?;

    let kik = KikClient::new(
        &config.kik_api_url,
        &config.bot_username,
        config.bot_auth_code.expose_secret().as_str(),
    )?;

    let webhook = config.webhook_url();
    match kik.set_configuration(&webhook).await {
        Ok(()) => info!("Webhook registered at {webhook}"),
        Err(e) => warn!("Failed to register webhook {webhook}: {e}"),
    }

    let addr: SocketAddr = format!("{}:{}", config.local_ip, config.local_port)
        .parse()
        .context("Invalid LocalIP/LocalPort")?;

    let config = Arc::new(config);
    let services = Services::new(Arc::clone(&config), store, Arc::new(kik));
    let dispatcher = Dispatcher::new(Arc::new(services))?;
    let app = create_router(AppState::new(Arc::new(dispatcher)));

    let listener = TcpListener::bind(addr).await?;
    info!("Listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown signal received");
            }
        })
        .await?;

    info!("Shutting down...");
    Ok(())
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
