//! Pool Sell Bot Web Server
//!
//! HTTP API, WebSocket status channel and the price monitor in one process.

use anyhow::{Context, Result};
use pool_sell_bot::api::{create_app, AppState};
use pool_sell_bot::{Config, DiscordWebhook};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Default to info for this crate and warn elsewhere; override with RUST_LOG
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,pool_sell_bot=info,pool_sell_server=info,tower_http=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    // Load configuration
    let config = Config::from_env()?;
    config.require_private_key()?;

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║       POOL SELL BOT - WEB SERVER                             ║");
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!("║  Pair: {:<53} ║", config.pair_address.to_string());
    println!("║  Interval: {:<49} ║", format!("{} ms", config.monitor_interval_ms));
    println!("║  Sell Mode: {:<48} ║", config.sell_mode.to_string());
    println!("║  Discord Webhook: {:<42} ║", if config.discord_webhook_url.is_some() { "ENABLED" } else { "DISABLED" });
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    info!("Initializing application state...");
    let state = AppState::new(config.clone()).await?;

    // The configured user's settings must load before anything is served
    if let Err(e) = state.monitor.load().await {
        error!("Critical error loading trading parameters: {}", e);
        return Err(e).context("Cannot start without valid trading settings for USER_ID");
    }

    if let Some(url) = &config.discord_webhook_url {
        let relay = DiscordWebhook::new(url.clone());
        let rx = state.notifier.subscribe();
        tokio::spawn(async move {
            relay.run(rx).await;
        });
    }

    let app = create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let listener = TcpListener::bind(addr).await?;

    info!("Server listening on http://{}", addr);
    println!();
    println!("  API:       http://localhost:{}/", config.http_port);
    println!("  WebSocket: ws://localhost:{}/ws", config.http_port);
    println!("  Health:    http://localhost:{}/health", config.http_port);
    println!();

    axum::serve(listener, app).await?;

    Ok(())
}
