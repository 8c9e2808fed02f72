//! Axum server setup and configuration

use crate::api::routes;
use crate::api::ws::ws_handler;
use crate::services::{AlloyChainClient, ChainClient, Monitor, MonitorSettings, Notifier};
use crate::{Config, Database};
use alloy::primitives::Address;
use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub config: Arc<Config>,
    pub monitor: Arc<Monitor>,
    /// Status events for WebSocket clients
    pub notifier: Notifier,
}

impl AppState {
    /// Open the database and connect to the chain
    pub async fn new(config: Config) -> Result<Self> {
        let db = Database::new(&config.database_path).await?;
        let chain =
            AlloyChainClient::connect(&config.rpc_url, config.private_key.as_deref()).await?;

        let recipient = config
            .account
            .or(chain.signer_address())
            .context("ACCOUNT must be set when no PRIVATE_KEY is configured")?;

        Ok(Self::from_parts(config, Arc::new(db), Arc::new(chain), recipient))
    }

    /// Assemble state from already constructed collaborators
    pub fn from_parts(
        config: Config,
        db: Arc<Database>,
        chain: Arc<dyn ChainClient>,
        recipient: Address,
    ) -> Self {
        let notifier = Notifier::new();
        let settings = MonitorSettings::from_config(&config, recipient);
        let monitor = Monitor::new(db.clone(), chain, notifier.clone(), settings);

        Self {
            db,
            config: Arc::new(config),
            monitor: Arc::new(monitor),
            notifier,
        }
    }
}

/// Create the Axum application with all routes
pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    let cors = match state.config.cors_origin.parse::<HeaderValue>() {
        Ok(origin) => cors.allow_origin(origin).allow_credentials(true),
        Err(_) => {
            warn!("Invalid CORS_ORIGIN {:?}, allowing any origin", state.config.cors_origin);
            cors.allow_origin(Any)
        }
    };

    Router::new()
        .route("/price", get(routes::price::get_price))
        .route("/settings", post(routes::settings::save_settings))
        .route("/settings/:user_id", get(routes::settings::get_settings))
        .route("/start", post(routes::bot::start))
        .route("/stop", post(routes::bot::stop))
        .route("/status", get(routes::bot::status))
        .route("/ws", get(ws_handler))
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
