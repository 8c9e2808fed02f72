//! Monitor lifecycle endpoints

use super::{api_error, ApiError, MessageResponse};
use crate::api::server::AppState;
use crate::services::{StartOutcome, StopOutcome};
use crate::types::MonitorStatus;
use axum::{extract::State, Json};
use tracing::info;

/// POST /start
pub async fn start(State(state): State<AppState>) -> Result<Json<MessageResponse>, ApiError> {
    info!("Starting the bot service...");

    match state.monitor.start().await {
        Ok(StartOutcome::Started) => Ok(MessageResponse::new("Bot started successfully.")),
        Ok(StartOutcome::AlreadyRunning) => Ok(MessageResponse::new("The bot is already running.")),
        Err(e) => Err(api_error(e, "Failed to start the bot")),
    }
}

/// POST /stop
pub async fn stop(State(state): State<AppState>) -> Json<MessageResponse> {
    info!("Stopping the bot service...");

    match state.monitor.stop().await {
        StopOutcome::Stopped => MessageResponse::new("Bot stopped successfully."),
        StopOutcome::NotRunning => MessageResponse::new("The bot is not running."),
    }
}

/// GET /status
pub async fn status(State(state): State<AppState>) -> Json<MonitorStatus> {
    Json(state.monitor.status())
}
