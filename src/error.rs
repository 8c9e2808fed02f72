//! Error taxonomy for the sell bot
//!
//! Configuration errors are surfaced to callers as 4xx responses, fetch and
//! execution errors are recovered where they happen, infrastructure errors
//! become 500s.

use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BotError {
    /// A required settings field was absent or zero
    #[error("Missing required parameters")]
    MissingParameters,

    #[error("Invalid user ID format: {0}")]
    InvalidUserId(String),

    #[error("Bot settings not found for the user")]
    SettingsNotFound,

    /// Stored or submitted settings cannot be turned into trading parameters
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("Price unavailable: {0}")]
    PriceUnavailable(String),

    #[error("Approval failed: {0}")]
    Approval(String),

    #[error("Swap failed: {0}")]
    Swap(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl BotError {
    /// HTTP status used when this error reaches the API boundary
    pub fn status_code(&self) -> StatusCode {
        match self {
            BotError::MissingParameters
            | BotError::InvalidUserId(_)
            | BotError::InvalidSettings(_) => StatusCode::BAD_REQUEST,
            BotError::SettingsNotFound => StatusCode::NOT_FOUND,
            BotError::PriceUnavailable(_)
            | BotError::Approval(_)
            | BotError::Swap(_)
            | BotError::Database(_)
            | BotError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the caller supplied bad input, as opposed to a runtime failure
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            BotError::MissingParameters
                | BotError::InvalidUserId(_)
                | BotError::SettingsNotFound
                | BotError::InvalidSettings(_)
        )
    }
}
