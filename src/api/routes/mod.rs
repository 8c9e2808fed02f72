//! API route handlers

pub mod bot;
pub mod price;
pub mod settings;

use crate::error::BotError;
use axum::{http::StatusCode, Json};
use serde::Serialize;

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Message-only success response
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Map a domain error to a response; `context` names the failed operation for 5xx errors
pub fn api_error(err: BotError, context: &str) -> ApiError {
    let status = err.status_code();
    let body = if err.is_configuration() {
        ErrorResponse {
            error: err.to_string(),
            message: None,
        }
    } else {
        tracing::error!("{}: {}", context, err);
        ErrorResponse {
            error: context.to_string(),
            message: Some(err.to_string()),
        }
    };
    (status, Json(body))
}
