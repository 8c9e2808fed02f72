//! Current pool price

use super::{api_error, ApiError};
use crate::api::server::AppState;
use axum::{extract::State, Json};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct PriceResponse {
    pub price: f64,
}

/// GET /price; the quote is broadcast to observers as well
pub async fn get_price(State(state): State<AppState>) -> Result<Json<PriceResponse>, ApiError> {
    let price = state
        .monitor
        .oracle()
        .get_price()
        .await
        .map_err(|e| api_error(e, "Failed to fetch current price"))?;

    state.notifier.message(format!(
        "Current price is approximately {} {} per {}",
        price, state.config.quote_symbol, state.config.base_symbol
    ));
    state.notifier.price(price);

    Ok(Json(PriceResponse { price }))
}
