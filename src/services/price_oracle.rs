//! Pool price derived from pair reserves

use crate::error::BotError;
use crate::services::chain::{ChainClient, Reserves};
use alloy::primitives::{Address, U256};
use std::sync::Arc;
use tracing::debug;

/// Both pool tokens use 18 decimals
pub const TOKEN_DECIMALS: u8 = 18;

/// Convert a raw token amount to a float with the given decimals
pub fn u256_to_f64(value: U256, decimals: u8) -> f64 {
    // Pair reserves are uint112, so they always fit in u128
    let value_u128 = value.saturating_to::<u128>();
    let divisor = 10_u128.pow(decimals as u32);
    let whole_part = value_u128 / divisor;
    let fractional_part = value_u128 % divisor;
    whole_part as f64 + (fractional_part as f64 / divisor as f64)
}

/// Quote units per base unit, `None` for an empty base side
pub fn compute_price(quote_reserve: U256, base_reserve: U256) -> Option<f64> {
    if base_reserve.is_zero() {
        return None;
    }
    let quote = u256_to_f64(quote_reserve, TOKEN_DECIMALS);
    let base = u256_to_f64(base_reserve, TOKEN_DECIMALS);
    Some(quote / base)
}

/// Reads the configured pair and prices its base token
#[derive(Clone)]
pub struct PriceOracle {
    chain: Arc<dyn ChainClient>,
    pair: Address,
}

impl PriceOracle {
    pub fn new(chain: Arc<dyn ChainClient>, pair: Address) -> Self {
        Self { chain, pair }
    }

    pub fn pair(&self) -> Address {
        self.pair
    }

    /// Fetch reserves and compute the current price
    pub async fn get_price(&self) -> Result<f64, BotError> {
        let Reserves { base, quote } = self
            .chain
            .get_reserves(self.pair)
            .await
            .map_err(|e| BotError::PriceUnavailable(format!("{e:#}")))?;

        let price = compute_price(quote, base)
            .ok_or_else(|| BotError::PriceUnavailable("base reserve is zero".to_string()))?;

        debug!(pair = %self.pair, price, "Price sampled");
        Ok(price)
    }
}
