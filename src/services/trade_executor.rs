//! Sell execution: USD amount to token amount, optional approval, router swap
//!
//! Every sell is submitted with a zero minimum output, so a sell can fill at
//! any price the pool gives at inclusion time.

use crate::error::BotError;
use crate::services::chain::{ChainClient, SwapOrder};
use crate::services::notifier::Notifier;
use crate::services::price_oracle::{PriceOracle, TOKEN_DECIMALS};
use crate::types::{SellRoute, TradingParameters};
use alloy::primitives::utils::parse_units;
use alloy::primitives::{TxHash, U256};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info};

/// Seconds a swap stays valid after submission
pub const SWAP_DEADLINE_SECS: i64 = 300;

/// Result of one sell attempt
#[derive(Debug, Clone, PartialEq)]
pub enum SellOutcome {
    Completed { tx_hash: TxHash, amount_in: U256 },
    Failed { reason: String },
}

impl SellOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, SellOutcome::Completed { .. })
    }
}

/// Raw token amount worth `amount_usd` at `price` quote units per token
pub fn token_amount_for_usd(amount_usd: Decimal, price: f64) -> Result<U256, BotError> {
    let price_dec = Decimal::try_from(price)
        .ok()
        .filter(|p| *p > Decimal::ZERO)
        .ok_or_else(|| BotError::PriceUnavailable(format!("unusable price {price}")))?;

    let tokens = amount_usd
        .checked_div(price_dec)
        .ok_or_else(|| BotError::Swap(format!("token amount overflow for {amount_usd} USD at {price}")))?
        .round_dp(TOKEN_DECIMALS as u32)
        .normalize();

    let raw = parse_units(&tokens.to_string(), TOKEN_DECIMALS)
        .map_err(|e| BotError::Swap(format!("cannot encode amount {tokens}: {e}")))?
        .get_absolute();

    if raw.is_zero() {
        return Err(BotError::Swap("sell amount rounds to zero tokens".to_string()));
    }
    Ok(raw)
}

#[derive(Clone)]
pub struct TradeExecutor {
    chain: Arc<dyn ChainClient>,
    oracle: PriceOracle,
    notifier: Notifier,
}

impl TradeExecutor {
    pub fn new(chain: Arc<dyn ChainClient>, oracle: PriceOracle, notifier: Notifier) -> Self {
        Self {
            chain,
            oracle,
            notifier,
        }
    }

    /// Sell `amount_usd` worth of the route's token; failures are reported, never returned
    pub async fn execute_sell(
        &self,
        params: &TradingParameters,
        route: &SellRoute,
        amount_usd: Decimal,
    ) -> SellOutcome {
        info!("[Sell] Attempting to sell tokens for {} USD", amount_usd);

        match self.try_sell(params, route, amount_usd).await {
            Ok((tx_hash, amount_in)) => SellOutcome::Completed { tx_hash, amount_in },
            Err(e) => {
                error!("[Sell] Error executing sell trade: {}", e);
                self.notifier
                    .message(format!("Error during the sale: {}. Please try again.", e));
                SellOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn try_sell(
        &self,
        params: &TradingParameters,
        route: &SellRoute,
        amount_usd: Decimal,
    ) -> Result<(TxHash, U256), BotError> {
        let price = self.oracle.get_price().await?;
        self.notifier.price(price);
        let amount_in = token_amount_for_usd(amount_usd, price)?;

        if params.approval_required {
            self.approve(route, amount_in).await?;
        }

        let order = SwapOrder {
            amount_in,
            amount_out_min: U256::ZERO,
            path: route.path(),
            to: route.recipient,
            deadline: (chrono::Utc::now().timestamp() + SWAP_DEADLINE_SECS) as u64,
        };

        let tx_hash = self
            .chain
            .swap_exact_tokens_for_tokens(route.router, &order)
            .await
            .map_err(|e| BotError::Swap(format!("{e:#}")))?;

        info!("[Sell] Swap submitted: {} ({} raw tokens at {})", tx_hash, amount_in, price);
        self.notifier
            .message("Your sell order has been placed! Please wait for confirmation...");

        self.chain
            .wait_for_confirmation(tx_hash)
            .await
            .map_err(|e| BotError::Swap(format!("{e:#}")))?;

        self.notifier
            .message("Transaction confirmed. Your sell is complete!");

        Ok((tx_hash, amount_in))
    }

    async fn approve(&self, route: &SellRoute, amount_in: U256) -> Result<(), BotError> {
        info!("[Sell] Approving {} for router {}", route.token, route.router);

        let result = async {
            let tx_hash = self.chain.approve(route.token, route.router, amount_in).await?;
            info!("[Sell] Approval transaction hash: {}", tx_hash);
            self.chain.wait_for_confirmation(tx_hash).await
        }
        .await;

        match result {
            Ok(()) => {
                self.notifier.message(
                    "Token approval confirmed. You can now proceed with the transaction.",
                );
                Ok(())
            }
            Err(e) => {
                let err = BotError::Approval(format!("{e:#}"));
                error!("[Sell] Error approving token: {}", err);
                self.notifier.message(format!(
                    "Error approving token: {}. Please check your wallet or try again.",
                    err
                ));
                Err(err)
            }
        }
    }
}
