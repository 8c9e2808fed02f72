//! Core types for the sell bot

use crate::error::BotError;
use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque identifier of the user owning a settings record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Validate a caller-supplied identifier
    pub fn parse(raw: &str) -> Result<Self, BotError> {
        Uuid::parse_str(raw.trim())
            .map(Self)
            .map_err(|_| BotError::InvalidUserId(raw.to_string()))
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// What the monitor does while selling is active and price stays above the lower target
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SellMode {
    /// Sell the configured amount on every tick
    #[default]
    EveryTick,
    /// Sell once, then wait for the next selling phase
    Once,
}

impl FromStr for SellMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "every_tick" | "every-tick" | "repeat" => Ok(SellMode::EveryTick),
            "once" | "one_shot" => Ok(SellMode::Once),
            other => anyhow::bail!("Unknown SELL_MODE: {other} (expected every_tick or once)"),
        }
    }
}

impl fmt::Display for SellMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SellMode::EveryTick => write!(f, "every_tick"),
            SellMode::Once => write!(f, "once"),
        }
    }
}

/// Stored trading settings for a user
#[derive(Debug, Clone, PartialEq)]
pub struct BotSettings {
    pub id: i64,
    pub user_id: UserId,
    /// Upper target: selling starts at or above this price
    pub target_price: f64,
    /// Lower target: selling stops below this price
    pub lower_target_price: f64,
    pub sell_amount_usd: Decimal,
    pub approval_required: bool,
    pub router_address: Option<String>,
    pub token_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Settings fields written by an upsert
#[derive(Debug, Clone, PartialEq)]
pub struct NewBotSettings {
    pub user_id: UserId,
    pub target_price: f64,
    pub lower_target_price: f64,
    pub sell_amount_usd: Decimal,
    pub approval_required: bool,
    pub router_address: Option<String>,
    pub token_address: Option<String>,
}

/// Validated parameters the monitor runs with
#[derive(Debug, Clone, PartialEq)]
pub struct TradingParameters {
    pub owner: UserId,
    pub upper_target_price: f64,
    pub lower_target_price: f64,
    pub sell_amount_usd: Decimal,
    pub approval_required: bool,
    pub router_address: Address,
    pub token_address: Address,
}

/// Contract bindings a sell goes through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SellRoute {
    pub router: Address,
    /// Token being sold (pool base)
    pub token: Address,
    /// Token received (pool quote)
    pub quote_token: Address,
    /// Receiver of the swap output
    pub recipient: Address,
}

impl SellRoute {
    /// Swap path: base token first, quote token last
    pub fn path(&self) -> Vec<Address> {
        vec![self.token, self.quote_token]
    }
}

/// Snapshot of the monitor exposed over the API
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorStatus {
    pub running: bool,
    pub selling: bool,
    pub last_price: Option<f64>,
    pub user_id: Option<UserId>,
    pub sell_mode: SellMode,
}
