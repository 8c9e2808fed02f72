//! Configuration management for the sell bot

use crate::types::SellMode;
use alloy::primitives::{address, Address};
use anyhow::{Context, Result};
use std::env;
use std::fmt;
use std::str::FromStr;

/// PancakeSwap V2 pair the bot prices against (base = token0, quote = token1)
pub const DEFAULT_PAIR_ADDRESS: Address = address!("ea8e174e7084ca40b5436b7ed0e7f855c77ce907");
/// BSC USDT, the quote token
pub const DEFAULT_QUOTE_TOKEN_ADDRESS: Address = address!("55d398326f99059ff775485246999027b3197955");

/// Bot configuration loaded from environment
#[derive(Clone)]
pub struct Config {
    /// JSON-RPC endpoint of the chain the pool lives on
    pub rpc_url: String,

    /// Signing key for approve/swap transactions (read-only commands work without it)
    pub private_key: Option<String>,

    /// Recipient of swap output; defaults to the signer address
    pub account: Option<Address>,

    /// User whose settings the monitor loads on start
    pub user_id: Option<String>,

    /// Path to SQLite database
    pub database_path: String,

    pub http_port: u16,

    /// Frontend origin allowed by CORS
    pub cors_origin: String,

    /// Delay between monitor ticks in milliseconds
    pub monitor_interval_ms: u64,

    pub pair_address: Address,
    pub quote_token_address: Address,

    /// Labels used in status messages
    pub base_symbol: String,
    pub quote_symbol: String,

    /// Whether to sell on every tick above the lower target or once per selling phase
    pub sell_mode: SellMode,

    /// Discord webhook URL mirroring status messages (optional)
    pub discord_webhook_url: Option<String>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("rpc_url", &self.rpc_url)
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("account", &self.account)
            .field("user_id", &self.user_id)
            .field("database_path", &self.database_path)
            .field("http_port", &self.http_port)
            .field("cors_origin", &self.cors_origin)
            .field("monitor_interval_ms", &self.monitor_interval_ms)
            .field("pair_address", &self.pair_address)
            .field("quote_token_address", &self.quote_token_address)
            .field("sell_mode", &self.sell_mode)
            .field("discord_webhook", &self.discord_webhook_url.is_some())
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    pub fn from_vars<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| var(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let rpc_url = non_empty("RPC_URL").context("RPC_URL must be set")?;

        let private_key = non_empty("PRIVATE_KEY");

        let account = non_empty("ACCOUNT")
            .map(|v| Address::from_str(&v).with_context(|| format!("Invalid ACCOUNT address: {v}")))
            .transpose()?;

        let user_id = non_empty("USER_ID");

        let database_path = non_empty("DATABASE_PATH").unwrap_or_else(|| "sellbot.db".to_string());

        let http_port = non_empty("HTTP_PORT")
            .map(|v| v.parse::<u16>().with_context(|| format!("Invalid HTTP_PORT: {v}")))
            .transpose()?
            .unwrap_or(5001);

        let cors_origin =
            non_empty("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_string());

        let monitor_interval_ms = non_empty("MONITOR_INTERVAL_MS")
            .and_then(|v| v.parse().ok())
            .filter(|ms: &u64| *ms > 0)
            .unwrap_or(1000);

        let pair_address = non_empty("PAIR_ADDRESS")
            .map(|v| Address::from_str(&v).with_context(|| format!("Invalid PAIR_ADDRESS: {v}")))
            .transpose()?
            .unwrap_or(DEFAULT_PAIR_ADDRESS);

        let quote_token_address = non_empty("QUOTE_TOKEN_ADDRESS")
            .map(|v| {
                Address::from_str(&v).with_context(|| format!("Invalid QUOTE_TOKEN_ADDRESS: {v}"))
            })
            .transpose()?
            .unwrap_or(DEFAULT_QUOTE_TOKEN_ADDRESS);

        let base_symbol = non_empty("BASE_SYMBOL").unwrap_or_else(|| "UPiT".to_string());
        let quote_symbol = non_empty("QUOTE_SYMBOL").unwrap_or_else(|| "USDT".to_string());

        let sell_mode = non_empty("SELL_MODE")
            .map(|v| SellMode::from_str(&v))
            .transpose()?
            .unwrap_or_default();

        let discord_webhook_url = non_empty("DISCORD_WEBHOOK_URL");

        Ok(Self {
            rpc_url,
            private_key,
            account,
            user_id,
            database_path,
            http_port,
            cors_origin,
            monitor_interval_ms,
            pair_address,
            quote_token_address,
            base_symbol,
            quote_symbol,
            sell_mode,
            discord_webhook_url,
        })
    }

    /// Signing key, required by anything that sends transactions
    pub fn require_private_key(&self) -> Result<&str> {
        self.private_key
            .as_deref()
            .context("PRIVATE_KEY required to send transactions")
    }

    /// Default user, required by the monitor
    pub fn require_user_id(&self) -> Result<&str> {
        self.user_id
            .as_deref()
            .context("USER_ID required to load trading parameters")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_vars(vars(&[("RPC_URL", "https://bsc-dataseed.binance.org")])).unwrap();
        assert_eq!(config.http_port, 5001);
        assert_eq!(config.monitor_interval_ms, 1000);
        assert_eq!(config.database_path, "sellbot.db");
        assert_eq!(config.cors_origin, "http://localhost:3000");
        assert_eq!(config.pair_address, DEFAULT_PAIR_ADDRESS);
        assert_eq!(config.quote_token_address, DEFAULT_QUOTE_TOKEN_ADDRESS);
        assert_eq!(config.sell_mode, SellMode::EveryTick);
        assert!(config.private_key.is_none());
        assert!(config.require_private_key().is_err());
        assert!(config.require_user_id().is_err());
    }

    #[test]
    fn test_missing_rpc_url() {
        assert!(Config::from_vars(vars(&[])).is_err());
        assert!(Config::from_vars(vars(&[("RPC_URL", "  ")])).is_err());
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_vars(vars(&[
            ("RPC_URL", "http://localhost:8545"),
            ("PRIVATE_KEY", "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"),
            ("ACCOUNT", "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"),
            ("USER_ID", "8c1f7f0e-5a4b-4c8e-9f3d-2b6a1e0d4c7a"),
            ("HTTP_PORT", "8080"),
            ("MONITOR_INTERVAL_MS", "250"),
            ("SELL_MODE", "once"),
        ]))
        .unwrap();

        assert_eq!(config.http_port, 8080);
        assert_eq!(config.monitor_interval_ms, 250);
        assert_eq!(config.sell_mode, SellMode::Once);
        assert!(config.account.is_some());
        assert!(config.require_private_key().is_ok());
        assert_eq!(config.require_user_id().unwrap(), "8c1f7f0e-5a4b-4c8e-9f3d-2b6a1e0d4c7a");
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(Config::from_vars(vars(&[("RPC_URL", "x"), ("ACCOUNT", "not-an-address")])).is_err());
        assert!(Config::from_vars(vars(&[("RPC_URL", "x"), ("HTTP_PORT", "99999")])).is_err());
        assert!(Config::from_vars(vars(&[("RPC_URL", "x"), ("SELL_MODE", "sometimes")])).is_err());
    }

    #[test]
    fn test_debug_redacts_private_key() {
        let config = Config::from_vars(vars(&[("RPC_URL", "x"), ("PRIVATE_KEY", "0xdeadbeef")])).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("deadbeef"));
        assert!(debug.contains("redacted"));
    }
}
