//! Pool Sell Bot Library
//!
//! Watches the price of a token in a UniswapV2-style pool and sells it through
//! the pool's router once price climbs to an upper target, continuing until it
//! falls below a lower target.
//!
//! Price is `quote_reserve / base_reserve` of the pair. Per-user targets and
//! sell size live in SQLite; status messages are broadcast to WebSocket
//! clients and optionally mirrored to Discord.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod services;
pub mod types;
pub mod webhook;

pub use config::Config;
pub use db::Database;
pub use error::BotError;
pub use services::{ChainClient, Monitor, Notifier, PriceOracle};
pub use types::{BotSettings, MonitorStatus, SellMode, SellRoute, TradingParameters, UserId};
pub use webhook::DiscordWebhook;
