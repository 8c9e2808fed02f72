//! Background services for the sell bot

pub mod chain;
pub mod monitor;
pub mod notifier;
pub mod params;
pub mod price_oracle;
pub mod trade_executor;

pub use chain::{AlloyChainClient, ChainClient, Reserves, SwapOrder};
pub use monitor::{Monitor, MonitorSettings, RunState, StartOutcome, StopOutcome, TickEvent};
pub use notifier::{BotEvent, Notifier};
pub use params::load_parameters;
pub use price_oracle::{compute_price, PriceOracle};
pub use trade_executor::{SellOutcome, TradeExecutor};
