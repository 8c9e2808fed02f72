//! Price monitor and selling state machine
//!
//! A run polls the pool once per interval. Crossing the upper target switches
//! the run into selling; while selling, every tick at or above the lower target
//! sells the configured USD amount, and the first tick below it switches
//! selling off again. An unavailable price never changes the selling flag.

use crate::db::Database;
use crate::error::BotError;
use crate::services::chain::ChainClient;
use crate::services::notifier::Notifier;
use crate::services::params::load_parameters;
use crate::services::price_oracle::PriceOracle;
use crate::services::trade_executor::{SellOutcome, TradeExecutor};
use crate::types::{MonitorStatus, SellMode, SellRoute, TradingParameters};
use crate::Config;
use alloy::primitives::Address;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Static settings of the monitor, fixed for the life of the process
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    /// User whose settings a run loads
    pub user_id: Option<String>,
    pub pair: Address,
    pub quote_token: Address,
    /// Receiver of swap output
    pub recipient: Address,
    pub interval: Duration,
    pub sell_mode: SellMode,
    pub base_symbol: String,
    pub quote_symbol: String,
}

impl MonitorSettings {
    pub fn from_config(config: &Config, recipient: Address) -> Self {
        Self {
            user_id: config.user_id.clone(),
            pair: config.pair_address,
            quote_token: config.quote_token_address,
            recipient,
            interval: Duration::from_millis(config.monitor_interval_ms),
            sell_mode: config.sell_mode,
            base_symbol: config.base_symbol.clone(),
            quote_symbol: config.quote_symbol.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    NotRunning,
}

/// State owned by a single run
#[derive(Debug, Clone)]
pub struct RunState {
    pub params: TradingParameters,
    pub route: SellRoute,
    pub selling: bool,
    /// A sell completed since selling last switched on
    pub sold_this_phase: bool,
}

impl RunState {
    pub fn new(params: TradingParameters, route: SellRoute) -> Self {
        Self {
            params,
            route,
            selling: false,
            sold_this_phase: false,
        }
    }
}

/// What a single tick did
#[derive(Debug, Clone, PartialEq)]
pub enum TickEvent {
    PriceUnavailable,
    /// Price sampled, nothing to do
    Idle { price: f64 },
    /// Selling already happened this phase (once mode)
    Holding { price: f64 },
    Sold { price: f64, outcome: SellOutcome },
    SellingStopped { price: f64 },
}

struct RunHandle {
    stop_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

#[derive(Default)]
struct RunSlot {
    active: Option<RunHandle>,
    /// Task of a stopped run that may still be finishing an in-flight sell
    stopping: Option<JoinHandle<()>>,
}

/// Everything a run task needs
#[derive(Clone)]
struct Worker {
    oracle: PriceOracle,
    executor: TradeExecutor,
    notifier: Notifier,
    status: Arc<watch::Sender<MonitorStatus>>,
    interval: Duration,
    sell_mode: SellMode,
    base_symbol: String,
    quote_symbol: String,
}

/// Owns the run/stop lifecycle of the price monitor
pub struct Monitor {
    db: Arc<Database>,
    settings: MonitorSettings,
    worker: Worker,
    slot: Mutex<RunSlot>,
    /// Held by the one `start` in progress; `slot` is only locked briefly
    starting: Mutex<()>,
}

impl Monitor {
    pub fn new(
        db: Arc<Database>,
        chain: Arc<dyn ChainClient>,
        notifier: Notifier,
        settings: MonitorSettings,
    ) -> Self {
        let oracle = PriceOracle::new(chain.clone(), settings.pair);
        let executor = TradeExecutor::new(chain, oracle.clone(), notifier.clone());
        let (status_tx, _) = watch::channel(MonitorStatus {
            sell_mode: settings.sell_mode,
            ..MonitorStatus::default()
        });

        let worker = Worker {
            oracle,
            executor,
            notifier,
            status: Arc::new(status_tx),
            interval: settings.interval,
            sell_mode: settings.sell_mode,
            base_symbol: settings.base_symbol.clone(),
            quote_symbol: settings.quote_symbol.clone(),
        };

        Self {
            db,
            settings,
            worker,
            slot: Mutex::new(RunSlot::default()),
            starting: Mutex::new(()),
        }
    }

    pub fn oracle(&self) -> &PriceOracle {
        &self.worker.oracle
    }

    pub fn notifier(&self) -> &Notifier {
        &self.worker.notifier
    }

    pub fn status(&self) -> MonitorStatus {
        self.worker.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<MonitorStatus> {
        self.worker.status.subscribe()
    }

    pub async fn is_running(&self) -> bool {
        self.slot.lock().await.active.is_some()
    }

    /// Load the configured user's parameters and announce them
    pub async fn load(&self) -> Result<(TradingParameters, SellRoute), BotError> {
        let result = match self.settings.user_id.as_deref() {
            Some(user_id) => {
                load_parameters(
                    &self.db,
                    user_id,
                    self.settings.quote_token,
                    self.settings.recipient,
                )
                .await
            }
            None => Err(BotError::InvalidSettings("USER_ID is not configured".to_string())),
        };

        match result {
            Ok((params, route)) => {
                self.worker.notifier.message(format!(
                    "Trading settings loaded! Upper Target: {}, Lower Target: {}, Sell Amount: {} USD",
                    params.upper_target_price, params.lower_target_price, params.sell_amount_usd
                ));
                Ok((params, route))
            }
            Err(e) => {
                warn!("[Monitor] Error fetching trading parameters: {}", e);
                self.worker
                    .notifier
                    .message(format!("Failed to load trading settings: {}", e));
                Err(e)
            }
        }
    }

    /// Start a run; a second start while running or starting is a no-op
    ///
    /// A restart first waits for the previous run's task, which can sit in a
    /// swap confirmation for as long as the chain takes. The slot lock is not
    /// held across that wait or the parameter load, so `stop`, `is_running`
    /// and other starts answer immediately; a `stop` issued meanwhile finds
    /// nothing running.
    pub async fn start(&self) -> Result<StartOutcome, BotError> {
        let Ok(_starting) = self.starting.try_lock() else {
            return Ok(self.already_running());
        };

        let previous = {
            let mut slot = self.slot.lock().await;
            if slot.active.is_some() {
                return Ok(self.already_running());
            }
            slot.stopping.take()
        };

        if let Some(previous) = previous {
            debug!("[Monitor] Waiting for the previous run to finish");
            let _ = previous.await;
        }

        let (params, route) = self.load().await?;
        let owner = params.owner;
        let state = RunState::new(params, route);

        let (stop_tx, stop_rx) = watch::channel(false);
        self.worker.status.send_modify(|s| {
            s.running = true;
            s.selling = false;
            s.user_id = Some(owner);
        });

        let worker = self.worker.clone();
        let join = tokio::spawn(async move { worker.run(state, stop_rx).await });

        info!("[Monitor] Monitoring prices every {:?}", self.settings.interval);
        self.slot.lock().await.active = Some(RunHandle { stop_tx, join });
        Ok(StartOutcome::Started)
    }

    fn already_running(&self) -> StartOutcome {
        info!("[Monitor] Bot is already running");
        self.worker.notifier.message("The bot is already running.");
        StartOutcome::AlreadyRunning
    }

    /// Signal the current run to stop; an in-flight sell is allowed to finish
    pub async fn stop(&self) -> StopOutcome {
        let mut slot = self.slot.lock().await;

        let Some(handle) = slot.active.take() else {
            info!("[Monitor] Bot is not running");
            self.worker.notifier.message("The bot is not running.");
            return StopOutcome::NotRunning;
        };

        let _ = handle.stop_tx.send(true);
        slot.stopping = Some(handle.join);

        self.worker.status.send_modify(|s| {
            s.running = false;
            s.selling = false;
        });
        self.worker.notifier.message("The bot has been stopped.");
        StopOutcome::Stopped
    }

    /// Run one tick against caller-owned state
    pub async fn tick(&self, state: &mut RunState) -> TickEvent {
        self.worker.tick(state).await
    }
}

impl Worker {
    async fn run(self, mut state: RunState, mut stop_rx: watch::Receiver<bool>) {
        loop {
            if *stop_rx.borrow() {
                break;
            }

            self.tick(&mut state).await;

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                changed = stop_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        debug!("[Monitor] Run finished");
        self.status.send_modify(|s| {
            s.running = false;
            s.selling = false;
        });
    }

    async fn tick(&self, state: &mut RunState) -> TickEvent {
        let price = match self.oracle.get_price().await {
            Ok(price) => price,
            Err(e) => {
                warn!("[Monitor] Price fetch failed: {}", e);
                self.notifier.message(format!(
                    "Error while fetching price: {}. Please try again later.",
                    e
                ));
                self.notifier.message("Price fetch failed, retrying...");
                return TickEvent::PriceUnavailable;
            }
        };

        self.notifier.message(format!(
            "Current price is approximately {} {} per {}",
            price, self.quote_symbol, self.base_symbol
        ));
        self.notifier.price(price);

        if !state.selling && price >= state.params.upper_target_price {
            info!("[Monitor] Upper target price reached ({})", price);
            self.notifier.message(format!(
                "Upper Target Price reached: {}. Starting to sell...",
                price
            ));
            state.selling = true;
            state.sold_this_phase = false;
        }

        let event = if !state.selling {
            TickEvent::Idle { price }
        } else if price >= state.params.lower_target_price {
            if self.sell_mode == SellMode::Once && state.sold_this_phase {
                TickEvent::Holding { price }
            } else {
                info!("[Monitor] Price above lower target ({}), executing sell", price);
                let outcome = self
                    .executor
                    .execute_sell(&state.params, &state.route, state.params.sell_amount_usd)
                    .await;
                if outcome.is_completed() {
                    state.sold_this_phase = true;
                }
                TickEvent::Sold { price, outcome }
            }
        } else {
            info!("[Monitor] Price dropped below lower target ({}), stopping sales", price);
            self.notifier
                .message("Price dropped below the lower target. Stopping sales.");
            state.selling = false;
            TickEvent::SellingStopped { price }
        };

        let selling = state.selling;
        self.status.send_modify(|s| {
            s.last_price = Some(price);
            s.selling = selling;
        });

        event
    }
}
