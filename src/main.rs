//! Pool Sell Bot CLI
//!
//! One-shot price checks, settings management and a headless monitor run.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use pool_sell_bot::api::routes::settings::SettingsRequest;
use pool_sell_bot::services::{AlloyChainClient, BotEvent, MonitorSettings};
use pool_sell_bot::types::NewBotSettings;
use pool_sell_bot::{
    ChainClient, Config, Database, DiscordWebhook, Monitor, Notifier, PriceOracle, UserId,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "pool-sell-bot")]
#[command(about = "Threshold sell bot for UniswapV2-style pools")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the current pool price
    Price,

    /// Show or change stored trading settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Run the monitor in the foreground (Ctrl+C to stop)
    Run,
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print a user's settings
    Show {
        /// User ID (defaults to USER_ID)
        #[arg(short, long)]
        user: Option<String>,
    },

    /// Create or update a user's settings
    Set {
        /// User ID (defaults to USER_ID)
        #[arg(short, long)]
        user: Option<String>,

        /// Upper target price: selling starts at or above it
        #[arg(long)]
        target: f64,

        /// Lower target price: selling stops below it
        #[arg(long)]
        lower: f64,

        /// USD value sold per trade
        #[arg(long)]
        amount: Decimal,

        /// Send an approve before every swap
        #[arg(long)]
        approval: bool,

        /// Router contract address
        #[arg(long)]
        router: String,

        /// Address of the token being sold
        #[arg(long)]
        token: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    // Load configuration
    let config = Config::from_env()?;

    match cli.command {
        Commands::Price => show_price(&config).await?,
        Commands::Settings { action } => match action {
            SettingsAction::Show { user } => show_settings(&config, user).await?,
            SettingsAction::Set {
                user,
                target,
                lower,
                amount,
                approval,
                router,
                token,
            } => {
                let user = resolve_user(&config, user)?;
                let request = SettingsRequest {
                    target_price: Some(target),
                    lower_target_price: Some(lower),
                    sell_amount_usd: Some(amount),
                    approval_required: approval,
                    router_address: Some(router),
                    token_address: Some(token),
                    user_id: Some(user.to_string()),
                };
                save_settings(&config, request).await?
            }
        },
        Commands::Run => run_monitor(&config).await?,
    }

    Ok(())
}

fn resolve_user(config: &Config, user: Option<String>) -> Result<UserId> {
    let raw = match user {
        Some(u) => u,
        None => config.require_user_id()?.to_string(),
    };
    Ok(UserId::parse(&raw)?)
}

async fn show_price(config: &Config) -> Result<()> {
    let chain = AlloyChainClient::connect(&config.rpc_url, None).await?;
    let oracle = PriceOracle::new(Arc::new(chain), config.pair_address);

    let price = oracle.get_price().await?;
    println!(
        "\n  {} {} {} per {}\n",
        "Price:".bold(),
        price.to_string().green().bold(),
        config.quote_symbol,
        config.base_symbol
    );
    println!("  Pair: {}", config.pair_address);
    Ok(())
}

async fn show_settings(config: &Config, user: Option<String>) -> Result<()> {
    let user = resolve_user(config, user)?;
    let db = Database::new(&config.database_path).await?;

    let Some(settings) = db.get_settings_for_user(&user).await? else {
        println!("\n  {}\n", "Bot settings not found for the user".red());
        return Ok(());
    };

    println!("\n{}", "=".repeat(70));
    println!("  SETTINGS FOR {}", user);
    println!("{}", "=".repeat(70));
    println!("  Upper target:      {}", settings.target_price);
    println!("  Lower target:      {}", settings.lower_target_price);
    println!("  Sell amount:       {} USD", settings.sell_amount_usd);
    println!("  Approval required: {}", settings.approval_required);
    println!("  Router:            {}", settings.router_address.as_deref().unwrap_or("-"));
    println!("  Token:             {}", settings.token_address.as_deref().unwrap_or("-"));
    println!("  Updated:           {}", settings.updated_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!();
    Ok(())
}

/// Same checks as `POST /settings`; a router or token is required to run
fn validate_settings(request: SettingsRequest) -> Result<NewBotSettings> {
    let new = request.into_new_settings()?;
    if new.router_address.is_none() || new.token_address.is_none() {
        anyhow::bail!("Invalid settings: router and token addresses must not be blank");
    }
    Ok(new)
}

async fn save_settings(config: &Config, request: SettingsRequest) -> Result<()> {
    let new = validate_settings(request)?;
    let db = Database::new(&config.database_path).await?;
    let outcome = db.upsert_settings(&new).await?;

    let message = if outcome.created {
        "Bot settings created successfully"
    } else {
        "Bot settings updated successfully"
    };
    println!("\n  {} ({})\n", message.green(), outcome.settings.user_id);
    Ok(())
}

async fn run_monitor(config: &Config) -> Result<()> {
    let private_key = config.require_private_key()?;
    let chain = AlloyChainClient::connect(&config.rpc_url, Some(private_key)).await?;
    let recipient = config
        .account
        .or(chain.signer_address())
        .context("ACCOUNT or PRIVATE_KEY must be set")?;

    println!("\n{}", "=".repeat(70));
    println!("  MONITOR MODE");
    println!(
        "  Pair: {} | Interval: {}ms | Sell mode: {}",
        config.pair_address, config.monitor_interval_ms, config.sell_mode
    );
    println!("  Recipient: {}", recipient);
    if config.discord_webhook_url.is_some() {
        println!("  Discord Webhook: ENABLED");
    }
    println!("{}\n", "=".repeat(70));

    let db = Arc::new(Database::new(&config.database_path).await?);
    let notifier = Notifier::new();
    let monitor = Monitor::new(
        db,
        Arc::new(chain),
        notifier.clone(),
        MonitorSettings::from_config(config, recipient),
    );

    if let Some(url) = &config.discord_webhook_url {
        let relay = DiscordWebhook::new(url.clone());
        tokio::spawn(relay.run(notifier.subscribe()));
    }

    let mut events = notifier.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(BotEvent::BotMessage(message)) => print_status(&message),
                Ok(BotEvent::PriceUpdate(_)) => {}
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });

    monitor.start().await?;
    println!("Monitoring (Ctrl+C to stop)...\n");

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
    }

    info!("Shutting down monitor");
    monitor.stop().await;
    printer.abort();
    Ok(())
}

fn print_status(message: &str) {
    let stamp = chrono::Local::now().format("%H:%M:%S");
    let lower = message.to_lowercase();
    let line = if lower.contains("error") || lower.contains("failed") {
        message.red()
    } else if lower.contains("confirmed") || lower.contains("starting to sell") {
        message.green()
    } else if lower.contains("stopping") || lower.contains("stopped") {
        message.yellow()
    } else {
        message.normal()
    };
    println!("  [{}] {}", stamp, line);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pool_sell_bot::BotError;
    use rust_decimal_macros::dec;

    fn request(router: &str, token: &str, target: f64) -> SettingsRequest {
        SettingsRequest {
            target_price: Some(target),
            lower_target_price: Some(0.3),
            sell_amount_usd: Some(dec!(25)),
            approval_required: false,
            router_address: Some(router.to_string()),
            token_address: Some(token.to_string()),
            user_id: Some(UserId::new().to_string()),
        }
    }

    #[test]
    fn test_cli_settings_are_validated() {
        let router = "0x10ed43c718714eb63d5aa57b78b54704e256024e";
        let token = "0x4dB7B2fD0a370170a874926B6Fd98d34d3D488B5";

        let new = validate_settings(request(router, token, 0.5)).unwrap();
        assert_eq!(
            new.router_address.as_deref(),
            Some("0x10ED43C718714eb63d5aA57B78B54704E256024E")
        );

        let err = validate_settings(request("pancake", token, 0.5)).unwrap_err();
        assert!(matches!(err.downcast_ref::<BotError>(), Some(BotError::InvalidSettings(_))));

        let err = validate_settings(request(router, token, 0.0)).unwrap_err();
        assert!(matches!(err.downcast_ref::<BotError>(), Some(BotError::MissingParameters)));

        let err = validate_settings(request(router, token, -1.0)).unwrap_err();
        assert!(matches!(err.downcast_ref::<BotError>(), Some(BotError::InvalidSettings(_))));

        assert!(validate_settings(request(router, " ", 0.5)).is_err());
    }
}
