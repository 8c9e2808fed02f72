//! Discord webhook mirror of bot status messages

use crate::services::notifier::BotEvent;
use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, error, info, warn};

const COLOR_ERROR: u32 = 0xFF0000;
const COLOR_SUCCESS: u32 = 0x00FF00;
const COLOR_INFO: u32 = 0x3498DB;

/// Discord webhook client for trade and lifecycle notifications
#[derive(Clone)]
pub struct DiscordWebhook {
    client: Client,
    webhook_url: String,
}

impl DiscordWebhook {
    pub fn new(webhook_url: String) -> Self {
        Self {
            client: Client::new(),
            webhook_url,
        }
    }

    /// Post one status message
    pub async fn send_status(&self, message: &str) {
        let payload = embed_for(message);

        match self.client.post(&self.webhook_url).json(&payload).send().await {
            Ok(response) => {
                if response.status().is_success() {
                    debug!("Discord status sent: {}", message);
                } else {
                    error!("Discord webhook failed: {}", response.status());
                }
            }
            Err(e) => {
                error!("Failed to send Discord webhook: {}", e);
            }
        }
    }

    /// Forward status messages until the notifier goes away
    pub async fn run(self, mut rx: broadcast::Receiver<BotEvent>) {
        info!("Discord relay started");
        loop {
            match rx.recv().await {
                Ok(BotEvent::BotMessage(message)) => {
                    if should_relay(&message) {
                        self.send_status(&message).await;
                    }
                }
                Ok(BotEvent::PriceUpdate(_)) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Discord relay lagged, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
        info!("Discord relay stopped");
    }
}

/// Per-tick price lines would flood the channel
fn should_relay(message: &str) -> bool {
    !message.starts_with("Current price is approximately")
}

fn embed_for(message: &str) -> Value {
    let lower = message.to_lowercase();
    let color = if lower.contains("error") || lower.contains("failed") {
        COLOR_ERROR
    } else if lower.contains("confirmed") || lower.contains("complete") {
        COLOR_SUCCESS
    } else {
        COLOR_INFO
    };

    json!({
        "embeds": [{
            "description": message,
            "color": color,
            "footer": {
                "text": "Pool Sell Bot"
            },
            "timestamp": chrono::Utc::now().to_rfc3339()
        }]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_lines_not_relayed() {
        assert!(!should_relay("Current price is approximately 0.5 USDT per UPiT"));
        assert!(should_relay("Transaction confirmed. Your sell is complete!"));
    }

    #[test]
    fn test_embed_color() {
        let embed = embed_for("Error during the sale: reverted. Please try again.");
        assert_eq!(embed["embeds"][0]["color"], COLOR_ERROR);

        let embed = embed_for("Transaction confirmed. Your sell is complete!");
        assert_eq!(embed["embeds"][0]["color"], COLOR_SUCCESS);

        let embed = embed_for("The bot has been stopped.");
        assert_eq!(embed["embeds"][0]["color"], COLOR_INFO);
        assert_eq!(embed["embeds"][0]["description"], "The bot has been stopped.");
    }
}
