//! Fan-out of bot status events to any number of observers

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::info;

/// Events are dropped for observers that lag this far behind
const CHANNEL_CAPACITY: usize = 256;

/// Event pushed to observers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum BotEvent {
    /// Human-readable status line
    BotMessage(String),
    /// Latest sampled price
    PriceUpdate(f64),
}

/// Broadcasts events; sending with no observers is not an error
#[derive(Clone)]
pub struct Notifier {
    tx: broadcast::Sender<BotEvent>,
}

impl Notifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BotEvent> {
        self.tx.subscribe()
    }

    /// Publish a status message (also logged)
    pub fn message(&self, text: impl Into<String>) {
        let text = text.into();
        info!("[Bot] {}", text);
        let _ = self.tx.send(BotEvent::BotMessage(text));
    }

    /// Publish a price sample
    pub fn price(&self, price: f64) {
        let _ = self.tx.send(BotEvent::PriceUpdate(price));
    }

    pub fn observer_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Collect every message currently queued on a receiver
#[cfg(test)]
pub fn drain_messages(rx: &mut broadcast::Receiver<BotEvent>) -> Vec<String> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let BotEvent::BotMessage(text) = event {
            out.push(text);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_format() {
        let json = serde_json::to_string(&BotEvent::BotMessage("hi".into())).unwrap();
        assert_eq!(json, r#"{"type":"botMessage","data":"hi"}"#);

        let json = serde_json::to_string(&BotEvent::PriceUpdate(0.5)).unwrap();
        assert_eq!(json, r#"{"type":"priceUpdate","data":0.5}"#);
    }

    #[test]
    fn test_every_observer_receives() {
        let notifier = Notifier::new();
        let mut a = notifier.subscribe();
        let mut b = notifier.subscribe();
        assert_eq!(notifier.observer_count(), 2);

        notifier.message("The bot has been stopped.");
        notifier.price(0.25);

        assert_eq!(a.try_recv().unwrap(), BotEvent::BotMessage("The bot has been stopped.".into()));
        assert_eq!(a.try_recv().unwrap(), BotEvent::PriceUpdate(0.25));
        assert_eq!(drain_messages(&mut b), vec!["The bot has been stopped.".to_string()]);
    }

    #[test]
    fn test_no_replay_for_late_observers() {
        let notifier = Notifier::new();
        notifier.message("early");
        let mut late = notifier.subscribe();
        assert!(late.try_recv().is_err());
    }
}
