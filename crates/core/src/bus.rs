//! Engine update bus — fan-out of computed results and configuration
//! changes to whoever is listening (presentation layers, the realtime
//! channel's subscribers, tests).

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::types::{AttributionResult, ModelConfiguration};

/// A notification pushed to engine subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineUpdate {
    /// Freshly computed results, locally or via the push channel.
    Results { results: Vec<AttributionResult> },
    /// A new configuration was validated, persisted, and activated.
    ConfigChanged { config: Box<ModelConfiguration> },
    /// The realtime channel exhausted its retry budget and went down.
    /// Emitted exactly once per terminal disconnect.
    ChannelDown { reason: String },
}

/// Broadcast wrapper shared by the manager and the realtime channel.
/// Slow subscribers lag rather than block publishers.
#[derive(Debug, Clone)]
pub struct UpdateBus {
    tx: broadcast::Sender<EngineUpdate>,
}

impl UpdateBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineUpdate> {
        self.tx.subscribe()
    }

    /// Publish to all current subscribers. A send with no subscribers is
    /// not an error.
    pub fn publish(&self, update: EngineUpdate) {
        let _ = self.tx.send(update);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for UpdateBus {
    fn default() -> Self {
        Self::new(128)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let bus = UpdateBus::new(8);
        let mut rx = bus.subscribe();

        bus.publish(EngineUpdate::ChannelDown {
            reason: "test".to_string(),
        });

        match rx.recv().await.unwrap() {
            EngineUpdate::ChannelDown { reason } => assert_eq!(reason, "test"),
            other => panic!("unexpected update: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let bus = UpdateBus::new(8);
        bus.publish(EngineUpdate::Results { results: vec![] });
        assert_eq!(bus.subscriber_count(), 0);
    }
}
