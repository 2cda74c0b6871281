//! Push-channel wire messages.

use serde::{Deserialize, Serialize};
use tracing::debug;

use attribution_core::types::AttributionResult;

/// A message on the push channel, tagged by `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushMessage {
    /// Outbound keepalive; no reply expected. Inbound heartbeats are
    /// discarded.
    Heartbeat,
    /// Freshly computed results pushed by the compute service.
    AttributionUpdate { results: Vec<AttributionResult> },
}

/// Parse a raw frame. Unknown message types are ignored (returns `None`),
/// not treated as errors: the service is free to add new types before we
/// learn about them.
pub fn parse_frame(raw: &str) -> Option<PushMessage> {
    match serde_json::from_str::<PushMessage>(raw) {
        Ok(msg) => Some(msg),
        Err(err) => {
            debug!(%err, "ignoring unrecognized push frame");
            None
        }
    }
}
