//! Touchpoint sequence processor — turns raw touchpoint and conversion
//! records into ordered, window-filtered `TouchpointSequence` values.
//!
//! Pure function of its inputs: replaying the same records always yields
//! the same sequences, so results can be re-derived at any time.

use std::collections::HashMap;

use chrono::Duration;
use tracing::debug;

use attribution_core::types::{ConversionRecord, Touchpoint, TouchpointSequence};

/// Groups touchpoints per visitor, orders them, and applies the trailing
/// attribution window before any weight math sees them.
#[derive(Debug, Clone)]
pub struct SequenceProcessor {
    window_days: i64,
}

impl SequenceProcessor {
    pub fn new(window_days: i64) -> Self {
        Self { window_days }
    }

    /// Build one sequence per journey. Conversions anchor the window to
    /// the conversion instant; visitors with touchpoints but no conversion
    /// yield an unconverted sequence anchored at their latest touchpoint.
    /// Journeys whose touchpoints all fall outside the window are dropped.
    pub fn build_sequences(
        &self,
        touchpoints: &[Touchpoint],
        conversions: &[ConversionRecord],
    ) -> Vec<TouchpointSequence> {
        let mut by_visitor: HashMap<&str, Vec<&Touchpoint>> = HashMap::new();
        for tp in touchpoints {
            by_visitor.entry(tp.visitor_id.as_str()).or_default().push(tp);
        }

        let conversion_for: HashMap<&str, &ConversionRecord> = conversions
            .iter()
            .map(|c| (c.visitor_id.as_str(), c))
            .collect();

        let mut sequences = Vec::new();
        for (visitor_id, mut points) in by_visitor {
            points.sort_by_key(|tp| tp.timestamp);

            let (anchor, converted, value) = match conversion_for.get(visitor_id) {
                Some(conversion) => (conversion.occurred_at, true, conversion.value),
                None => match points.last() {
                    Some(last) => (last.timestamp, false, 0.0),
                    None => continue,
                },
            };

            let cutoff = anchor - Duration::days(self.window_days);
            let eligible: Vec<Touchpoint> = points
                .into_iter()
                .filter(|tp| tp.timestamp >= cutoff && tp.timestamp <= anchor)
                .cloned()
                .collect();

            if eligible.is_empty() {
                debug!(visitor_id, "all touchpoints outside attribution window");
                continue;
            }

            sequences.push(TouchpointSequence {
                journey_id: visitor_id.to_string(),
                touchpoints: eligible,
                converted,
                conversion_value: value,
                converted_at: anchor,
            });
        }

        // Map iteration order is arbitrary; keep output stable for replay.
        sequences.sort_by(|a, b| a.journey_id.cmp(&b.journey_id));
        sequences
    }
}
