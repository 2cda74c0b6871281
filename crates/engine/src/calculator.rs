//! Attribution calculator — per-model weight assignment over a touchpoint
//! sequence. Pure: the same sequence and configuration always produce the
//! same weights.

use attribution_core::error::ComputeError;
use attribution_core::types::{
    AttributionResult, ModelConfiguration, ModelKind, TouchpointCredit, TouchpointSequence,
};
use chrono::Utc;

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

const SECS_PER_DAY: f64 = 86_400.0;

/// Compute credit weights for one sequence under one configuration.
///
/// Post-condition: the returned weights sum to 1.0 within 1e-6. A sum
/// violation is returned as an error rather than silently mis-attributing
/// revenue.
pub fn compute_weights(
    sequence: &TouchpointSequence,
    config: &ModelConfiguration,
) -> Result<AttributionResult, ComputeError> {
    if sequence.touchpoints.is_empty() {
        return Err(ComputeError::EmptySequence);
    }

    let weights = match config.model {
        ModelKind::FirstTouch => single_touch(sequence, 0),
        ModelKind::LastTouch => single_touch(sequence, sequence.touchpoints.len() - 1),
        ModelKind::Linear => linear(sequence),
        ModelKind::TimeDecay => time_decay(sequence, config)?,
        ModelKind::PositionBased => position_based(sequence, config),
        ModelKind::Custom => custom(sequence, config)?,
    };

    let total: f64 = weights.iter().sum();
    if (total - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        return Err(ComputeError::WeightSumViolation(total));
    }

    let credits = sequence
        .touchpoints
        .iter()
        .zip(weights.iter())
        .map(|(tp, w)| TouchpointCredit {
            touchpoint_id: tp.id,
            channel: tp.channel,
            weight: *w,
            attributed_revenue: *w * sequence.conversion_value,
        })
        .collect();

    Ok(AttributionResult {
        journey_id: sequence.journey_id.clone(),
        config_id: config.id,
        config_version: config.version,
        model: config.model,
        credits,
        conversion_value: sequence.conversion_value,
        computed_at: Utc::now(),
    })
}

/// First-touch and last-touch: all credit to one index.
fn single_touch(sequence: &TouchpointSequence, index: usize) -> Vec<f64> {
    let mut weights = vec![0.0; sequence.touchpoints.len()];
    weights[index] = 1.0;
    weights
}

fn linear(sequence: &TouchpointSequence) -> Vec<f64> {
    let n = sequence.touchpoints.len();
    vec![1.0 / n as f64; n]
}

/// Raw score `2^(-age_days / half_life)` against the conversion event,
/// then normalized. Normalization runs even for a single touchpoint.
fn time_decay(
    sequence: &TouchpointSequence,
    config: &ModelConfiguration,
) -> Result<Vec<f64>, ComputeError> {
    let half_life = match config.decay_half_life_days {
        Some(hl) if hl > 0.0 => hl,
        _ => return Err(ComputeError::MissingHalfLife),
    };

    let scores: Vec<f64> = sequence
        .touchpoints
        .iter()
        .map(|tp| {
            let age_days = sequence
                .converted_at
                .signed_duration_since(tp.timestamp)
                .num_seconds() as f64
                / SECS_PER_DAY;
            // Touchpoints logged after the conversion get no extra boost.
            let age_days = age_days.max(0.0);
            2f64.powf(-age_days / half_life)
        })
        .collect();

    Ok(normalize(scores))
}

/// Configurable first/middle/last split, default 40/20/40. Sequences of
/// length 1 and 2 collapse: no middle share, and for length 1 all credit
/// goes to the only touchpoint.
fn position_based(sequence: &TouchpointSequence, config: &ModelConfiguration) -> Vec<f64> {
    let split = config.position_split.unwrap_or_default();
    let n = sequence.touchpoints.len();

    match n {
        1 => vec![1.0],
        2 => {
            let edge_total = split.first + split.last;
            vec![split.first / edge_total, split.last / edge_total]
        }
        _ => {
            let middle_each = split.middle / (n - 2) as f64;
            let mut weights = vec![middle_each; n];
            weights[0] = split.first;
            weights[n - 1] = split.last;
            weights
        }
    }
}

/// Per-channel multipliers from the configuration, normalized across the
/// sequence.
fn custom(
    sequence: &TouchpointSequence,
    config: &ModelConfiguration,
) -> Result<Vec<f64>, ComputeError> {
    let scores: Vec<f64> = sequence
        .touchpoints
        .iter()
        .map(|tp| config.channel_weights.get(&tp.channel).copied().unwrap_or(0.0))
        .collect();

    if scores.iter().sum::<f64>() <= 0.0 {
        return Err(ComputeError::ZeroWeightTotal);
    }

    Ok(normalize(scores))
}

fn normalize(scores: Vec<f64>) -> Vec<f64> {
    let total: f64 = scores.iter().sum();
    scores.into_iter().map(|s| s / total).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use attribution_core::types::{
        AttributionWindow, Channel, ConfigStatus, PositionSplit, Touchpoint, TouchpointMeta,
    };
    use chrono::{DateTime, Duration, Utc};
    use std::collections::HashMap;
    use uuid::Uuid;

    fn make_touchpoint(channel: Channel, timestamp: DateTime<Utc>) -> Touchpoint {
        Touchpoint {
            id: Uuid::new_v4(),
            visitor_id: "visitor-1".to_string(),
            channel,
            timestamp,
            metadata: TouchpointMeta::default(),
        }
    }

    /// Social@t0, Email@t0+2d, PaidSearch@t0+5d, converting at t0+5d for $100.
    fn make_sequence() -> TouchpointSequence {
        let t0 = Utc::now() - Duration::days(5);
        TouchpointSequence {
            journey_id: "journey-1".to_string(),
            touchpoints: vec![
                make_touchpoint(Channel::OrganicSocial, t0),
                make_touchpoint(Channel::Email, t0 + Duration::days(2)),
                make_touchpoint(Channel::PaidSearch, t0 + Duration::days(5)),
            ],
            converted: true,
            conversion_value: 100.0,
            converted_at: t0 + Duration::days(5),
        }
    }

    fn make_config(model: ModelKind) -> ModelConfiguration {
        let now = Utc::now();
        ModelConfiguration {
            id: Uuid::new_v4(),
            model,
            channel_weights: HashMap::new(),
            window: AttributionWindow::new(now - Duration::days(30), now),
            decay_half_life_days: Some(7.0),
            position_split: None,
            status: ConfigStatus::Active,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    fn assert_sums_to_one(result: &AttributionResult) {
        assert!(
            (result.total_weight() - 1.0).abs() < 1e-6,
            "weights sum to {}",
            result.total_weight()
        );
    }

    #[test]
    fn test_first_touch() {
        let result = compute_weights(&make_sequence(), &make_config(ModelKind::FirstTouch)).unwrap();
        assert_eq!(result.credits[0].weight, 1.0);
        assert_eq!(result.credits[1].weight, 0.0);
        assert_eq!(result.credits[2].weight, 0.0);
        assert_eq!(result.credits[0].attributed_revenue, 100.0);
        assert_sums_to_one(&result);
    }

    #[test]
    fn test_last_touch() {
        let result = compute_weights(&make_sequence(), &make_config(ModelKind::LastTouch)).unwrap();
        assert_eq!(result.credits[2].weight, 1.0);
        assert_eq!(result.credits[2].channel, Channel::PaidSearch);
        assert_sums_to_one(&result);
    }

    #[test]
    fn test_linear_splits_evenly() {
        let result = compute_weights(&make_sequence(), &make_config(ModelKind::Linear)).unwrap();
        for credit in &result.credits {
            assert!((credit.weight - 1.0 / 3.0).abs() < 1e-9);
            assert!((credit.attributed_revenue - 100.0 / 3.0).abs() < 1e-6);
        }
        assert_sums_to_one(&result);
    }

    #[test]
    fn test_time_decay_favors_recent() {
        let result = compute_weights(&make_sequence(), &make_config(ModelKind::TimeDecay)).unwrap();
        // Monotonically non-decreasing toward the conversion.
        assert!(result.credits[0].weight < result.credits[1].weight);
        assert!(result.credits[1].weight < result.credits[2].weight);
        // Last touchpoint is at the conversion instant: raw score 1.0.
        assert_sums_to_one(&result);
    }

    #[test]
    fn test_time_decay_half_life_ratio() {
        // Two touchpoints exactly one half-life apart: older scores half.
        let t = Utc::now();
        let sequence = TouchpointSequence {
            journey_id: "journey-hl".to_string(),
            touchpoints: vec![
                make_touchpoint(Channel::Email, t - Duration::days(7)),
                make_touchpoint(Channel::PaidSearch, t),
            ],
            converted: true,
            conversion_value: 30.0,
            converted_at: t,
        };
        let result = compute_weights(&sequence, &make_config(ModelKind::TimeDecay)).unwrap();
        assert!((result.credits[0].weight - 1.0 / 3.0).abs() < 1e-6);
        assert!((result.credits[1].weight - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_time_decay_single_touchpoint_normalizes_to_one() {
        let t = Utc::now();
        let sequence = TouchpointSequence {
            journey_id: "journey-single".to_string(),
            touchpoints: vec![make_touchpoint(Channel::Direct, t - Duration::days(20))],
            converted: true,
            conversion_value: 50.0,
            converted_at: t,
        };
        let result = compute_weights(&sequence, &make_config(ModelKind::TimeDecay)).unwrap();
        assert!((result.credits[0].weight - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_time_decay_missing_half_life() {
        let mut config = make_config(ModelKind::TimeDecay);
        config.decay_half_life_days = None;
        let err = compute_weights(&make_sequence(), &config).unwrap_err();
        assert_eq!(err, ComputeError::MissingHalfLife);
    }

    #[test]
    fn test_position_based_default_split() {
        let result =
            compute_weights(&make_sequence(), &make_config(ModelKind::PositionBased)).unwrap();
        assert!((result.credits[0].weight - 0.4).abs() < 1e-9); // Social, first
        assert!((result.credits[1].weight - 0.2).abs() < 1e-9); // Email, middle
        assert!((result.credits[2].weight - 0.4).abs() < 1e-9); // PaidSearch, last
        assert_sums_to_one(&result);
    }

    #[test]
    fn test_position_based_collapses_for_short_sequences() {
        let t = Utc::now();
        let config = make_config(ModelKind::PositionBased);

        let single = TouchpointSequence {
            journey_id: "journey-1tp".to_string(),
            touchpoints: vec![make_touchpoint(Channel::Email, t)],
            converted: true,
            conversion_value: 10.0,
            converted_at: t,
        };
        let result = compute_weights(&single, &config).unwrap();
        assert_eq!(result.credits[0].weight, 1.0);

        let pair = TouchpointSequence {
            journey_id: "journey-2tp".to_string(),
            touchpoints: vec![
                make_touchpoint(Channel::Email, t - Duration::days(1)),
                make_touchpoint(Channel::PaidSearch, t),
            ],
            converted: true,
            conversion_value: 10.0,
            converted_at: t,
        };
        let result = compute_weights(&pair, &config).unwrap();
        assert!((result.credits[0].weight - 0.5).abs() < 1e-9);
        assert!((result.credits[1].weight - 0.5).abs() < 1e-9);
        assert_sums_to_one(&result);
    }

    #[test]
    fn test_position_based_uneven_custom_split() {
        let mut config = make_config(ModelKind::PositionBased);
        config.position_split = Some(PositionSplit {
            first: 0.6,
            middle: 0.1,
            last: 0.3,
        });
        let result = compute_weights(&make_sequence(), &config).unwrap();
        assert!((result.credits[0].weight - 0.6).abs() < 1e-9);
        assert!((result.credits[1].weight - 0.1).abs() < 1e-9);
        assert!((result.credits[2].weight - 0.3).abs() < 1e-9);

        // Length-2 collapse renormalizes the edges of an uneven split.
        let t = Utc::now();
        let pair = TouchpointSequence {
            journey_id: "journey-2tp".to_string(),
            touchpoints: vec![
                make_touchpoint(Channel::Email, t - Duration::days(1)),
                make_touchpoint(Channel::PaidSearch, t),
            ],
            converted: true,
            conversion_value: 10.0,
            converted_at: t,
        };
        let result = compute_weights(&pair, &config).unwrap();
        assert!((result.credits[0].weight - 2.0 / 3.0).abs() < 1e-9);
        assert!((result.credits[1].weight - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_custom_model_normalizes_channel_multipliers() {
        let mut config = make_config(ModelKind::Custom);
        config.channel_weights.insert(Channel::OrganicSocial, 10.0);
        config.channel_weights.insert(Channel::Email, 10.0);
        config.channel_weights.insert(Channel::PaidSearch, 20.0);

        let result = compute_weights(&make_sequence(), &config).unwrap();
        assert!((result.credits[0].weight - 0.25).abs() < 1e-9);
        assert!((result.credits[1].weight - 0.25).abs() < 1e-9);
        assert!((result.credits[2].weight - 0.5).abs() < 1e-9);
        assert_sums_to_one(&result);
    }

    #[test]
    fn test_custom_model_zero_total_is_an_error() {
        let config = make_config(ModelKind::Custom); // no weights at all
        let err = compute_weights(&make_sequence(), &config).unwrap_err();
        assert_eq!(err, ComputeError::ZeroWeightTotal);
    }

    #[test]
    fn test_empty_sequence_rejected() {
        let mut sequence = make_sequence();
        sequence.touchpoints.clear();
        let err = compute_weights(&sequence, &make_config(ModelKind::Linear)).unwrap_err();
        assert_eq!(err, ComputeError::EmptySequence);
    }

    #[test]
    fn test_all_models_sum_to_one_across_lengths() {
        let t = Utc::now();
        let models = [
            ModelKind::FirstTouch,
            ModelKind::LastTouch,
            ModelKind::Linear,
            ModelKind::TimeDecay,
            ModelKind::PositionBased,
        ];
        for n in [1usize, 2, 7] {
            let touchpoints: Vec<Touchpoint> = (0..n)
                .map(|i| make_touchpoint(Channel::Display, t - Duration::hours((n - i) as i64)))
                .collect();
            let sequence = TouchpointSequence {
                journey_id: format!("journey-{}", n),
                touchpoints,
                converted: true,
                conversion_value: 42.0,
                converted_at: t,
            };
            for model in models {
                let result = compute_weights(&sequence, &make_config(model)).unwrap();
                assert_sums_to_one(&result);
                assert_eq!(result.credits.len(), n);
            }
        }
    }

    #[test]
    fn test_sorting_does_not_change_first_and_last_touch() {
        // Same events presented out of order, then sorted: the touchpoint
        // that receives credit must be identical.
        let sequence = make_sequence();
        let mut shuffled = sequence.clone();
        shuffled.touchpoints.reverse();
        shuffled.touchpoints.sort_by_key(|tp| tp.timestamp);

        for model in [ModelKind::FirstTouch, ModelKind::LastTouch] {
            let a = compute_weights(&sequence, &make_config(model)).unwrap();
            let b = compute_weights(&shuffled, &make_config(model)).unwrap();
            let credited_a = a.credits.iter().find(|c| c.weight == 1.0).unwrap();
            let credited_b = b.credits.iter().find(|c| c.weight == 1.0).unwrap();
            assert_eq!(credited_a.touchpoint_id, credited_b.touchpoint_id);
        }
    }
}
