//! Validation rules evaluator. Pure functions; every check runs so the
//! caller sees all problems in one pass, not just the first.

use attribution_core::types::{codes, ModelConfiguration, ModelKind, ValidationError, ValidationRules};

/// Check a candidate configuration against the static bounds. An empty
/// list means the configuration is acceptable. Never panics.
pub fn validate(config: &ModelConfiguration, rules: &ValidationRules) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    // Per-channel weight bounds.
    for (channel, weight) in &config.channel_weights {
        if !weight.is_finite()
            || *weight < rules.min_channel_weight
            || *weight > rules.max_channel_weight
        {
            errors.push(ValidationError::new(
                format!("channel_weights.{:?}", channel),
                format!(
                    "weight {} outside [{}, {}]",
                    weight, rules.min_channel_weight, rules.max_channel_weight
                ),
                codes::INVALID_CHANNEL_WEIGHT,
            ));
        }
    }

    // Total weight must hit the required sum within floating-point slack.
    let total: f64 = config.channel_weights.values().sum();
    if (total - rules.total_weight_sum).abs() > rules.weight_sum_tolerance {
        errors.push(ValidationError::new(
            "channel_weights",
            format!(
                "weights sum to {}, expected {} (±{})",
                total, rules.total_weight_sum, rules.weight_sum_tolerance
            ),
            codes::INVALID_WEIGHT_SUM,
        ));
    }

    // Window sanity: end after start, length within bounds.
    let days = config.window.length_days();
    if config.window.end < config.window.start {
        errors.push(ValidationError::new(
            "window",
            "window end precedes window start",
            codes::INVALID_WINDOW,
        ));
    } else if days < rules.min_window_days || days > rules.max_window_days {
        errors.push(ValidationError::new(
            "window",
            format!(
                "window length {} days outside [{}, {}]",
                days, rules.min_window_days, rules.max_window_days
            ),
            codes::INVALID_WINDOW,
        ));
    }

    // Time-decay needs a half-life inside the allowed range.
    if config.model == ModelKind::TimeDecay {
        match config.decay_half_life_days {
            Some(hl)
                if hl.is_finite()
                    && hl >= rules.min_decay_half_life_days
                    && hl <= rules.max_decay_half_life_days => {}
            Some(hl) => {
                errors.push(ValidationError::new(
                    "decay_half_life_days",
                    format!(
                        "half-life {} outside [{}, {}]",
                        hl, rules.min_decay_half_life_days, rules.max_decay_half_life_days
                    ),
                    codes::INVALID_DECAY_HALF_LIFE,
                ));
            }
            None => {
                errors.push(ValidationError::new(
                    "decay_half_life_days",
                    "time-decay model requires a decay half-life",
                    codes::INVALID_DECAY_HALF_LIFE,
                ));
            }
        }
    }

    // A supplied position split must itself total 1.
    if let Some(split) = &config.position_split {
        if (split.total() - 1.0).abs() > rules.weight_sum_tolerance
            || split.first < 0.0
            || split.middle < 0.0
            || split.last < 0.0
        {
            errors.push(ValidationError::new(
                "position_split",
                format!("split fractions total {}, expected 1.0", split.total()),
                codes::INVALID_POSITION_SPLIT,
            ));
        }
    }

    // Custom dispatch has nothing to multiply against without weights.
    if config.model == ModelKind::Custom && config.channel_weights.is_empty() {
        errors.push(ValidationError::new(
            "channel_weights",
            "custom model requires per-channel weights",
            codes::INVALID_CHANNEL_WEIGHT,
        ));
    }

    errors
}

/// A configuration is valid iff `validate` returns no errors.
pub fn is_valid(config: &ModelConfiguration, rules: &ValidationRules) -> bool {
    validate(config, rules).is_empty()
}

/// Resolve a wire-level model name, mapping unknown kinds to the
/// `UNKNOWN_MODEL` code instead of a deserialization panic downstream.
pub fn validate_model_name(name: &str) -> Result<ModelKind, ValidationError> {
    name.parse::<ModelKind>().map_err(|_| {
        ValidationError::new(
            "model",
            format!("unknown attribution model: {}", name),
            codes::UNKNOWN_MODEL,
        )
    })
}
