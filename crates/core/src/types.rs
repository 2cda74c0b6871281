use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ComputeError;

/// Marketing source/medium. Fixed vocabulary; new channels are a schema
/// change, not runtime data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    PaidSearch,
    OrganicSocial,
    Email,
    Direct,
    Referral,
    Display,
    Affiliate,
    Video,
}

impl Channel {
    pub const ALL: [Channel; 8] = [
        Channel::PaidSearch,
        Channel::OrganicSocial,
        Channel::Email,
        Channel::Direct,
        Channel::Referral,
        Channel::Display,
        Channel::Affiliate,
        Channel::Video,
    ];
}

/// Typed touchpoint metadata with an open `extra` map for fields the
/// upstream collector adds faster than we model them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TouchpointMeta {
    #[serde(default)]
    pub campaign: Option<String>,
    #[serde(default)]
    pub cost: Option<f64>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, serde_json::Value>,
}

/// One recorded marketing interaction. Owned by the upstream event store;
/// this engine only reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Touchpoint {
    pub id: Uuid,
    pub visitor_id: String,
    pub channel: Channel,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: TouchpointMeta,
}

/// The terminal, value-bearing event a journey leads to. Supplied by the
/// upstream event store alongside raw touchpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionRecord {
    pub visitor_id: String,
    pub value: f64,
    pub occurred_at: DateTime<Utc>,
}

/// The ordered touchpoints of one conversion journey.
///
/// Invariants: at least one touchpoint, timestamps non-decreasing. The
/// sequence processor is the only producer and upholds both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TouchpointSequence {
    pub journey_id: String,
    pub touchpoints: Vec<Touchpoint>,
    pub converted: bool,
    pub conversion_value: f64,
    pub converted_at: DateTime<Utc>,
}

/// Attribution model kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    FirstTouch,
    LastTouch,
    Linear,
    TimeDecay,
    PositionBased,
    Custom,
}

impl FromStr for ModelKind {
    type Err = ComputeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first_touch" => Ok(ModelKind::FirstTouch),
            "last_touch" => Ok(ModelKind::LastTouch),
            "linear" => Ok(ModelKind::Linear),
            "time_decay" => Ok(ModelKind::TimeDecay),
            "position_based" => Ok(ModelKind::PositionBased),
            "custom" => Ok(ModelKind::Custom),
            other => Err(ComputeError::UnknownModel(other.to_string())),
        }
    }
}

/// Credit split for the position-based model. Fractions, not percents.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PositionSplit {
    pub first: f64,
    pub middle: f64,
    pub last: f64,
}

impl Default for PositionSplit {
    fn default() -> Self {
        Self {
            first: 0.4,
            middle: 0.2,
            last: 0.4,
        }
    }
}

impl PositionSplit {
    pub fn total(&self) -> f64 {
        self.first + self.middle + self.last
    }
}

/// The attribution time window a configuration covers. Its length in days
/// is the trailing eligibility span applied before each conversion.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AttributionWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl AttributionWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Window length in whole days. Negative when end precedes start;
    /// the validator rejects that case.
    pub fn length_days(&self) -> i64 {
        self.end.signed_duration_since(self.start).num_days()
    }
}

/// Half-open query range for touchpoint fetches and analysis requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// Exact epoch-second endpoints, used in cache keys so two distinct
    /// ranges never share an entry.
    pub fn endpoints(&self) -> (i64, i64) {
        (self.start.timestamp(), self.end.timestamp())
    }
}

/// Configuration lifecycle. At most one configuration is `Active`;
/// superseded ones move to `Archived` and are kept for audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigStatus {
    Draft,
    Active,
    Archived,
}

/// A candidate or active attribution model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfiguration {
    pub id: Uuid,
    pub model: ModelKind,
    /// Per-channel weight in percent units; expected to total 100.
    pub channel_weights: HashMap<Channel, f64>,
    pub window: AttributionWindow,
    /// Required when `model` is `TimeDecay`.
    #[serde(default)]
    pub decay_half_life_days: Option<f64>,
    /// Overrides the default 40/20/40 split for `PositionBased`.
    #[serde(default)]
    pub position_split: Option<PositionSplit>,
    pub status: ConfigStatus,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ModelConfiguration {
    pub fn attribution_window_days(&self) -> i64 {
        self.window.length_days()
    }
}

/// Static validation bounds. Global and read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationRules {
    pub min_channel_weight: f64,
    pub max_channel_weight: f64,
    pub total_weight_sum: f64,
    pub weight_sum_tolerance: f64,
    pub min_window_days: i64,
    pub max_window_days: i64,
    pub min_decay_half_life_days: f64,
    pub max_decay_half_life_days: f64,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            min_channel_weight: 0.0,
            max_channel_weight: 100.0,
            total_weight_sum: 100.0,
            weight_sum_tolerance: 0.01,
            min_window_days: 1,
            max_window_days: 365,
            min_decay_half_life_days: 0.5,
            max_decay_half_life_days: 90.0,
        }
    }
}

/// Machine codes carried by `ValidationError`.
pub mod codes {
    pub const INVALID_CHANNEL_WEIGHT: &str = "INVALID_CHANNEL_WEIGHT";
    pub const INVALID_WEIGHT_SUM: &str = "INVALID_WEIGHT_SUM";
    pub const INVALID_WINDOW: &str = "INVALID_WINDOW";
    pub const INVALID_DECAY_HALF_LIFE: &str = "INVALID_DECAY_HALF_LIFE";
    pub const INVALID_POSITION_SPLIT: &str = "INVALID_POSITION_SPLIT";
    pub const UNKNOWN_MODEL: &str = "UNKNOWN_MODEL";
}

/// One user-correctable problem with a candidate configuration. Returned
/// as data, never raised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    pub field: String,
    pub messages: Vec<String>,
    pub code: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>, code: &str) -> Self {
        Self {
            field: field.into(),
            messages: vec![message.into()],
            code: code.to_string(),
        }
    }
}

/// Credit assigned to a single touchpoint by one computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TouchpointCredit {
    pub touchpoint_id: Uuid,
    pub channel: Channel,
    /// Fraction of conversion credit in [0, 1].
    pub weight: f64,
    pub attributed_revenue: f64,
}

/// The computed attribution for one sequence under one configuration.
/// Credit weights sum to 1.0 within 1e-6; the calculator enforces this
/// before the result is ever constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributionResult {
    pub journey_id: String,
    pub config_id: Uuid,
    pub config_version: u32,
    pub model: ModelKind,
    pub credits: Vec<TouchpointCredit>,
    pub conversion_value: f64,
    pub computed_at: DateTime<Utc>,
}

impl AttributionResult {
    pub fn total_weight(&self) -> f64 {
        self.credits.iter().map(|c| c.weight).sum()
    }
}
