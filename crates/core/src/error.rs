use thiserror::Error;

use crate::types::ValidationError;

pub type EngineResult<T> = Result<T, AttributionError>;

/// Failure while computing weights for a single sequence. One bad
/// sequence must not halt processing of the rest, so these are returned
/// per sequence and never bubble as panics.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ComputeError {
    #[error("sequence has no touchpoints")]
    EmptySequence,

    #[error("unknown attribution model: {0}")]
    UnknownModel(String),

    #[error("time-decay model requires a decay half-life")]
    MissingHalfLife,

    #[error("custom channel weights sum to zero across the sequence")]
    ZeroWeightTotal,

    #[error("computed weights sum to {0}, expected 1.0")]
    WeightSumViolation(f64),
}

#[derive(Error, Debug)]
pub enum AttributionError {
    /// Candidate configuration rejected; the full list is preserved so
    /// the caller sees every problem at once.
    #[error("configuration failed validation ({} error(s))", .0.len())]
    Validation(Vec<ValidationError>),

    #[error("computation error: {0}")]
    Computation(#[from] ComputeError),

    #[error("transport error: {0}")]
    Transport(String),

    /// Another configuration update is in flight. Returned immediately,
    /// never queued silently.
    #[error("configuration update already in progress")]
    Busy,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
