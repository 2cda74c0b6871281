//! Attribution computation — configuration validation, per-model weight
//! assignment, and touchpoint sequence normalization.

pub mod calculator;
pub mod sequence;
pub mod validator;

pub use calculator::compute_weights;
pub use sequence::SequenceProcessor;
pub use validator::{is_valid, validate};
