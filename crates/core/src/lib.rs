//! Shared domain types, error taxonomy, configuration, and the engine
//! update bus for the AttributionExpress computation engine.

pub mod bus;
pub mod config;
pub mod error;
pub mod types;

pub use error::{AttributionError, ComputeError, EngineResult};
