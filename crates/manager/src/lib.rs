//! Configuration management — validate, persist, and broadcast attribution
//! configuration changes, and orchestrate on-demand computation.

pub mod manager;
pub mod rest;
pub mod store;

pub use manager::ConfigurationManager;
pub use rest::RestConfigStore;
pub use store::{ConfigStore, InMemoryConfigStore, InMemoryTouchpointSource, TouchpointSource};
