//! Seams to the external configuration store and touchpoint source. The
//! engine treats both as remote services; these traits keep it that way
//! and give tests something to plug in.

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use attribution_core::types::{
    ConfigStatus, ConversionRecord, ModelConfiguration, TimeRange, Touchpoint,
};
use attribution_core::EngineResult;

/// Remote persistence for model configurations.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Fetch the currently active configuration, if any.
    async fn fetch_active(&self) -> EngineResult<Option<ModelConfiguration>>;

    /// Persist a configuration; the response echoes the stored value.
    async fn persist(&self, config: &ModelConfiguration) -> EngineResult<ModelConfiguration>;
}

/// Upstream touchpoint/conversion event source for a time range.
#[async_trait]
pub trait TouchpointSource: Send + Sync {
    async fn fetch(
        &self,
        range: TimeRange,
    ) -> EngineResult<(Vec<Touchpoint>, Vec<ConversionRecord>)>;
}

/// DashMap-backed store for tests and local development. Keeps every
/// version it is handed, like the real store's audit trail.
#[derive(Default)]
pub struct InMemoryConfigStore {
    configs: DashMap<Uuid, ModelConfiguration>,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}

#[async_trait]
impl ConfigStore for InMemoryConfigStore {
    async fn fetch_active(&self) -> EngineResult<Option<ModelConfiguration>> {
        Ok(self
            .configs
            .iter()
            .find(|c| c.status == ConfigStatus::Active)
            .map(|c| c.clone()))
    }

    async fn persist(&self, config: &ModelConfiguration) -> EngineResult<ModelConfiguration> {
        // Demote any previously active configuration; the store never
        // holds two actives.
        if config.status == ConfigStatus::Active {
            for mut entry in self.configs.iter_mut() {
                if entry.status == ConfigStatus::Active {
                    entry.status = ConfigStatus::Archived;
                }
            }
        }
        self.configs.insert(config.id, config.clone());
        Ok(config.clone())
    }
}

/// Fixed-slice touchpoint source for tests.
#[derive(Default)]
pub struct InMemoryTouchpointSource {
    pub touchpoints: Vec<Touchpoint>,
    pub conversions: Vec<ConversionRecord>,
}

#[async_trait]
impl TouchpointSource for InMemoryTouchpointSource {
    async fn fetch(
        &self,
        range: TimeRange,
    ) -> EngineResult<(Vec<Touchpoint>, Vec<ConversionRecord>)> {
        let touchpoints = self
            .touchpoints
            .iter()
            .filter(|tp| tp.timestamp >= range.start && tp.timestamp < range.end)
            .cloned()
            .collect();
        let conversions = self
            .conversions
            .iter()
            .filter(|c| c.occurred_at >= range.start && c.occurred_at < range.end)
            .cloned()
            .collect();
        Ok((touchpoints, conversions))
    }
}
