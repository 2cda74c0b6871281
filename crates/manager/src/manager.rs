//! Configuration manager — owns the active configuration and orchestrates
//! validate → persist → invalidate → broadcast for every change.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use tracing::{info, warn};

use attribution_cache::{CacheKey, ResultCache};
use attribution_core::bus::{EngineUpdate, UpdateBus};
use attribution_core::types::{
    AttributionResult, ConfigStatus, ModelConfiguration, TimeRange, ValidationRules,
};
use attribution_core::{AttributionError, EngineResult};
use attribution_engine::calculator::compute_weights;
use attribution_engine::sequence::SequenceProcessor;
use attribution_engine::validator::{validate, validate_model_name};

use crate::store::{ConfigStore, TouchpointSource};

/// Owns the active `ModelConfiguration` and the audit trail of superseded
/// ones. Configuration updates are serialized: a second update while one
/// is in flight gets `AttributionError::Busy` immediately.
pub struct ConfigurationManager {
    store: Arc<dyn ConfigStore>,
    cache: Arc<ResultCache>,
    bus: UpdateBus,
    rules: ValidationRules,
    active: RwLock<Option<ModelConfiguration>>,
    archived: RwLock<Vec<ModelConfiguration>>,
    update_gate: tokio::sync::Mutex<()>,
}

impl ConfigurationManager {
    pub fn new(store: Arc<dyn ConfigStore>, cache: Arc<ResultCache>, bus: UpdateBus) -> Self {
        Self {
            store,
            cache,
            bus,
            rules: ValidationRules::default(),
            active: RwLock::new(None),
            archived: RwLock::new(Vec::new()),
            update_gate: tokio::sync::Mutex::new(()),
        }
    }

    pub fn with_rules(mut self, rules: ValidationRules) -> Self {
        self.rules = rules;
        self
    }

    /// Read accessor for the active configuration.
    pub fn active(&self) -> Option<ModelConfiguration> {
        self.active.read().clone()
    }

    /// Superseded configurations, oldest first. Kept for audit; never
    /// deleted.
    pub fn archived(&self) -> Vec<ModelConfiguration> {
        self.archived.read().clone()
    }

    pub fn rules(&self) -> &ValidationRules {
        &self.rules
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<EngineUpdate> {
        self.bus.subscribe()
    }

    /// Seed the active configuration from the store on startup.
    pub async fn refresh_from_store(&self) -> EngineResult<()> {
        if let Some(config) = self.store.fetch_active().await? {
            info!(config_id = %config.id, "loaded active configuration from store");
            *self.active.write() = Some(config);
        }
        Ok(())
    }

    /// Validate, persist, and activate a candidate configuration.
    ///
    /// On validation failure nothing is persisted, the cache is left
    /// alone, and the previously active configuration stays fully in
    /// effect; the caller gets the untouched error list.
    pub async fn apply(&self, candidate: ModelConfiguration) -> EngineResult<ModelConfiguration> {
        let _gate = self
            .update_gate
            .try_lock()
            .map_err(|_| AttributionError::Busy)?;

        let errors = validate(&candidate, &self.rules);
        if !errors.is_empty() {
            info!(
                config_id = %candidate.id,
                error_count = errors.len(),
                "candidate configuration rejected"
            );
            return Err(AttributionError::Validation(errors));
        }

        let mut promoted = candidate;
        promoted.status = ConfigStatus::Active;
        promoted.version = self
            .active
            .read()
            .as_ref()
            .map(|c| c.version + 1)
            .unwrap_or(1);
        promoted.updated_at = Utc::now();

        // Persist before touching any local state: a store failure must
        // leave the previous configuration fully in effect.
        let persisted = self.store.persist(&promoted).await?;

        {
            let mut active = self.active.write();
            if let Some(mut previous) = active.take() {
                previous.status = ConfigStatus::Archived;
                self.archived.write().push(previous);
            }
            *active = Some(persisted.clone());
        }

        // Every cached weight depends on the configuration.
        self.cache.invalidate_all();

        info!(config_id = %persisted.id, version = persisted.version, "configuration activated");
        self.bus.publish(EngineUpdate::ConfigChanged {
            config: Box::new(persisted.clone()),
        });

        Ok(persisted)
    }

    /// Accept a raw JSON candidate, turning an unknown `model` kind into a
    /// `ValidationError` with the `UNKNOWN_MODEL` code instead of a
    /// deserialization failure.
    pub async fn apply_json(&self, value: serde_json::Value) -> EngineResult<ModelConfiguration> {
        if let Some(name) = value.get("model").and_then(|m| m.as_str()) {
            if let Err(err) = validate_model_name(name) {
                return Err(AttributionError::Validation(vec![err]));
            }
        }
        let candidate: ModelConfiguration = serde_json::from_value(value)?;
        self.apply(candidate).await
    }

    /// Fetch touchpoints for a range, build sequences under the active
    /// configuration, and compute results through the cache. Sequences
    /// that fail to compute are skipped and logged, never zero-filled.
    pub async fn compute_for_range(
        &self,
        source: &dyn TouchpointSource,
        range: TimeRange,
    ) -> EngineResult<Vec<AttributionResult>> {
        let config = self
            .active()
            .ok_or_else(|| AttributionError::Config("no active configuration".to_string()))?;

        let (touchpoints, conversions) = source.fetch(range).await?;
        let processor = SequenceProcessor::new(config.attribution_window_days());

        let mut results = Vec::new();
        for sequence in processor.build_sequences(&touchpoints, &conversions) {
            let key = CacheKey {
                journey_id: sequence.journey_id.clone(),
                config_id: config.id,
                config_version: config.version,
                range_secs: range.endpoints(),
            };

            if let Some(cached) = self.cache.get(&key) {
                results.push(cached);
                continue;
            }

            match compute_weights(&sequence, &config) {
                Ok(result) => {
                    self.cache.put(key, result.clone());
                    results.push(result);
                }
                Err(err) => {
                    warn!(journey_id = %sequence.journey_id, %err, "skipping sequence");
                }
            }
        }

        if !results.is_empty() {
            self.bus.publish(EngineUpdate::Results {
                results: results.clone(),
            });
        }
        Ok(results)
    }
}
