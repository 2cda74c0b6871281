//! REST client for the external configuration store and touchpoint API.
//! Every request is bounded by the configured timeout; callers get a
//! result or an error, never an indefinite hang.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;

use attribution_core::config::StoreConfig;
use attribution_core::types::{
    AttributionResult, ConversionRecord, ModelConfiguration, TimeRange, Touchpoint,
    ValidationError,
};
use attribution_core::{AttributionError, EngineResult};

use crate::store::{ConfigStore, TouchpointSource};

pub struct RestConfigStore {
    client: reqwest::Client,
    base_url: String,
}

impl RestConfigStore {
    pub fn new(config: &StoreConfig) -> EngineResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| AttributionError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Ask the compute service for results for one model over a range.
    pub async fn trigger_analysis(
        &self,
        config_id: uuid::Uuid,
        range: TimeRange,
    ) -> EngineResult<Vec<AttributionResult>> {
        let response = self
            .client
            .post(self.url("/attribution/analysis"))
            .json(&serde_json::json!({
                "config_id": config_id,
                "start": range.start,
                "end": range.end,
            }))
            .send()
            .await
            .map_err(|e| AttributionError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AttributionError::Transport(format!(
                "POST /attribution/analysis returned {}",
                response.status()
            )));
        }

        response
            .json::<Vec<AttributionResult>>()
            .await
            .map_err(|e| AttributionError::Transport(e.to_string()))
    }
}

#[async_trait]
impl ConfigStore for RestConfigStore {
    async fn fetch_active(&self) -> EngineResult<Option<ModelConfiguration>> {
        let response = self
            .client
            .get(self.url("/attribution/models"))
            .send()
            .await
            .map_err(|e| AttributionError::Transport(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let config = response
                    .json::<ModelConfiguration>()
                    .await
                    .map_err(|e| AttributionError::Transport(e.to_string()))?;
                Ok(Some(config))
            }
            status => Err(AttributionError::Transport(format!(
                "GET /attribution/models returned {}",
                status
            ))),
        }
    }

    async fn persist(&self, config: &ModelConfiguration) -> EngineResult<ModelConfiguration> {
        let response = self
            .client
            .put(self.url("/attribution/models"))
            .json(config)
            .send()
            .await
            .map_err(|e| AttributionError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_client_error() {
            // The store re-validates; surface its error list as ours.
            let errors = response
                .json::<Vec<ValidationError>>()
                .await
                .map_err(|e| AttributionError::Transport(e.to_string()))?;
            return Err(AttributionError::Validation(errors));
        }
        if !status.is_success() {
            return Err(AttributionError::Transport(format!(
                "PUT /attribution/models returned {}",
                status
            )));
        }

        debug!(config_id = %config.id, "configuration persisted");
        response
            .json::<ModelConfiguration>()
            .await
            .map_err(|e| AttributionError::Transport(e.to_string()))
    }
}

#[async_trait]
impl TouchpointSource for RestConfigStore {
    async fn fetch(
        &self,
        range: TimeRange,
    ) -> EngineResult<(Vec<Touchpoint>, Vec<ConversionRecord>)> {
        #[derive(serde::Deserialize)]
        struct TouchpointPage {
            touchpoints: Vec<Touchpoint>,
            #[serde(default)]
            conversions: Vec<ConversionRecord>,
        }

        let response = self
            .client
            .get(self.url("/attribution/touchpoints"))
            .query(&[
                ("start", range.start.to_rfc3339()),
                ("end", range.end.to_rfc3339()),
            ])
            .send()
            .await
            .map_err(|e| AttributionError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AttributionError::Transport(format!(
                "GET /attribution/touchpoints returned {}",
                response.status()
            )));
        }

        let page = response
            .json::<TouchpointPage>()
            .await
            .map_err(|e| AttributionError::Transport(e.to_string()))?;
        Ok((page.touchpoints, page.conversions))
    }
}
