use serde::Deserialize;

/// Root engine configuration. Loaded from an optional TOML file and
/// environment variables with the prefix `ATTRIBUTION__`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub realtime: RealtimeConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeConfig {
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
    #[serde(default = "default_reconnect_base_ms")]
    pub reconnect_base_ms: u64,
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl_secs(),
            capacity: default_cache_capacity(),
        }
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            heartbeat_secs: default_heartbeat_secs(),
            reconnect_base_ms: default_reconnect_base_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: default_store_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl EngineConfig {
    /// Layer `attribution.toml` (if present) under env overrides, e.g.
    /// `ATTRIBUTION__CACHE__TTL_SECS=60`.
    pub fn load() -> anyhow::Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name("attribution").required(false))
            .add_source(config::Environment::with_prefix("ATTRIBUTION").separator("__"))
            .build()?;
        Ok(cfg.try_deserialize()?)
    }
}

// Default functions
fn default_cache_ttl_secs() -> u64 {
    300
}
fn default_cache_capacity() -> usize {
    10_000
}
fn default_heartbeat_secs() -> u64 {
    30
}
fn default_reconnect_base_ms() -> u64 {
    500
}
fn default_max_reconnect_attempts() -> u32 {
    5
}
fn default_store_url() -> String {
    "http://localhost:8080".to_string()
}
fn default_request_timeout_secs() -> u64 {
    10
}
