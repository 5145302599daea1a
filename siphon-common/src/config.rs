//! Configuration for the Siphon learning core.
//!
//! Values resolve in priority order:
//!
//! 1. Explicit values set by the embedding application
//! 2. Environment variables (`SIPHON_*` prefix)
//! 3. Default values
//!
//! Environment variable mapping:
//! - `SIPHON_DATA_DIR` → `data_dir`
//! - `SIPHON_STORE_DEBOUNCE_MS` → `store.debounce_ms`
//! - `SIPHON_DISCOVERY_CACHE_TTL_SECS` → `discovery.cache_ttl_secs`
//! - `SIPHON_DISCOVERY_SOURCE_TIMEOUT_SECS` → `discovery.source_timeout_secs`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration for the learning core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiphonConfig {
    /// Directory holding the pattern and session files.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Persistent store tuning.
    #[serde(default)]
    pub store: StoreConfig,

    /// Pattern registry tuning.
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Cross-site transfer tuning.
    #[serde(default)]
    pub transfer: TransferConfig,

    /// Documentation discovery tuning.
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Failure learning tuning.
    #[serde(default)]
    pub failure: FailureConfig,
}

impl Default for SiphonConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            store: StoreConfig::default(),
            registry: RegistryConfig::default(),
            transfer: TransferConfig::default(),
            discovery: DiscoveryConfig::default(),
            failure: FailureConfig::default(),
        }
    }
}

impl SiphonConfig {
    /// Load defaults, then apply `SIPHON_*` environment overrides.
    pub fn load() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("SIPHON_DATA_DIR") {
            if !dir.is_empty() {
                self.data_dir = PathBuf::from(dir);
            }
        }
        if let Some(ms) = env_u64("SIPHON_STORE_DEBOUNCE_MS") {
            self.store.debounce_ms = ms;
        }
        if let Some(secs) = env_u64("SIPHON_DISCOVERY_CACHE_TTL_SECS") {
            self.discovery.cache_ttl_secs = secs;
        }
        if let Some(secs) = env_u64("SIPHON_DISCOVERY_SOURCE_TIMEOUT_SECS") {
            self.discovery.source_timeout_secs = secs;
        }
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok()?.parse().ok()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".siphon")
}

/// Persistent store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Debounce window for write-behind saves, in milliseconds.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    500
}

/// Pattern registry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Patterns unused for this many days are archived by `cleanup`.
    #[serde(default = "default_archive_after_days")]
    pub archive_after_days: i64,

    /// Patterns below this confidence are archived by `cleanup`.
    #[serde(default = "default_confidence_floor")]
    pub confidence_floor: f64,

    /// Confidence change that triggers a `confidence_decayed` event.
    #[serde(default = "default_confidence_epsilon")]
    pub confidence_epsilon: f64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            archive_after_days: default_archive_after_days(),
            confidence_floor: default_confidence_floor(),
            confidence_epsilon: default_confidence_epsilon(),
        }
    }
}

fn default_archive_after_days() -> i64 {
    30
}

fn default_confidence_floor() -> f64 {
    0.2
}

fn default_confidence_epsilon() -> f64 {
    0.05
}

/// Cross-site transfer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Minimum similarity score required to transfer a pattern.
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f64,

    /// Confidence multiplier applied to transferred patterns.
    #[serde(default = "default_confidence_decay")]
    pub confidence_decay: f64,

    /// Maximum candidate patterns tried by auto-transfer.
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            min_similarity: default_min_similarity(),
            confidence_decay: default_confidence_decay(),
            max_candidates: default_max_candidates(),
        }
    }
}

fn default_min_similarity() -> f64 {
    0.3
}

fn default_confidence_decay() -> f64 {
    0.5
}

fn default_max_candidates() -> usize {
    3
}

/// Documentation discovery configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// TTL for the per-domain aggregate cache, in seconds.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Per-source call timeout, in seconds.
    #[serde(default = "default_source_timeout_secs")]
    pub source_timeout_secs: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl_secs(),
            source_timeout_secs: default_source_timeout_secs(),
        }
    }
}

fn default_cache_ttl_secs() -> u64 {
    3600
}

fn default_source_timeout_secs() -> u64 {
    30
}

/// Failure learning configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureConfig {
    /// Capacity of the per-pattern recent-failure ring.
    #[serde(default = "default_recent_failures_cap")]
    pub recent_failures_cap: usize,

    /// Failures of one category within the ring that trigger an anti-pattern.
    #[serde(default = "default_anti_pattern_threshold")]
    pub anti_pattern_threshold: usize,

    /// Anti-pattern lifetime, in hours.
    #[serde(default = "default_anti_pattern_ttl_hours")]
    pub anti_pattern_ttl_hours: i64,

    /// Maximum retry attempts for retryable failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for FailureConfig {
    fn default() -> Self {
        Self {
            recent_failures_cap: default_recent_failures_cap(),
            anti_pattern_threshold: default_anti_pattern_threshold(),
            anti_pattern_ttl_hours: default_anti_pattern_ttl_hours(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_recent_failures_cap() -> usize {
    20
}

fn default_anti_pattern_threshold() -> usize {
    3
}

fn default_anti_pattern_ttl_hours() -> i64 {
    24
}

fn default_max_retries() -> u32 {
    3
}
