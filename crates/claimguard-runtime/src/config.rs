//! Runtime configuration.
//!
//! Loaded from YAML (or JSON, which YAML accepts) and optionally overlaid
//! with `CLAIMGUARD_*` environment variables. Durations are written the
//! human way: `750ms`, `20s`, `1h`.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::collaborator::Collaborator;
use crate::resilience::CircuitBreakerConfig;

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "CLAIMGUARD_";

/// Errors from loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Serde adapter for `humantime` durations.
pub(crate) mod humantime_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

/// Per-collaborator call timeouts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    #[serde(with = "humantime_duration")]
    pub labeler: Duration,

    #[serde(with = "humantime_duration")]
    pub summarizer: Duration,

    #[serde(with = "humantime_duration")]
    pub extractor: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            labeler: Duration::from_secs(10),
            summarizer: Duration::from_secs(20),
            extractor: Duration::from_secs(20),
        }
    }
}

/// Token budget limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    /// Tokens the pipeline may spend over its lifetime
    pub global_max_tokens: u32,

    /// Tokens each text-model collaborator may spend
    pub per_collaborator_max_tokens: u32,

    /// Reservation checked before each text-model call
    pub estimated_tokens_per_call: u32,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            global_max_tokens: 1_000_000,
            per_collaborator_max_tokens: 500_000,
            estimated_tokens_per_call: 1_500,
        }
    }
}

/// Response cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,

    pub max_entries: u64,

    #[serde(with = "humantime_duration")]
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 1_000,
            ttl: Duration::from_secs(3600),
        }
    }
}

/// Text-model settings for the two text agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub summarizer: String,

    pub extractor: String,

    pub max_tokens: u32,

    /// 0.0 keeps responses as repeatable as the model allows
    pub temperature: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            summarizer: "gemini-1.5-flash".to_string(),
            extractor: "gemini-1.5-flash".to_string(),
            max_tokens: 512,
            temperature: 0.0,
        }
    }
}

/// Image labeling settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelerConfig {
    pub max_results: u32,
}

impl Default for LabelerConfig {
    fn default() -> Self {
        Self { max_results: 10 }
    }
}

/// Configuration for the claim pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub timeouts: TimeoutConfig,

    pub circuit_breaker: CircuitBreakerConfig,

    pub budget: BudgetConfig,

    pub cache: CacheConfig,

    pub models: ModelConfig,

    pub labeler: LabelerConfig,
}

impl RuntimeConfig {
    /// Parse from a YAML (or JSON) string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load from a YAML (or JSON) file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Defaults overlaid with `CLAIMGUARD_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env()
    }

    /// Overlay `CLAIMGUARD_*` environment variables.
    pub fn with_env(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Overlay values from `lookup`, keyed by full variable name.
    ///
    /// Recognized keys (all prefixed with `CLAIMGUARD_`): `LABELER_TIMEOUT`,
    /// `SUMMARIZER_TIMEOUT`, `EXTRACTOR_TIMEOUT`, `SUMMARIZER_MODEL`,
    /// `EXTRACTOR_MODEL`, `GLOBAL_MAX_TOKENS`, `CACHE_ENABLED`,
    /// `FAILURE_THRESHOLD`.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |suffix: &str| {
            let key = format!("{}{}", ENV_PREFIX, suffix);
            lookup(&key).map(|value| (key, value))
        };

        if let Some((key, value)) = get("LABELER_TIMEOUT") {
            self.timeouts.labeler = parse_duration(&key, &value)?;
        }
        if let Some((key, value)) = get("SUMMARIZER_TIMEOUT") {
            self.timeouts.summarizer = parse_duration(&key, &value)?;
        }
        if let Some((key, value)) = get("EXTRACTOR_TIMEOUT") {
            self.timeouts.extractor = parse_duration(&key, &value)?;
        }
        if let Some((_, value)) = get("SUMMARIZER_MODEL") {
            self.models.summarizer = value;
        }
        if let Some((_, value)) = get("EXTRACTOR_MODEL") {
            self.models.extractor = value;
        }
        if let Some((key, value)) = get("GLOBAL_MAX_TOKENS") {
            self.budget.global_max_tokens = parse_value(&key, &value)?;
        }
        if let Some((key, value)) = get("CACHE_ENABLED") {
            self.cache.enabled = parse_value(&key, &value)?;
        }
        if let Some((key, value)) = get("FAILURE_THRESHOLD") {
            self.circuit_breaker.failure_threshold = parse_value(&key, &value)?;
        }

        Ok(self)
    }

    /// Timeout for one collaborator call.
    pub fn timeout_for(&self, collaborator: Collaborator) -> Duration {
        match collaborator {
            Collaborator::Labeler => self.timeouts.labeler,
            Collaborator::Summarizer => self.timeouts.summarizer,
            Collaborator::Extractor => self.timeouts.extractor,
        }
    }
}

fn parse_duration(key: &str, value: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(value).map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        message: e.to_string(),
    })
}

fn parse_value<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        message: e.to_string(),
    })
}
