//! Serializable gate configuration.
//!
//! Durations are whole milliseconds in JSON:
//!
//! ```json
//! {
//!   "resources": {
//!     "brave-search": { "max_calls": 1, "window_ms": 1800000 },
//!     "github": {
//!       "max_calls": 5000,
//!       "window_ms": 3600000,
//!       "window_kind": "fixed",
//!       "failure_threshold": 3,
//!       "cool_down_ms": 60000
//!     }
//!   },
//!   "backoff": { "base_ms": 1000, "max_interval_ms": 300000, "max_attempts": 5 },
//!   "history_capacity": 10
//! }
//! ```

use crate::error::ConfigError;
use crate::serde_millis;
use callgate_backoff::BackoffPolicy;
use callgate_circuitbreaker::BreakerSettings;
use callgate_core::ResourceId;
use callgate_queue::DEFAULT_HISTORY_CAPACITY;
use callgate_ratelimiter::{ResourceLimit, WindowKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

fn default_failure_threshold() -> u32 {
    5
}

fn default_cool_down() -> Duration {
    Duration::from_secs(30)
}

fn default_history_capacity() -> usize {
    DEFAULT_HISTORY_CAPACITY
}

/// Quota and breaker settings of one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceConfig {
    /// Calls allowed per window.
    pub max_calls: u32,
    #[serde(rename = "window_ms", with = "serde_millis")]
    pub window: Duration,
    #[serde(default)]
    pub window_kind: WindowKind,
    /// Consecutive failures that open the circuit.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(
        rename = "cool_down_ms",
        with = "serde_millis",
        default = "default_cool_down"
    )]
    pub cool_down: Duration,
}

impl ResourceConfig {
    /// `max_calls` per sliding `window`, with default breaker settings.
    pub fn new(max_calls: u32, window: Duration) -> Self {
        Self {
            max_calls,
            window,
            window_kind: WindowKind::default(),
            failure_threshold: default_failure_threshold(),
            cool_down: default_cool_down(),
        }
    }

    pub fn window_kind(mut self, kind: WindowKind) -> Self {
        self.window_kind = kind;
        self
    }

    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    pub fn cool_down(mut self, cool_down: Duration) -> Self {
        self.cool_down = cool_down;
        self
    }

    pub(crate) fn limit(&self) -> ResourceLimit {
        ResourceLimit {
            max_calls: self.max_calls,
            window: self.window,
            kind: self.window_kind,
        }
    }

    pub(crate) fn breaker(&self) -> BreakerSettings {
        BreakerSettings {
            failure_threshold: self.failure_threshold,
            cool_down: self.cool_down,
        }
    }

    fn validate(&self, resource: &ResourceId) -> Result<(), ConfigError> {
        let invalid = |reason| ConfigError::InvalidResource {
            resource: resource.clone(),
            reason,
        };
        if self.max_calls == 0 {
            return Err(invalid("max_calls must be at least 1"));
        }
        if self.window.is_zero() {
            return Err(invalid("window_ms must be positive"));
        }
        if self.failure_threshold == 0 {
            return Err(invalid("failure_threshold must be at least 1"));
        }
        Ok(())
    }
}

/// Retry timing shared by all resources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackoffConfig {
    /// Wait after the first failure; doubles per further failure.
    #[serde(rename = "base_ms", with = "serde_millis")]
    pub base: Duration,
    #[serde(rename = "max_interval_ms", with = "serde_millis")]
    pub max_interval: Duration,
    /// Failed attempts after which an entry is abandoned.
    pub max_attempts: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            max_interval: Duration::from_secs(300),
            max_attempts: 5,
        }
    }
}

impl BackoffConfig {
    pub(crate) fn policy(&self) -> BackoffPolicy {
        BackoffPolicy::builder()
            .max_attempts(self.max_attempts)
            .exponential(self.base, self.max_interval)
            .build()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidBackoff("max_attempts must be at least 1"));
        }
        if self.base > self.max_interval {
            return Err(ConfigError::InvalidBackoff(
                "base_ms must not exceed max_interval_ms",
            ));
        }
        Ok(())
    }
}

/// Complete gate configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GateConfig {
    pub resources: BTreeMap<ResourceId, ResourceConfig>,
    #[serde(default)]
    pub backoff: BackoffConfig,
    /// Records kept in each of the processed and abandoned histories, per
    /// resource.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            resources: BTreeMap::new(),
            backoff: BackoffConfig::default(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

impl GateConfig {
    /// Adds or replaces a resource.
    pub fn resource(mut self, id: impl Into<ResourceId>, config: ResourceConfig) -> Self {
        self.resources.insert(id.into(), config);
        self
    }

    pub fn backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    /// Parses and validates a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: GateConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Pretty-printed JSON form.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks every value is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.resources.is_empty() {
            return Err(ConfigError::NoResources);
        }
        if self.history_capacity == 0 {
            return Err(ConfigError::ZeroHistoryCapacity);
        }
        for (id, resource) in &self.resources {
            resource.validate(id)?;
        }
        self.backoff.validate()
    }
}
