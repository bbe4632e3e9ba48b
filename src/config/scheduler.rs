//! Scheduler and registry configuration structures.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::notify::DEFAULT_EVENT_CAPACITY;

/// Environment variable for [`SchedulerOptions::max_concurrency`].
pub const ENV_MAX_CONCURRENCY: &str = "BATCH_MAX_CONCURRENCY";
/// Environment variable for [`SchedulerOptions::retry_count`].
pub const ENV_RETRY_COUNT: &str = "BATCH_RETRY_COUNT";
/// Environment variable for [`SchedulerOptions::retry_delay_ms`].
pub const ENV_RETRY_DELAY_MS: &str = "BATCH_RETRY_DELAY_MS";

const fn default_max_concurrency() -> usize {
    3
}

const fn default_retry_count() -> u32 {
    2
}

const fn default_retry_delay_ms() -> u64 {
    1000
}

const fn default_event_capacity() -> usize {
    DEFAULT_EVENT_CAPACITY
}

/// Concurrency and retry settings for one scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerOptions {
    /// Maximum simultaneous processor invocations. Must be at least 1.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Re-attempts after the first failure before a task is marked failed.
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    /// Fixed delay before a failed task re-enters the queue, in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            retry_count: default_retry_count(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl SchedulerOptions {
    /// Set the concurrency cap.
    #[must_use]
    pub const fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    /// Set the number of retries.
    #[must_use]
    pub const fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    /// Set the retry delay in milliseconds.
    #[must_use]
    pub const fn with_retry_delay_ms(mut self, retry_delay_ms: u64) -> Self {
        self.retry_delay_ms = retry_delay_ms;
        self
    }

    /// Retry delay as a `Duration`.
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Validate option values.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_concurrency == 0 {
            return Err("max_concurrency must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse options from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let opts: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        opts.validate()?;
        Ok(opts)
    }

    /// Load options from the process environment, reading a `.env` file first if present.
    /// Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load options through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse<T: std::str::FromStr>(key: &str, raw: Option<String>) -> Result<Option<T>, String>
        where
            T::Err: std::fmt::Display,
        {
            raw.map(|v| {
                v.trim()
                    .parse::<T>()
                    .map_err(|e| format!("{key}={v:?}: {e}"))
            })
            .transpose()
        }

        let mut opts = Self::default();
        if let Some(v) = parse(ENV_MAX_CONCURRENCY, lookup(ENV_MAX_CONCURRENCY))? {
            opts.max_concurrency = v;
        }
        if let Some(v) = parse(ENV_RETRY_COUNT, lookup(ENV_RETRY_COUNT))? {
            opts.retry_count = v;
        }
        if let Some(v) = parse(ENV_RETRY_DELAY_MS, lookup(ENV_RETRY_DELAY_MS))? {
            opts.retry_delay_ms = v;
        }
        opts.validate()?;
        Ok(opts)
    }
}

/// Configuration for a registry of named schedulers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Options for the lazily created default scheduler.
    #[serde(default)]
    pub default_options: SchedulerOptions,
    /// Schedulers to create up front, by id.
    #[serde(default)]
    pub schedulers: BTreeMap<String, SchedulerOptions>,
    /// Which configured scheduler is the default. When unset, the first id in
    /// sorted order becomes the default.
    #[serde(default)]
    pub default_scheduler: Option<String>,
    /// Events buffered per bus subscriber.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            default_options: SchedulerOptions::default(),
            schedulers: BTreeMap::new(),
            default_scheduler: None,
            event_capacity: default_event_capacity(),
        }
    }
}

impl RegistryConfig {
    /// Validate every scheduler and the default selection.
    pub fn validate(&self) -> Result<(), String> {
        self.default_options
            .validate()
            .map_err(|e| format!("default_options invalid: {e}"))?;
        for (name, opts) in &self.schedulers {
            opts.validate()
                .map_err(|e| format!("scheduler `{name}` invalid: {e}"))?;
        }
        if let Some(default) = &self.default_scheduler {
            if !self.schedulers.contains_key(default) {
                return Err(format!("default_scheduler `{default}` is not configured"));
            }
        }
        if self.event_capacity == 0 {
            return Err("event_capacity must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse registry configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let opts = SchedulerOptions::default();
        assert_eq!(opts.max_concurrency, 3);
        assert_eq!(opts.retry_count, 2);
        assert_eq!(opts.retry_delay(), Duration::from_millis(1000));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let opts = SchedulerOptions::from_json_str(r#"{"max_concurrency": 8}"#).unwrap();
        assert_eq!(opts.max_concurrency, 8);
        assert_eq!(opts.retry_count, 2);
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        assert!(SchedulerOptions::from_json_str(r#"{"max_concurrency": 0}"#).is_err());
    }

    #[test]
    fn test_from_lookup() {
        let env: HashMap<&str, &str> =
            HashMap::from([(ENV_MAX_CONCURRENCY, " 5 "), (ENV_RETRY_DELAY_MS, "250")]);
        let opts = SchedulerOptions::from_lookup(|k| env.get(k).map(|v| (*v).to_string())).unwrap();
        assert_eq!(opts.max_concurrency, 5);
        assert_eq!(opts.retry_count, 2);
        assert_eq!(opts.retry_delay_ms, 250);
    }

    #[test]
    fn test_from_lookup_bad_value() {
        let err = SchedulerOptions::from_lookup(|k| {
            (k == ENV_RETRY_COUNT).then(|| "lots".to_string())
        })
        .unwrap_err();
        assert!(err.contains(ENV_RETRY_COUNT));
    }

    #[test]
    fn test_registry_default_must_exist() {
        let cfg = RegistryConfig {
            default_scheduler: Some("missing".into()),
            ..RegistryConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_registry_from_json() {
        let json = r#"{
            "schedulers": {
                "images": { "max_concurrency": 4 },
                "audio": { "retry_count": 0, "retry_delay_ms": 0 }
            },
            "default_scheduler": "images"
        }"#;
        let cfg = RegistryConfig::from_json_str(json).unwrap();
        assert_eq!(cfg.event_capacity, DEFAULT_EVENT_CAPACITY);
        assert_eq!(cfg.schedulers["images"].max_concurrency, 4);
        assert_eq!(cfg.schedulers["audio"].retry_count, 0);
        assert_eq!(cfg.default_options, SchedulerOptions::default());
    }
}
