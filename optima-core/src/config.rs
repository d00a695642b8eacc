//! # Configuration
//!
//! A framework-agnostic configuration store based on a simple string
//! key/value map. Crates never read the environment directly: the binary
//! builds an [`OptimaConfig`], freezes it into a [`ConfigSnapshot`] and
//! hands the snapshot to each crate's typed settings constructor.
//!
//! ```rust
//! use optima_core::OptimaConfig;
//! let mut config = OptimaConfig::new();
//!
//! config.set("storage.image_bucket", "optima-images");
//! config.set("retry.max_attempts", "3");
//!
//! let snapshot = config.snapshot();
//! assert_eq!(snapshot.get("storage.image_bucket"), Some("optima-images"));
//! assert_eq!(snapshot.get_u64("retry.max_attempts"), Some(3));
//! ```
//!
//! ## Environment overrides
//!
//! ```bash
//! export OPTIMA__STORAGE__IMAGE_BUCKET=prod-images
//! ```
//!
//! becomes `storage.image_bucket` after [`OptimaConfig::load_env`].

use std::collections::HashMap;
use std::time::Duration;

/// Default prefix for environment overrides.
pub const ENV_PREFIX: &str = "OPTIMA__";

#[derive(Debug, Default)]
pub struct OptimaConfig {
    values: HashMap<String, String>,
}

impl OptimaConfig {
    /// Create an empty config store.
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    /// Build from the process environment using [`ENV_PREFIX`].
    pub fn from_env() -> Self {
        let mut config = Self::new();
        config.load_env(ENV_PREFIX);
        config
    }

    /// Set a configuration key to a string value.
    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.values.insert(key.into(), value.into());
    }

    /// Get a configuration value by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    /// Check whether a key is present.
    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Copy every `PREFIX…` variable into the store.
    /// `OPTIMA__SNAPSHOT__NEWS_FILE` → `snapshot.news_file`
    pub fn load_env(&mut self, prefix: &str) {
        self.load_pairs(prefix, std::env::vars());
    }

    pub(crate) fn load_pairs<I>(&mut self, prefix: &str, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if let Some(stripped) = key.strip_prefix(prefix) {
                let normalized = stripped.to_lowercase().replace("__", ".");
                self.set(normalized, value);
            }
        }
    }

    pub fn snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot::new(self.values.clone())
    }
}

/// Immutable view handed to settings constructors.
#[derive(Debug, Clone, Default)]
pub struct ConfigSnapshot {
    map: HashMap<String, String>,
}

impl ConfigSnapshot {
    pub(crate) fn new(map: HashMap<String, String>) -> Self {
        Self { map }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(|s| s.as_str())
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.map.get(key).cloned()
    }

    pub fn get_usize(&self, key: &str) -> Option<usize> {
        self.get(key).and_then(|v| v.trim().parse::<usize>().ok())
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|v| v.trim().parse::<u64>().ok())
    }

    pub fn get_u32(&self, key: &str) -> Option<u32> {
        self.get(key).and_then(|v| v.trim().parse::<u32>().ok())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.trim().parse::<bool>().ok())
    }

    /// Millisecond value as a `Duration`.
    pub fn get_millis(&self, key: &str) -> Option<Duration> {
        self.get_u64(key).map(Duration::from_millis)
    }

    /// Comma-separated list, trimmed, empty items dropped.
    pub fn get_list(&self, key: &str) -> Option<Vec<String>> {
        self.get(key).map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
    }
}
