use std::time::Duration;

use optima_core::ConfigSnapshot;

/// Configuration for blob operations
#[derive(Debug, Clone)]
pub struct BlobConfig {
    /// Upper bound for any single store call
    pub call_timeout: Duration,

    /// Bucket holding entity images
    pub image_bucket: String,

    /// Public bucket holding the static JSON exports
    pub web_bucket: String,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(10),
            image_bucket: "optima-images".to_string(),
            web_bucket: "optima-web".to_string(),
        }
    }
}

impl BlobConfig {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `storage.*` keys, falling back to defaults for anything missing
    pub fn from_snapshot(snapshot: &ConfigSnapshot) -> Self {
        let defaults = Self::default();
        Self {
            call_timeout: snapshot
                .get_millis("storage.call_timeout_ms")
                .unwrap_or(defaults.call_timeout),
            image_bucket: snapshot
                .get_string("storage.image_bucket")
                .unwrap_or(defaults.image_bucket),
            web_bucket: snapshot
                .get_string("storage.web_bucket")
                .unwrap_or(defaults.web_bucket),
        }
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_image_bucket<S: Into<String>>(mut self, bucket: S) -> Self {
        self.image_bucket = bucket.into();
        self
    }

    pub fn with_web_bucket<S: Into<String>>(mut self, bucket: S) -> Self {
        self.web_bucket = bucket.into();
        self
    }
}
