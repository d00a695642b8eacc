use optima_assets::AssetConfig;
use optima_blob::BlobConfig;
use optima_core::ConfigSnapshot;

use crate::RetryPolicy;

/// Typed settings for [`NewsService`](crate::NewsService)
#[derive(Debug, Clone)]
pub struct NewsSettings {
    pub blob: BlobConfig,
    pub assets: AssetConfig,
    pub retry: RetryPolicy,

    /// File name of the public news export under `static-api/json/`
    pub snapshot_file: String,
}

impl Default for NewsSettings {
    fn default() -> Self {
        Self {
            blob: BlobConfig::default(),
            assets: AssetConfig::default(),
            retry: RetryPolicy::default(),
            snapshot_file: "news.json".to_string(),
        }
    }
}

impl NewsSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: &ConfigSnapshot) -> Self {
        Self {
            blob: BlobConfig::from_snapshot(snapshot),
            assets: AssetConfig::from_snapshot(snapshot),
            retry: RetryPolicy::from_snapshot(snapshot),
            snapshot_file: snapshot
                .get_string("snapshot.news_file")
                .unwrap_or_else(|| "news.json".to_string()),
        }
    }

    pub fn with_blob(mut self, blob: BlobConfig) -> Self {
        self.blob = blob;
        self
    }

    pub fn with_assets(mut self, assets: AssetConfig) -> Self {
        self.assets = assets;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_snapshot_file<S: Into<String>>(mut self, file: S) -> Self {
        self.snapshot_file = file.into();
        self
    }
}
