use std::sync::Arc;

use anyhow::Result;
use optima_blob::{BlobConfig, BlobStore, MemoryBlobStore, S3CompatibleStore, S3Config};
use optima_core::ConfigSnapshot;
use tracing::{info, warn};

/// Object store named by configuration: S3-compatible when `s3.region` is
/// set, in-memory with the configured buckets otherwise.
pub async fn blob_store_from_config(snapshot: &ConfigSnapshot) -> Result<Arc<dyn BlobStore>> {
    if snapshot.get("s3.region").is_some() {
        let config = S3Config::from_snapshot(snapshot)?;
        info!(
            region = %config.region,
            endpoint = ?config.endpoint_url,
            "using S3-compatible object store"
        );
        return Ok(Arc::new(S3CompatibleStore::new(config).await));
    }

    let blob = BlobConfig::from_snapshot(snapshot);
    warn!(
        image_bucket = %blob.image_bucket,
        web_bucket = %blob.web_bucket,
        "no s3.region configured, using in-memory object store"
    );
    Ok(Arc::new(MemoryBlobStore::with_buckets(&[
        blob.image_bucket.as_str(),
        blob.web_bucket.as_str(),
    ])))
}
