use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::{BlobResult, ByteStream};

/// Core object storage operations over a bucket/key namespace.
///
/// Implementations report transport and backend failures as
/// `BlobError::Unavailable` and never retry on their own; retry policy
/// belongs to whoever sequences the calls.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store an object, replacing any object already at `key`
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<&str>,
        body: Bytes,
    ) -> BlobResult<PutResult>;

    /// Open an object for reading. Missing keys are `NotFound`.
    async fn get(&self, bucket: &str, key: &str) -> BlobResult<GetResult>;

    /// Object metadata without content
    async fn head(&self, bucket: &str, key: &str) -> BlobResult<ObjectHead>;

    /// Delete an object. Deleting a missing key is not an error.
    async fn delete(&self, bucket: &str, key: &str) -> BlobResult<()>;

    async fn exists(&self, bucket: &str, key: &str) -> BlobResult<bool>;

    async fn bucket_exists(&self, bucket: &str) -> BlobResult<bool>;

    /// Keys under `prefix`, in key order
    async fn list(&self, bucket: &str, prefix: Option<&str>) -> BlobResult<Vec<BlobInfo>>;
}

#[async_trait]
impl<S> BlobStore for Arc<S>
where
    S: BlobStore + ?Sized,
{
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<&str>,
        body: Bytes,
    ) -> BlobResult<PutResult> {
        (**self).put(bucket, key, content_type, body).await
    }

    async fn get(&self, bucket: &str, key: &str) -> BlobResult<GetResult> {
        (**self).get(bucket, key).await
    }

    async fn head(&self, bucket: &str, key: &str) -> BlobResult<ObjectHead> {
        (**self).head(bucket, key).await
    }

    async fn delete(&self, bucket: &str, key: &str) -> BlobResult<()> {
        (**self).delete(bucket, key).await
    }

    async fn exists(&self, bucket: &str, key: &str) -> BlobResult<bool> {
        (**self).exists(bucket, key).await
    }

    async fn bucket_exists(&self, bucket: &str) -> BlobResult<bool> {
        (**self).bucket_exists(bucket).await
    }

    async fn list(&self, bucket: &str, prefix: Option<&str>) -> BlobResult<Vec<BlobInfo>> {
        (**self).list(bucket, prefix).await
    }
}

/// Result of a successful put operation
#[derive(Debug, Clone)]
pub struct PutResult {
    pub etag: Option<String>,
    pub size_bytes: u64,
}

/// Result of a get operation
pub struct GetResult {
    pub stream: ByteStream,
    pub size_bytes: u64,
    pub content_type: Option<String>,
    pub etag: Option<String>,
}

/// Metadata about an object
#[derive(Debug, Clone)]
pub struct ObjectHead {
    pub size_bytes: u64,
    pub content_type: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<i64>,
}

/// Listing entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobInfo {
    pub key: String,
    pub size_bytes: u64,
    pub last_modified: Option<i64>,
}
