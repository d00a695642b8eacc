use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use tokio::time::Instant;
use tracing::warn;

use crate::{
    BlobError, BlobInfo, BlobResult, BlobStore, ByteStream, GetResult, ObjectHead, PutResult,
};

/// Decorator that bounds every call of the wrapped store with a timeout.
/// A call that runs out of time fails with `BlobError::Unavailable`.
///
/// For `get` the body stream gets its own deadline of the same length,
/// starting once the object is opened. A body that is not fully delivered
/// by then ends with an `ErrorKind::TimedOut` chunk error.
#[derive(Debug, Clone)]
pub struct BoundedStore<S> {
    inner: S,
    timeout: Duration,
}

impl<S: BlobStore> BoundedStore<S> {
    pub fn new(inner: S, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn bounded<T, F>(&self, operation: &'static str, key: &str, call: F) -> BlobResult<T>
    where
        F: Future<Output = BlobResult<T>> + Send,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    operation,
                    key,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "storage call timed out"
                );
                Err(BlobError::unavailable(format!(
                    "{operation} {key} timed out after {}ms",
                    self.timeout.as_millis()
                )))
            }
        }
    }
}

#[async_trait]
impl<S: BlobStore> BlobStore for BoundedStore<S> {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<&str>,
        body: Bytes,
    ) -> BlobResult<PutResult> {
        self.bounded("put", key, self.inner.put(bucket, key, content_type, body))
            .await
    }

    async fn get(&self, bucket: &str, key: &str) -> BlobResult<GetResult> {
        let mut object = self.bounded("get", key, self.inner.get(bucket, key)).await?;
        object.stream = deadline_stream(object.stream, key.to_string(), self.timeout);
        Ok(object)
    }

    async fn head(&self, bucket: &str, key: &str) -> BlobResult<ObjectHead> {
        self.bounded("head", key, self.inner.head(bucket, key)).await
    }

    async fn delete(&self, bucket: &str, key: &str) -> BlobResult<()> {
        self.bounded("delete", key, self.inner.delete(bucket, key)).await
    }

    async fn exists(&self, bucket: &str, key: &str) -> BlobResult<bool> {
        self.bounded("exists", key, self.inner.exists(bucket, key)).await
    }

    async fn bucket_exists(&self, bucket: &str) -> BlobResult<bool> {
        self.bounded("bucket_exists", bucket, self.inner.bucket_exists(bucket))
            .await
    }

    async fn list(&self, bucket: &str, prefix: Option<&str>) -> BlobResult<Vec<BlobInfo>> {
        self.bounded("list", prefix.unwrap_or(""), self.inner.list(bucket, prefix))
            .await
    }
}

fn deadline_stream(mut inner: ByteStream, key: String, timeout: Duration) -> ByteStream {
    let deadline = Instant::now() + timeout;
    Box::pin(async_stream::stream! {
        loop {
            match tokio::time::timeout_at(deadline, inner.next()).await {
                Ok(Some(chunk)) => yield chunk,
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        key = %key,
                        timeout_ms = timeout.as_millis() as u64,
                        "object body read timed out"
                    );
                    yield Err(std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        format!("reading {key} timed out after {}ms", timeout.as_millis()),
                    ));
                    break;
                }
            }
        }
    })
}
