use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::{
    once_stream, BlobError, BlobInfo, BlobResult, BlobStore, ByteStream, GetResult, ObjectHead,
    PutResult,
};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    content_type: Option<String>,
    etag: String,
    last_modified: i64,
}

/// Failure injection rules. Patterns match when the key contains them.
#[derive(Debug, Default)]
struct Faults {
    put: Vec<String>,
    get: Vec<String>,
    delete: Vec<String>,
    corrupt_reads: Vec<String>,
    stalled_reads: Vec<String>,
    slow_keys: Vec<(String, Duration)>,
    latency: Option<Duration>,
    offline: bool,
}

impl Faults {
    fn matches(patterns: &[String], key: &str) -> bool {
        patterns.iter().any(|p| key.contains(p.as_str()))
    }
}

#[derive(Debug, Default)]
struct CallCounters {
    put: AtomicU64,
    get: AtomicU64,
    head: AtomicU64,
    delete: AtomicU64,
    exists: AtomicU64,
    bucket_exists: AtomicU64,
    list: AtomicU64,
}

/// Number of calls each operation received, failed ones included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallSnapshot {
    pub put: u64,
    pub get: u64,
    pub head: u64,
    pub delete: u64,
    pub exists: u64,
    pub bucket_exists: u64,
    pub list: u64,
}

impl CallSnapshot {
    pub fn total(&self) -> u64 {
        self.put + self.get + self.head + self.delete + self.exists + self.bucket_exists + self.list
    }
}

/// In-memory store for tests and local development, with fault injection.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    buckets: RwLock<HashMap<String, BTreeMap<String, StoredObject>>>,
    faults: RwLock<Faults>,
    calls: CallCounters,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with the given buckets already created
    pub fn with_buckets(buckets: &[&str]) -> Self {
        let store = Self::new();
        for bucket in buckets {
            store.create_bucket(bucket);
        }
        store
    }

    pub fn create_bucket(&self, bucket: &str) {
        self.buckets.write().entry(bucket.to_string()).or_default();
    }

    /// Fail every put whose key contains `pattern`
    pub fn fail_puts_matching(&self, pattern: &str) {
        self.faults.write().put.push(pattern.to_string());
    }

    pub fn fail_gets_matching(&self, pattern: &str) {
        self.faults.write().get.push(pattern.to_string());
    }

    pub fn fail_deletes_matching(&self, pattern: &str) {
        self.faults.write().delete.push(pattern.to_string());
    }

    /// Reads of matching keys start streaming, then break mid-transfer
    pub fn corrupt_reads_matching(&self, pattern: &str) {
        self.faults.write().corrupt_reads.push(pattern.to_string());
    }

    /// Opened reads of matching keys never deliver a chunk
    pub fn stall_reads_matching(&self, pattern: &str) {
        self.faults.write().stalled_reads.push(pattern.to_string());
    }

    /// Delay only calls on matching keys
    pub fn delay_keys_matching(&self, pattern: &str, latency: Duration) {
        self.faults.write().slow_keys.push((pattern.to_string(), latency));
    }

    /// Delay every call by `latency`
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.faults.write().latency = latency;
    }

    /// Every call fails with `Unavailable` while offline
    pub fn set_offline(&self, offline: bool) {
        self.faults.write().offline = offline;
    }

    pub fn clear_faults(&self) {
        *self.faults.write() = Faults::default();
    }

    pub fn calls(&self) -> CallSnapshot {
        CallSnapshot {
            put: self.calls.put.load(Ordering::Relaxed),
            get: self.calls.get.load(Ordering::Relaxed),
            head: self.calls.head.load(Ordering::Relaxed),
            delete: self.calls.delete.load(Ordering::Relaxed),
            exists: self.calls.exists.load(Ordering::Relaxed),
            bucket_exists: self.calls.bucket_exists.load(Ordering::Relaxed),
            list: self.calls.list.load(Ordering::Relaxed),
        }
    }

    /// Raw object content, bypassing counters and faults
    pub fn object(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.buckets
            .read()
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .map(|o| o.data.clone())
    }

    /// All keys in a bucket, bypassing counters and faults
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.buckets
            .read()
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    async fn enter(&self, counter: &AtomicU64, key: &str) -> BlobResult<()> {
        counter.fetch_add(1, Ordering::Relaxed);
        let (latency, offline) = {
            let faults = self.faults.read();
            let keyed = faults
                .slow_keys
                .iter()
                .filter(|(pattern, _)| key.contains(pattern.as_str()))
                .map(|(_, latency)| *latency)
                .max();
            (faults.latency.max(keyed), faults.offline)
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if offline {
            return Err(BlobError::unavailable("memory store is offline"));
        }
        Ok(())
    }

    fn injected(&self, select: fn(&Faults) -> &Vec<String>, key: &str) -> bool {
        Faults::matches(select(&self.faults.read()), key)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<&str>,
        body: Bytes,
    ) -> BlobResult<PutResult> {
        self.enter(&self.calls.put, key).await?;
        if self.injected(|f| &f.put, key) {
            return Err(BlobError::unavailable(format!("injected put failure for {key}")));
        }

        let etag = Uuid::new_v4().simple().to_string();
        let size_bytes = body.len() as u64;
        let mut buckets = self.buckets.write();
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| BlobError::bucket_not_found(bucket))?;
        objects.insert(
            key.to_string(),
            StoredObject {
                data: body,
                content_type: content_type.map(str::to_string),
                etag: etag.clone(),
                last_modified: chrono::Utc::now().timestamp(),
            },
        );

        Ok(PutResult {
            etag: Some(etag),
            size_bytes,
        })
    }

    async fn get(&self, bucket: &str, key: &str) -> BlobResult<GetResult> {
        self.enter(&self.calls.get, key).await?;
        if self.injected(|f| &f.get, key) {
            return Err(BlobError::unavailable(format!("injected get failure for {key}")));
        }

        let object = {
            let buckets = self.buckets.read();
            let objects = buckets
                .get(bucket)
                .ok_or_else(|| BlobError::bucket_not_found(bucket))?;
            objects
                .get(key)
                .cloned()
                .ok_or_else(|| BlobError::not_found(bucket, key))?
        };

        let size_bytes = object.data.len() as u64;
        let stream: ByteStream = if self.injected(|f| &f.stalled_reads, key) {
            Box::pin(futures::stream::pending::<Result<Bytes, std::io::Error>>())
        } else if self.injected(|f| &f.corrupt_reads, key) {
            let head = object.data.slice(..object.data.len() / 2);
            Box::pin(futures::stream::iter(vec![
                Ok(head),
                Err(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "connection reset while streaming",
                )),
            ]))
        } else {
            once_stream(object.data)
        };

        Ok(GetResult {
            stream,
            size_bytes,
            content_type: object.content_type,
            etag: Some(object.etag),
        })
    }

    async fn head(&self, bucket: &str, key: &str) -> BlobResult<ObjectHead> {
        self.enter(&self.calls.head, key).await?;
        let buckets = self.buckets.read();
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| BlobError::bucket_not_found(bucket))?;
        let object = objects
            .get(key)
            .ok_or_else(|| BlobError::not_found(bucket, key))?;

        Ok(ObjectHead {
            size_bytes: object.data.len() as u64,
            content_type: object.content_type.clone(),
            etag: Some(object.etag.clone()),
            last_modified: Some(object.last_modified),
        })
    }

    async fn delete(&self, bucket: &str, key: &str) -> BlobResult<()> {
        self.enter(&self.calls.delete, key).await?;
        if self.injected(|f| &f.delete, key) {
            return Err(BlobError::unavailable(format!("injected delete failure for {key}")));
        }

        let mut buckets = self.buckets.write();
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| BlobError::bucket_not_found(bucket))?;
        objects.remove(key);
        Ok(())
    }

    async fn exists(&self, bucket: &str, key: &str) -> BlobResult<bool> {
        self.enter(&self.calls.exists, key).await?;
        let buckets = self.buckets.read();
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| BlobError::bucket_not_found(bucket))?;
        Ok(objects.contains_key(key))
    }

    async fn bucket_exists(&self, bucket: &str) -> BlobResult<bool> {
        self.enter(&self.calls.bucket_exists, bucket).await?;
        Ok(self.buckets.read().contains_key(bucket))
    }

    async fn list(&self, bucket: &str, prefix: Option<&str>) -> BlobResult<Vec<BlobInfo>> {
        self.enter(&self.calls.list, prefix.unwrap_or("")).await?;
        let buckets = self.buckets.read();
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| BlobError::bucket_not_found(bucket))?;

        Ok(objects
            .iter()
            .filter(|(key, _)| prefix.map_or(true, |p| key.starts_with(p)))
            .map(|(key, object)| BlobInfo {
                key: key.clone(),
                size_bytes: object.data.len() as u64,
                last_modified: Some(object.last_modified),
            })
            .collect())
    }
}
