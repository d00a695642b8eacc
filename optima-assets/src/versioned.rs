use std::sync::Arc;

use bytes::Bytes;
use optima_blob::{collect_stream, BlobError, BlobStore};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    AssetConfig, AssetError, AssetKey, AssetResult, EntityClass, EntityGuard, EntityLocks,
    ImageInfo, ImageValidator, RawImage, Resolution, RulesValidator, Thumbnailer,
};

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// A new image pair that is durably stored but whose predecessor has not
/// been retired yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedImage {
    pub entity_class: EntityClass,
    pub entity_id: Uuid,
    pub version: u32,
    pub previous_version: u32,
    pub content_type: &'static str,
}

/// A stale object that could not be removed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetireFailure {
    pub key: String,
    pub reason: String,
}

/// Outcome of best-effort removal of an old image pair
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetireReport {
    pub version: u32,
    pub removed: Vec<Resolution>,
    pub failures: Vec<RetireFailure>,
}

impl RetireReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Result of a full replace: the new version plus what happened to the
/// old one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReplacement {
    pub version: u32,
    pub retirement: RetireReport,
}

/// Owns the lifecycle of entity image pairs in the image bucket.
///
/// Versions are never overwritten: a replacement always lands on
/// `current + 1`, and the old pair is only retired after both new objects
/// are stored. Readers holding an old version number keep getting a
/// consistent pair until retirement.
pub struct VersionedAssetStore {
    store: Arc<dyn BlobStore>,
    bucket: String,
    validator: Arc<dyn ImageValidator>,
    thumbnailer: Thumbnailer,
    locks: EntityLocks,
}

impl VersionedAssetStore {
    pub fn new<S: Into<String>>(store: Arc<dyn BlobStore>, bucket: S, config: AssetConfig) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            validator: Arc::new(RulesValidator::new(config.rules)),
            thumbnailer: Thumbnailer::new(config.thumbnail_size),
            locks: EntityLocks::new(),
        }
    }

    /// Replace the default rules-based validator
    pub fn with_validator<V: ImageValidator + 'static>(mut self, validator: V) -> Self {
        self.validator = Arc::new(validator);
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Run the payload checks alone, without touching storage
    pub fn validate(&self, raw: &RawImage) -> AssetResult<ImageInfo> {
        self.validator.validate(raw)
    }

    /// Serialize image mutations of one entity. [`replace_image`] takes
    /// this lock itself; callers composing [`publish_image`] and
    /// [`retire_version`] hold it across their own steps.
    ///
    /// [`replace_image`]: Self::replace_image
    /// [`publish_image`]: Self::publish_image
    /// [`retire_version`]: Self::retire_version
    pub async fn lock(&self, class: EntityClass, id: Uuid) -> EntityGuard {
        self.locks.acquire(class, id).await
    }

    /// Store `raw` as version `current_version + 1` and retire
    /// `current_version`. Retirement failures are reported, not raised.
    pub async fn replace_image(
        &self,
        class: EntityClass,
        id: Uuid,
        current_version: u32,
        raw: RawImage,
    ) -> AssetResult<ImageReplacement> {
        let _guard = self.lock(class, id).await;
        let published = self.publish_image(class, id, current_version, raw).await?;
        let retirement = self.retire_version(class, id, published.previous_version).await;

        Ok(ImageReplacement {
            version: published.version,
            retirement,
        })
    }

    /// First half of a replacement: validate, derive the thumbnail and
    /// store the new pair. The old pair is left untouched.
    pub async fn publish_image(
        &self,
        class: EntityClass,
        id: Uuid,
        current_version: u32,
        raw: RawImage,
    ) -> AssetResult<PublishedImage> {
        // CPU-only work first: nothing below runs for a rejected payload
        let info: ImageInfo = self.validator.validate(&raw)?;
        let thumbnail = self.thumbnailer.derive(&raw.bytes, &info)?;

        if !self.store.bucket_exists(&self.bucket).await? {
            warn!(bucket = %self.bucket, "image bucket does not exist");
            return Err(AssetError::BucketNotFound {
                bucket: self.bucket.clone(),
            });
        }

        let version = current_version
            .checked_add(1)
            .ok_or_else(|| AssetError::invalid_image("image version counter exhausted"))?;
        let original_key = AssetKey::original(class, id, version);
        if self.store.exists(&self.bucket, &original_key.object_key()).await? {
            return Err(AssetError::VersionConflict {
                key_prefix: format!("{class}/{id}"),
                version,
            });
        }

        self.upload(original_key, info.content_type, raw.bytes).await?;
        let thumbnail_key = original_key.with_resolution(Resolution::Thumbnail);
        self.upload(thumbnail_key, info.content_type, thumbnail).await?;

        info!(
            entity_class = %class,
            entity_id = %id,
            version,
            width = info.width,
            height = info.height,
            "image pair published"
        );

        Ok(PublishedImage {
            entity_class: class,
            entity_id: id,
            version,
            previous_version: current_version,
            content_type: info.content_type,
        })
    }

    /// Upload one rendition. On failure the whole new version is rolled
    /// back so the pair stays fully absent.
    async fn upload(&self, key: AssetKey, content_type: &str, body: Bytes) -> AssetResult<()> {
        let object_key = key.object_key();
        match self
            .store
            .put(&self.bucket, &object_key, Some(content_type), body)
            .await
        {
            Ok(result) => {
                debug!(key = %object_key, size_bytes = result.size_bytes, "image object stored");
                Ok(())
            }
            Err(source) => {
                warn!(key = %object_key, error = %source, "image upload failed");
                self.discard_version(key.entity_class, key.entity_id, key.version).await;
                Err(AssetError::AssetUploadFailed {
                    key: object_key,
                    source,
                })
            }
        }
    }

    /// Best-effort removal of a version that must not survive, e.g. after
    /// a failed upload or a lost version race. Returns the keys that could
    /// not be removed.
    pub async fn discard_version(
        &self,
        class: EntityClass,
        id: Uuid,
        version: u32,
    ) -> Vec<RetireFailure> {
        let mut failures = Vec::new();
        for resolution in [Resolution::Thumbnail, Resolution::Original] {
            let key = AssetKey::new(class, id, version, resolution).object_key();
            if let Err(e) = self.store.delete(&self.bucket, &key).await {
                warn!(key = %key, error = %e, "failed to discard image object");
                failures.push(RetireFailure {
                    key,
                    reason: e.to_string(),
                });
            }
        }
        failures
    }

    /// Second half of a replacement: remove the old pair if present.
    ///
    /// Never fails. The thumbnail goes first and the original is only
    /// removed once the thumbnail is gone, so a failure leaves either the
    /// full pair or nothing findable by its original.
    pub async fn retire_version(&self, class: EntityClass, id: Uuid, version: u32) -> RetireReport {
        let mut report = RetireReport {
            version,
            ..RetireReport::default()
        };

        for resolution in [Resolution::Thumbnail, Resolution::Original] {
            let key = AssetKey::new(class, id, version, resolution).object_key();
            match self.retire_object(&key).await {
                Ok(true) => report.removed.push(resolution),
                Ok(false) => {}
                Err(e) => {
                    warn!(
                        key = %key,
                        error = %e,
                        "stale image could not be retired, leaving it orphaned"
                    );
                    report.failures.push(RetireFailure {
                        key,
                        reason: e.to_string(),
                    });
                    break;
                }
            }
        }

        if report.is_clean() && !report.removed.is_empty() {
            info!(entity_class = %class, entity_id = %id, version, "stale image pair retired");
        }
        report
    }

    async fn retire_object(&self, key: &str) -> Result<bool, BlobError> {
        if !self.store.exists(&self.bucket, key).await? {
            return Ok(false);
        }
        self.store.delete(&self.bucket, key).await?;
        Ok(true)
    }

    /// Delete both renditions of `version`. Absence of the original is
    /// `ImageNotFound`; a missing thumbnail alone is fine.
    pub async fn remove_image(
        &self,
        class: EntityClass,
        id: Uuid,
        version: u32,
    ) -> AssetResult<()> {
        let original = AssetKey::original(class, id, version).object_key();
        if !self.store.exists(&self.bucket, &original).await? {
            warn!(key = %original, "no image to remove");
            return Err(AssetError::ImageNotFound { key: original });
        }

        let thumbnail = AssetKey::thumbnail(class, id, version).object_key();
        self.store.delete(&self.bucket, &thumbnail).await?;
        self.store.delete(&self.bucket, &original).await?;

        info!(entity_class = %class, entity_id = %id, version, "image pair removed");
        Ok(())
    }

    /// Full content of one rendition
    pub async fn fetch_image(
        &self,
        class: EntityClass,
        id: Uuid,
        version: u32,
        resolution: Resolution,
    ) -> AssetResult<Bytes> {
        let key = AssetKey::new(class, id, version, resolution).object_key();
        let object = match self.store.get(&self.bucket, &key).await {
            Ok(object) => object,
            Err(e) if e.is_not_found() => return Err(AssetError::ImageNotFound { key }),
            Err(e) => return Err(e.into()),
        };

        collect_stream(object.stream).await.map_err(|source| {
            warn!(key = %key, error = %source, "image stream broke while reading");
            AssetError::AssetReadFailed { key, source }
        })
    }

    /// Stored content type of one rendition
    pub async fn resolve_content_type(
        &self,
        class: EntityClass,
        id: Uuid,
        version: u32,
        resolution: Resolution,
    ) -> AssetResult<String> {
        let key = AssetKey::new(class, id, version, resolution).object_key();
        match self.store.head(&self.bucket, &key).await {
            Ok(head) => Ok(head
                .content_type
                .unwrap_or_else(|| FALLBACK_CONTENT_TYPE.to_string())),
            Err(e) if e.is_not_found() => Err(AssetError::ImageNotFound { key }),
            Err(e) => Err(e.into()),
        }
    }
}
