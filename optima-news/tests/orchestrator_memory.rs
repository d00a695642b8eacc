use std::io::Cursor;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use serde_json::Value;
use tokio_test::assert_ok;
use uuid::Uuid;

use optima_assets::{AssetError, RawImage, Resolution};
use optima_blob::{
    BlobConfig, BlobError, BlobInfo, BlobResult, BlobStore, GetResult, MemoryBlobStore, ObjectHead,
    PutResult,
};
use optima_core::{init_tracing, CurrentUser, LogFormat, StaticIdentity};
use optima_news::{
    CasOutcome, CreateNews, Degradation, MemoryNewsRepository, MemoryUserDirectory, MutationError,
    MutationStage, NewsCategory, NewsItem, NewsMetadata, NewsRepository, NewsService, NewsSettings,
    NewsStatus, RetryPolicy, UpdateNews, UserOverview,
};

const IMAGES: &str = "images";
const WEB: &str = "web";
const SNAPSHOT_KEY: &str = "static-api/json/news.json";

fn png(width: u32, height: u32) -> RawImage {
    let img = RgbImage::from_fn(width, height, |x, y| Rgb([x as u8, y as u8, 200]));
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, ImageFormat::Png)
        .expect("encode fixture");
    RawImage::new(out.into_inner()).with_content_type("image/png")
}

fn settings() -> NewsSettings {
    NewsSettings::new()
        .with_blob(
            BlobConfig::new()
                .with_image_bucket(IMAGES)
                .with_web_bucket(WEB)
                .with_call_timeout(Duration::from_secs(2)),
        )
        .with_retry(RetryPolicy::new().with_max_attempts(3).with_backoff(Duration::ZERO))
}

struct Harness {
    memory: Arc<MemoryBlobStore>,
    repo: Arc<MemoryNewsRepository>,
    author: UserOverview,
    service: Arc<NewsService>,
}

fn harness() -> Harness {
    let memory = Arc::new(MemoryBlobStore::with_buckets(&[IMAGES, WEB]));
    let repo = Arc::new(MemoryNewsRepository::new());
    build(memory.clone(), memory, repo.clone(), repo)
}

fn build(
    memory: Arc<MemoryBlobStore>,
    store: Arc<dyn BlobStore>,
    repo: Arc<MemoryNewsRepository>,
    repository: Arc<dyn NewsRepository>,
) -> Harness {
    init_tracing(LogFormat::Pretty);

    let author = UserOverview {
        id: Uuid::new_v4(),
        first_name: "Ani".into(),
        last_name: "Petrosyan".into(),
    };
    let users = Arc::new(MemoryUserDirectory::new());
    users.insert(author.clone());
    let identity = Arc::new(StaticIdentity::new(CurrentUser::new(author.id, "editor")));

    let service = NewsService::new(store, settings(), repository, users, identity);
    Harness {
        memory,
        repo,
        author,
        service: Arc::new(service),
    }
}

fn announcement(title: &str) -> CreateNews {
    CreateNews::new(title, "summary", "description", NewsCategory::Announcement)
}

fn snapshot_ids(memory: &MemoryBlobStore) -> Vec<String> {
    let body = memory.object(WEB, SNAPSHOT_KEY).expect("snapshot published");
    let doc: Value = serde_json::from_slice(&body).unwrap();
    doc["newsList"]
        .as_array()
        .expect("newsList array")
        .iter()
        .map(|entry| entry["id"].as_str().unwrap().to_string())
        .collect()
}

fn image_key(id: Uuid, resolution: &str, version: u32) -> String {
    format!("news/{id}/{resolution}/{version}")
}

/// N1. Create with image: version 1 pair, no version 0, item in snapshot
#[tokio::test]
async fn test_create_with_image_end_to_end() {
    let h = harness();

    let outcome = h
        .service
        .create(announcement("Launch").with_image(png(320, 200)))
        .await
        .unwrap();
    let view = &outcome.value;

    assert_eq!(view.image_version, 1);
    assert_eq!(view.created_by.as_ref(), Some(&h.author));
    assert_eq!(
        outcome.trace,
        vec![
            MutationStage::RecordMutated,
            MutationStage::AssetSynced,
            MutationStage::SnapshotPublished,
            MutationStage::Done,
        ]
    );
    assert!(!outcome.is_degraded());

    let mut keys = h.memory.keys(IMAGES);
    keys.sort();
    assert_eq!(
        keys,
        vec![image_key(view.id, "original", 1), image_key(view.id, "thumbnail", 1)]
    );
    assert_eq!(snapshot_ids(&h.memory), vec![view.id.to_string()]);

    let stored = h.repo.find_by_id(view.id).await.unwrap().unwrap();
    assert_eq!(stored.image_version, 1);
}

/// N2. Image replacement advances by one; text-only updates leave it alone
#[tokio::test]
async fn test_update_versions() {
    let h = harness();
    let id = h
        .service
        .create(announcement("Launch").with_image(png(64, 64)))
        .await
        .unwrap()
        .value
        .id;

    let replaced = h
        .service
        .update(id, UpdateNews::new().with_image(png(90, 60)))
        .await
        .unwrap();
    assert_eq!(replaced.value.image_version, 2);
    assert!(h.memory.object(IMAGES, &image_key(id, "original", 1)).is_none());
    assert!(h.memory.object(IMAGES, &image_key(id, "thumbnail", 1)).is_none());

    let renamed = h
        .service
        .update(id, UpdateNews::new().with_title("Launch day"))
        .await
        .unwrap();
    assert_eq!(renamed.value.title, "Launch day");
    assert_eq!(renamed.value.image_version, 2);
    assert!(!renamed.reached(MutationStage::AssetSynced));

    let image = h.service.image(id, Resolution::Thumbnail).await.unwrap();
    assert_eq!(image.version, 2);
    assert_eq!(image.content_type, "image/png");
    let decoded = image::load_from_memory(&image.bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (100, 100));
}

/// N3. Archived items leave the snapshot and show up in metadata
#[tokio::test]
async fn test_archive_and_metadata() {
    let h = harness();
    assert_eq!(h.service.metadata().await.unwrap(), NewsMetadata::default());

    let a = h.service.create(announcement("A")).await.unwrap().value.id;
    let b = h.service.create(announcement("B")).await.unwrap().value.id;

    let archived = h.service.archive(b).await.unwrap();
    assert!(archived.reached(MutationStage::SnapshotPublished));
    assert_eq!(snapshot_ids(&h.memory), vec![a.to_string()]);

    let metadata = h.service.metadata().await.unwrap();
    assert_eq!(metadata.all_active_count, 1);
    assert_eq!(metadata.all_archived_count, 1);
    assert_eq!(metadata.last_updated_by, Some(h.author.clone()));
    assert_eq!(
        h.repo.find_by_id(b).await.unwrap().unwrap().status,
        NewsStatus::Archived
    );
}

/// N4. Delete removes record and images, then republishes
#[tokio::test]
async fn test_delete_with_image() {
    let h = harness();
    let id = h
        .service
        .create(announcement("Gone soon").with_image(png(40, 40)))
        .await
        .unwrap()
        .value
        .id;

    let outcome = h.service.delete(id).await.unwrap();
    assert!(outcome.reached(MutationStage::AssetSynced));
    assert!(h.memory.keys(IMAGES).is_empty());
    assert!(snapshot_ids(&h.memory).is_empty());
    assert!(h.repo.is_empty());

    let again = h.service.delete(id).await.unwrap_err();
    assert!(matches!(again, MutationError::RecordNotFound { .. }));
}

/// N5. Image removal failure on delete degrades instead of failing
#[tokio::test]
async fn test_delete_with_stuck_image_is_degraded() {
    let h = harness();
    let id = h
        .service
        .create(announcement("Sticky").with_image(png(40, 40)))
        .await
        .unwrap()
        .value
        .id;
    h.memory.fail_deletes_matching(&format!("news/{id}/thumbnail"));

    let outcome = h.service.delete(id).await.unwrap();
    assert!(matches!(
        outcome.degradations.as_slice(),
        [Degradation::ImageRemovalFailed { version: 1, .. }]
    ));
    assert!(h.repo.is_empty());
    assert_eq!(h.memory.keys(IMAGES).len(), 2);
    assert_eq!(h.service.metrics().image_removal_failures, 1);
}

/// N6. Invalid payloads are rejected before any write
#[tokio::test]
async fn test_invalid_image_touches_nothing() {
    let h = harness();

    let err = h
        .service
        .create(announcement("Bad").with_image(RawImage::new(Bytes::from_static(b"GIF89a..."))))
        .await
        .unwrap_err();
    assert!(matches!(err, MutationError::Asset(AssetError::InvalidImage { .. })));

    let empty_title = h.service.create(announcement("  ")).await.unwrap_err();
    assert!(matches!(empty_title, MutationError::InvalidRequest { .. }));

    assert_eq!(h.memory.calls().total(), 0);
    assert!(h.repo.is_empty());
    assert_eq!(h.service.metrics().mutations_failed, 2);
}

/// N7. Snapshot failures are degradations, never errors
#[tokio::test]
async fn test_snapshot_failure_is_degraded() {
    let h = harness();
    h.memory.fail_puts_matching("static-api/");

    let outcome = h.service.create(announcement("Quiet")).await.unwrap();
    assert!(!outcome.reached(MutationStage::SnapshotPublished));
    assert!(matches!(
        outcome.degradations.as_slice(),
        [Degradation::SnapshotFailed { code: "SNAPSHOT_PUBLISH_FAILED", .. }]
    ));
    assert_eq!(h.repo.len(), 1);
    assert_eq!(h.service.metrics().snapshot_failures, 1);
}

/// N8. Upload failure keeps the committed record at version 0
#[tokio::test]
async fn test_upload_failure_does_not_advance_version() {
    let h = harness();
    h.memory.fail_puts_matching("/original/");

    let err = h
        .service
        .create(announcement("No picture").with_image(png(32, 32)))
        .await
        .unwrap_err();
    assert!(matches!(err, MutationError::Asset(AssetError::AssetUploadFailed { .. })));
    // three attempts, each cleaned up
    assert_eq!(h.memory.calls().put, 4);
    assert!(h.memory.keys(IMAGES).is_empty());

    let stored = h.repo.find_all_by_status(NewsStatus::Active).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].image_version, 0);
    assert_eq!(snapshot_ids(&h.memory), vec![stored[0].id.to_string()]);

    let missing = h.service.image(stored[0].id, Resolution::Original).await.unwrap_err();
    assert!(matches!(missing, MutationError::Asset(AssetError::ImageNotFound { .. })));
}

/// N9. Retirement failure is reported and the old pair stays whole
#[tokio::test]
async fn test_retirement_failure_is_degraded() {
    let h = harness();
    let id = h
        .service
        .create(announcement("Two faces").with_image(png(32, 32)))
        .await
        .unwrap()
        .value
        .id;
    h.memory.fail_deletes_matching(&image_key(id, "thumbnail", 1));

    let outcome = h
        .service
        .update(id, UpdateNews::new().with_image(png(48, 48)))
        .await
        .unwrap();
    assert_eq!(outcome.value.image_version, 2);
    assert!(matches!(
        outcome.degradations.as_slice(),
        [Degradation::RetirementFailed { .. }]
    ));
    assert_eq!(h.memory.keys(IMAGES).len(), 4);
}

/// N10. Concurrent image updates of one item are serialized
#[tokio::test]
async fn test_concurrent_image_updates_each_advance_by_one() {
    let h = harness();
    h.memory.set_latency(Some(Duration::from_millis(2)));
    let id = h
        .service
        .create(announcement("Busy").with_image(png(32, 32)))
        .await
        .unwrap()
        .value
        .id;

    let tasks: Vec<_> = (0..2)
        .map(|i| {
            let service = h.service.clone();
            tokio::spawn(async move {
                service
                    .update(id, UpdateNews::new().with_image(png(40 + i, 40)))
                    .await
            })
        })
        .collect();
    let mut versions = Vec::new();
    for task in tasks {
        versions.push(task.await.unwrap().unwrap().value.image_version);
    }
    versions.sort();
    assert_eq!(versions, vec![2, 3]);

    let mut keys = h.memory.keys(IMAGES);
    keys.sort();
    assert_eq!(keys, vec![image_key(id, "original", 3), image_key(id, "thumbnail", 3)]);
}

/// Record store that lets another writer move the image version right
/// before every compare-and-set
struct RacingRepository {
    inner: Arc<MemoryNewsRepository>,
}

#[async_trait]
impl NewsRepository for RacingRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<NewsItem>> {
        self.inner.find_by_id(id).await
    }

    async fn save(&self, item: NewsItem) -> Result<NewsItem> {
        self.inner.save(item).await
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        self.inner.delete(id).await
    }

    async fn find_all_by_status(&self, status: NewsStatus) -> Result<Vec<NewsItem>> {
        self.inner.find_all_by_status(status).await
    }

    async fn count_by_status(&self, status: NewsStatus) -> Result<u64> {
        self.inner.count_by_status(status).await
    }

    async fn find_latest_updated(&self) -> Result<Option<NewsItem>> {
        self.inner.find_latest_updated().await
    }

    async fn update(&self, item: NewsItem) -> Result<Option<NewsItem>> {
        self.inner.update(item).await
    }

    async fn compare_and_set_image_version(
        &self,
        id: Uuid,
        expected: u32,
        new: u32,
    ) -> Result<CasOutcome> {
        if let Some(mut item) = self.inner.find_by_id(id).await? {
            item.image_version = expected + 5;
            self.inner.force_put(item);
        }
        self.inner.compare_and_set_image_version(id, expected, new).await
    }
}

/// N11. A lost version race withdraws the just-published pair
#[tokio::test]
async fn test_cas_conflict_withdraws_new_pair() {
    let memory = Arc::new(MemoryBlobStore::with_buckets(&[IMAGES, WEB]));
    let repo = Arc::new(MemoryNewsRepository::new());
    let racing = Arc::new(RacingRepository { inner: repo.clone() });
    let h = build(memory.clone(), memory, repo, racing);

    let err = h
        .service
        .create(announcement("Raced").with_image(png(32, 32)))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MutationError::VersionConflict { expected: 0, actual: Some(5), .. }
    ));
    assert!(h.memory.keys(IMAGES).is_empty());
}

/// Object store whose first puts fail as unavailable
struct FlakyStore {
    inner: Arc<MemoryBlobStore>,
    put_failures: AtomicU32,
}

#[async_trait]
impl BlobStore for FlakyStore {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<&str>,
        body: Bytes,
    ) -> BlobResult<PutResult> {
        let failing = self
            .put_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(BlobError::unavailable("connection reset"));
        }
        self.inner.put(bucket, key, content_type, body).await
    }

    async fn get(&self, bucket: &str, key: &str) -> BlobResult<GetResult> {
        self.inner.get(bucket, key).await
    }

    async fn head(&self, bucket: &str, key: &str) -> BlobResult<ObjectHead> {
        self.inner.head(bucket, key).await
    }

    async fn delete(&self, bucket: &str, key: &str) -> BlobResult<()> {
        self.inner.delete(bucket, key).await
    }

    async fn exists(&self, bucket: &str, key: &str) -> BlobResult<bool> {
        self.inner.exists(bucket, key).await
    }

    async fn bucket_exists(&self, bucket: &str) -> BlobResult<bool> {
        self.inner.bucket_exists(bucket).await
    }

    async fn list(&self, bucket: &str, prefix: Option<&str>) -> BlobResult<Vec<BlobInfo>> {
        self.inner.list(bucket, prefix).await
    }
}

/// N12. Transient storage failures are retried
#[tokio::test]
async fn test_transient_upload_failure_is_retried() {
    let memory = Arc::new(MemoryBlobStore::with_buckets(&[IMAGES, WEB]));
    let flaky = Arc::new(FlakyStore {
        inner: memory.clone(),
        put_failures: AtomicU32::new(2),
    });
    let repo = Arc::new(MemoryNewsRepository::new());
    let h = build(memory, flaky, repo.clone(), repo);

    let outcome = assert_ok!(
        h.service
            .create(announcement("Persistent").with_image(png(32, 32)))
            .await
    );
    assert_eq!(outcome.value.image_version, 1);
    assert!(!outcome.is_degraded());
    assert_eq!(h.memory.keys(IMAGES).len(), 2);
}

/// N13. Record store failures abort before any storage call
#[tokio::test]
async fn test_record_store_failure_aborts_early() {
    let h = harness();
    h.repo.set_offline(true);

    let err = h
        .service
        .create(announcement("Offline").with_image(png(16, 16)))
        .await
        .unwrap_err();
    assert!(matches!(err, MutationError::Repository(_)));
    assert_eq!(h.memory.calls().total(), 0);

    h.repo.set_offline(false);
    let missing = h.service.get(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(missing, MutationError::RecordNotFound { .. }));
}

/// Record store whose updates take a while to land
struct SlowUpdates {
    inner: Arc<MemoryNewsRepository>,
    delay: Duration,
}

#[async_trait]
impl NewsRepository for SlowUpdates {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<NewsItem>> {
        self.inner.find_by_id(id).await
    }

    async fn save(&self, item: NewsItem) -> Result<NewsItem> {
        self.inner.save(item).await
    }

    async fn update(&self, item: NewsItem) -> Result<Option<NewsItem>> {
        tokio::time::sleep(self.delay).await;
        self.inner.update(item).await
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        self.inner.delete(id).await
    }

    async fn find_all_by_status(&self, status: NewsStatus) -> Result<Vec<NewsItem>> {
        self.inner.find_all_by_status(status).await
    }

    async fn count_by_status(&self, status: NewsStatus) -> Result<u64> {
        self.inner.count_by_status(status).await
    }

    async fn find_latest_updated(&self) -> Result<Option<NewsItem>> {
        self.inner.find_latest_updated().await
    }

    async fn compare_and_set_image_version(
        &self,
        id: Uuid,
        expected: u32,
        new: u32,
    ) -> Result<CasOutcome> {
        self.inner.compare_and_set_image_version(id, expected, new).await
    }
}

fn slow_update_harness() -> Harness {
    let memory = Arc::new(MemoryBlobStore::with_buckets(&[IMAGES, WEB]));
    let repo = Arc::new(MemoryNewsRepository::new());
    let slow = Arc::new(SlowUpdates {
        inner: repo.clone(),
        delay: Duration::from_millis(150),
    });
    build(memory.clone(), memory, repo, slow)
}

/// N14. A delete issued while an update is in flight waits for it and
/// then removes everything; the item does not come back
#[tokio::test]
async fn test_delete_during_update_stays_deleted() {
    let h = slow_update_harness();
    let id = h
        .service
        .create(announcement("Contested").with_image(png(32, 32)))
        .await
        .unwrap()
        .value
        .id;

    let update = {
        let service = h.service.clone();
        tokio::spawn(async move {
            service
                .update(id, UpdateNews::new().with_title("edited"))
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_ok!(h.service.delete(id).await);

    let updated = update.await.unwrap().unwrap();
    assert_eq!(updated.value.title, "edited");

    assert!(h.repo.find_by_id(id).await.unwrap().is_none());
    assert!(h.memory.keys(IMAGES).is_empty());
    assert!(snapshot_ids(&h.memory).is_empty());
}

/// N15. Archiving or updating an item that is already gone fails and
/// writes nothing back
#[tokio::test]
async fn test_mutations_after_delete_find_nothing() {
    let h = slow_update_harness();
    let id = h.service.create(announcement("Brief")).await.unwrap().value.id;
    assert_ok!(h.service.delete(id).await);

    let update = h
        .service
        .update(id, UpdateNews::new().with_title("late"))
        .await
        .unwrap_err();
    assert!(matches!(update, MutationError::RecordNotFound { .. }));

    let archive = h.service.archive(id).await.unwrap_err();
    assert!(matches!(archive, MutationError::RecordNotFound { .. }));
    assert!(h.repo.is_empty());
}
