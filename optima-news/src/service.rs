use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use optima_assets::{
    AssetError, AssetKey, EntityClass, EntityGuard, ImageValidator, PublishedImage, RawImage,
    Resolution, SnapshotError, SnapshotPublisher, VersionedAssetStore,
};
use optima_blob::{BlobStore, BoundedStore};
use optima_core::{Classify, IdentityContext};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::outcome::Progress;
use crate::{
    CasOutcome, CreateNews, Degradation, DegradationCounts, DegradationMetrics, MutationError,
    MutationOutcome, MutationResult, MutationStage, NewsImage, NewsItem, NewsMetadata,
    NewsRepository, NewsSettings, NewsStatus, NewsView, RetryPolicy, UpdateNews, UserDirectory,
    UserOverview,
};

/// Field name of the list inside the public news export
pub const NEWS_LIST_FIELD: &str = "newsList";

const CLASS: EntityClass = EntityClass::News;

/// News operations. Every mutation commits the record first, then syncs
/// the image pair, then republishes the public snapshot.
///
/// Mutations of an existing item hold its entity lock from the first read
/// to the end, so an update or archive never interleaves with a delete.
pub struct NewsService {
    repository: Arc<dyn NewsRepository>,
    users: Arc<dyn UserDirectory>,
    identity: Arc<dyn IdentityContext>,
    assets: VersionedAssetStore,
    snapshots: SnapshotPublisher,
    retry: RetryPolicy,
    metrics: Arc<DegradationMetrics>,
}

impl NewsService {
    /// Every call to `store` is bounded by `settings.blob.call_timeout`
    pub fn new(
        store: Arc<dyn BlobStore>,
        settings: NewsSettings,
        repository: Arc<dyn NewsRepository>,
        users: Arc<dyn UserDirectory>,
        identity: Arc<dyn IdentityContext>,
    ) -> Self {
        let bounded: Arc<dyn BlobStore> =
            Arc::new(BoundedStore::new(store, settings.blob.call_timeout));
        let assets =
            VersionedAssetStore::new(bounded.clone(), settings.blob.image_bucket, settings.assets);
        let snapshots = SnapshotPublisher::new(
            bounded,
            settings.blob.web_bucket,
            &settings.snapshot_file,
            NEWS_LIST_FIELD,
        );

        Self {
            repository,
            users,
            identity,
            assets,
            snapshots,
            retry: settings.retry,
            metrics: Arc::new(DegradationMetrics::new()),
        }
    }

    /// Replace the rules-based image validator
    pub fn with_validator<V: ImageValidator + 'static>(mut self, validator: V) -> Self {
        self.assets = self.assets.with_validator(validator);
        self
    }

    pub fn metrics(&self) -> DegradationCounts {
        self.metrics.snapshot()
    }

    /// Object key of the public news export in the web bucket
    pub fn snapshot_key(&self) -> &str {
        self.snapshots.key()
    }

    #[instrument(
        skip(self, request),
        fields(title = %request.title, has_image = request.image.is_some())
    )]
    pub async fn create(&self, request: CreateNews) -> MutationResult<MutationOutcome<NewsView>> {
        let mut progress = Progress::new("create", &self.metrics);
        match self.create_steps(&mut progress, request).await {
            Ok(view) => Ok(progress.finish(view)),
            Err(e) => Err(progress.fail(e)),
        }
    }

    async fn create_steps(
        &self,
        progress: &mut Progress<'_>,
        request: CreateNews,
    ) -> MutationResult<NewsView> {
        let user = self.identity.current_user();
        info!(user = %user.username, "adding news item");

        if request.title.trim().is_empty() {
            return Err(MutationError::invalid_request("title must not be empty"));
        }
        if let Some(raw) = &request.image {
            self.assets.validate(raw)?;
        }

        let now = Utc::now();
        let item = NewsItem {
            id: Uuid::new_v4(),
            title: request.title,
            summary: request.summary,
            description: request.description,
            category: request.category,
            status: NewsStatus::Active,
            image_version: 0,
            created_at: now,
            updated_at: now,
            created_by: user.id,
            updated_by: Some(user.id),
        };
        let mut item = self.repository.save(item).await?;
        progress.advance(MutationStage::RecordMutated);
        info!(news_id = %item.id, "news item saved");

        if let Some(raw) = request.image {
            let guard = self.assets.lock(CLASS, item.id).await;
            item.image_version = self.sync_or_publish(progress, &guard, item.id, raw).await?;
        }

        self.publish_snapshot(progress).await;
        Ok(self.view(&item).await)
    }

    #[instrument(skip(self, request), fields(news_id = %id, has_image = request.image.is_some()))]
    pub async fn update(
        &self,
        id: Uuid,
        request: UpdateNews,
    ) -> MutationResult<MutationOutcome<NewsView>> {
        let mut progress = Progress::new("update", &self.metrics);
        match self.update_steps(&mut progress, id, request).await {
            Ok(view) => Ok(progress.finish(view)),
            Err(e) => Err(progress.fail(e)),
        }
    }

    async fn update_steps(
        &self,
        progress: &mut Progress<'_>,
        id: Uuid,
        mut request: UpdateNews,
    ) -> MutationResult<NewsView> {
        let user = self.identity.current_user();
        info!(user = %user.username, "updating news item");
        let guard = self.assets.lock(CLASS, id).await;

        let mut item = self.find(id).await?;
        if matches!(&request.title, Some(title) if title.trim().is_empty()) {
            return Err(MutationError::invalid_request("title must not be empty"));
        }
        let image = request.image.take();
        if let Some(raw) = &image {
            self.assets.validate(raw)?;
        }

        request.apply(&mut item);
        item.updated_at = Utc::now();
        item.updated_by = Some(user.id);
        let mut item = self.store_update(item).await?;
        progress.advance(MutationStage::RecordMutated);

        if let Some(raw) = image {
            item.image_version = self.sync_or_publish(progress, &guard, id, raw).await?;
        }

        self.publish_snapshot(progress).await;
        Ok(self.view(&item).await)
    }

    #[instrument(skip(self), fields(news_id = %id))]
    pub async fn delete(&self, id: Uuid) -> MutationResult<MutationOutcome<()>> {
        let mut progress = Progress::new("delete", &self.metrics);
        match self.delete_steps(&mut progress, id).await {
            Ok(()) => Ok(progress.finish(())),
            Err(e) => Err(progress.fail(e)),
        }
    }

    async fn delete_steps(&self, progress: &mut Progress<'_>, id: Uuid) -> MutationResult<()> {
        info!("deleting news item");
        let _guard = self.assets.lock(CLASS, id).await;

        let item = self.find(id).await?;
        self.repository.delete(id).await?;
        progress.advance(MutationStage::RecordMutated);

        if item.has_image() {
            let version = item.image_version;
            let assets = &self.assets;
            let removed = self
                .retry
                .run("remove_image", AssetError::is_transient, move || {
                    assets.remove_image(CLASS, id, version)
                })
                .await;
            match removed {
                Ok(()) => progress.advance(MutationStage::AssetSynced),
                Err(e) => progress.degrade(Degradation::ImageRemovalFailed {
                    version,
                    reason: e.to_string(),
                }),
            }
        }

        self.publish_snapshot(progress).await;
        info!("news item deleted");
        Ok(())
    }

    #[instrument(skip(self), fields(news_id = %id))]
    pub async fn archive(&self, id: Uuid) -> MutationResult<MutationOutcome<NewsView>> {
        let mut progress = Progress::new("archive", &self.metrics);
        match self.archive_steps(&mut progress, id).await {
            Ok(view) => Ok(progress.finish(view)),
            Err(e) => Err(progress.fail(e)),
        }
    }

    async fn archive_steps(
        &self,
        progress: &mut Progress<'_>,
        id: Uuid,
    ) -> MutationResult<NewsView> {
        let user = self.identity.current_user();
        info!(user = %user.username, "archiving news item");
        let _guard = self.assets.lock(CLASS, id).await;

        let mut item = self.find(id).await?;
        item.status = NewsStatus::Archived;
        item.updated_at = Utc::now();
        item.updated_by = Some(user.id);
        let item = self.store_update(item).await?;
        progress.advance(MutationStage::RecordMutated);

        self.publish_snapshot(progress).await;
        Ok(self.view(&item).await)
    }

    #[instrument(skip(self), fields(news_id = %id))]
    pub async fn get(&self, id: Uuid) -> MutationResult<NewsView> {
        let user = self.identity.current_user();
        debug!(user = %user.username, "reading news item");
        let item = self.find(id).await?;
        Ok(self.view(&item).await)
    }

    #[instrument(skip(self))]
    pub async fn metadata(&self) -> MutationResult<NewsMetadata> {
        let user = self.identity.current_user();
        debug!(user = %user.username, "reading news metadata");

        let Some(latest) = self.repository.find_latest_updated().await? else {
            return Ok(NewsMetadata::default());
        };
        let all_active_count = self.repository.count_by_status(NewsStatus::Active).await?;
        let all_archived_count = self.repository.count_by_status(NewsStatus::Archived).await?;

        Ok(NewsMetadata {
            last_updated_at: Some(latest.updated_at),
            last_updated_by: self.overview(latest.last_modified_by()).await,
            all_active_count,
            all_archived_count,
        })
    }

    /// Current image of a news item in the given rendition
    #[instrument(skip(self), fields(news_id = %id, resolution = %resolution))]
    pub async fn image(&self, id: Uuid, resolution: Resolution) -> MutationResult<NewsImage> {
        let item = self.find(id).await?;
        let version = item.image_version;
        if !item.has_image() {
            return Err(AssetError::ImageNotFound {
                key: AssetKey::new(CLASS, id, version, resolution).object_key(),
            }
            .into());
        }

        let bytes = self.assets.fetch_image(CLASS, id, version, resolution).await?;
        let content_type = self
            .assets
            .resolve_content_type(CLASS, id, version, resolution)
            .await?;
        Ok(NewsImage {
            bytes,
            content_type,
            version,
        })
    }

    async fn find(&self, id: Uuid) -> MutationResult<NewsItem> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or(MutationError::RecordNotFound { id })
    }

    async fn store_update(&self, item: NewsItem) -> MutationResult<NewsItem> {
        let id = item.id;
        self.repository
            .update(item)
            .await?
            .ok_or(MutationError::RecordNotFound { id })
    }

    /// Image sync for a record that is already committed. If it fails the
    /// snapshot is still republished, since the record change is durable.
    async fn sync_or_publish(
        &self,
        progress: &mut Progress<'_>,
        guard: &EntityGuard,
        id: Uuid,
        raw: RawImage,
    ) -> MutationResult<u32> {
        match self.sync_image(progress, guard, id, raw).await {
            Ok(version) => {
                progress.advance(MutationStage::AssetSynced);
                Ok(version)
            }
            Err(e) => {
                self.publish_snapshot(progress).await;
                Err(e)
            }
        }
    }

    /// Publish a new image version, advance the record to it, retire the
    /// previous pair. Returns the new version. The caller holds the entity
    /// lock of `id`.
    async fn sync_image(
        &self,
        progress: &mut Progress<'_>,
        _guard: &EntityGuard,
        id: Uuid,
        raw: RawImage,
    ) -> MutationResult<u32> {
        let current = self.find(id).await?.image_version;

        let assets = &self.assets;
        let published = self
            .retry
            .run("publish_image", AssetError::is_transient, move || {
                assets.publish_image(CLASS, id, current, raw.clone())
            })
            .await?;

        let cas = self
            .repository
            .compare_and_set_image_version(id, current, published.version)
            .await;
        match cas {
            Ok(CasOutcome::Applied) => {}
            Ok(CasOutcome::Conflict { actual }) => {
                warn!(expected = current, actual, "image version moved during publish");
                self.withdraw(progress, &published).await;
                return Err(MutationError::VersionConflict {
                    id,
                    expected: current,
                    actual: Some(actual),
                });
            }
            Ok(CasOutcome::Missing) => {
                self.withdraw(progress, &published).await;
                return Err(MutationError::RecordNotFound { id });
            }
            Err(e) => {
                self.withdraw(progress, &published).await;
                return Err(e.into());
            }
        }

        if current > 0 {
            let report = self.assets.retire_version(CLASS, id, current).await;
            for failure in report.failures {
                progress.degrade(Degradation::RetirementFailed {
                    key: failure.key,
                    reason: failure.reason,
                });
            }
        }

        Ok(published.version)
    }

    /// Remove a published pair the record never pointed at
    async fn withdraw(&self, progress: &mut Progress<'_>, published: &PublishedImage) {
        let failures = self
            .assets
            .discard_version(published.entity_class, published.entity_id, published.version)
            .await;
        for failure in failures {
            progress.degrade(Degradation::CompensationFailed {
                key: failure.key,
                reason: failure.reason,
            });
        }
    }

    /// Republish the active set. Never fails the mutation.
    async fn publish_snapshot(&self, progress: &mut Progress<'_>) {
        let items = match self.repository.find_all_by_status(NewsStatus::Active).await {
            Ok(items) => items,
            Err(e) => {
                progress.degrade(Degradation::SnapshotFailed {
                    code: "RECORD_STORE_FAILED",
                    reason: e.to_string(),
                });
                return;
            }
        };
        let views = self.views(&items).await;

        let snapshots = &self.snapshots;
        let views = views.as_slice();
        let published = self
            .retry
            .run("publish_snapshot", SnapshotError::is_transient, move || {
                snapshots.publish_active_snapshot(views)
            })
            .await;
        match published {
            Ok(_) => progress.advance(MutationStage::SnapshotPublished),
            Err(e) => progress.degrade(Degradation::SnapshotFailed {
                code: e.code(),
                reason: e.to_string(),
            }),
        }
    }

    async fn view(&self, item: &NewsItem) -> NewsView {
        NewsView::from_item(item, self.overview(item.created_by).await)
    }

    async fn views(&self, items: &[NewsItem]) -> Vec<NewsView> {
        let mut authors: HashMap<Uuid, Option<UserOverview>> = HashMap::new();
        let mut views = Vec::with_capacity(items.len());
        for item in items {
            let author = match authors.get(&item.created_by) {
                Some(author) => author.clone(),
                None => {
                    let author = self.overview(item.created_by).await;
                    authors.insert(item.created_by, author.clone());
                    author
                }
            };
            views.push(NewsView::from_item(item, author));
        }
        views
    }

    /// Missing or unreadable users render as no author
    async fn overview(&self, user_id: Uuid) -> Option<UserOverview> {
        match self.users.overview(user_id).await {
            Ok(overview) => overview,
            Err(e) => {
                warn!(%user_id, error = %e, "user lookup failed");
                None
            }
        }
    }
}
