use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::{NewsItem, NewsStatus, UserOverview};

/// Result of a conditional image version update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    Applied,
    /// The stored version was not the expected one
    Conflict { actual: u32 },
    /// The record no longer exists
    Missing,
}

/// Durable record store for news.
///
/// `image_version` is owned by [`compare_and_set_image_version`]: `save`
/// and `update` must keep the stored value for a record that already
/// exists.
///
/// [`compare_and_set_image_version`]: NewsRepository::compare_and_set_image_version
#[async_trait]
pub trait NewsRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<NewsItem>>;

    /// Insert or update; returns the record as stored
    async fn save(&self, item: NewsItem) -> Result<NewsItem>;

    /// Replace an existing record. `None` when it no longer exists; a
    /// deleted record is never written back.
    async fn update(&self, item: NewsItem) -> Result<Option<NewsItem>>;

    /// Returns whether a record was removed
    async fn delete(&self, id: Uuid) -> Result<bool>;

    async fn find_all_by_status(&self, status: NewsStatus) -> Result<Vec<NewsItem>>;

    async fn count_by_status(&self, status: NewsStatus) -> Result<u64>;

    /// Most recently updated record, any status
    async fn find_latest_updated(&self) -> Result<Option<NewsItem>>;

    /// Set `image_version` to `new` only if it currently equals `expected`
    async fn compare_and_set_image_version(
        &self,
        id: Uuid,
        expected: u32,
        new: u32,
    ) -> Result<CasOutcome>;
}

/// Read-only lookup of user display data
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn overview(&self, user_id: Uuid) -> Result<Option<UserOverview>>;
}
