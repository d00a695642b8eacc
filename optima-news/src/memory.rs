use std::collections::HashMap;

use anyhow::{bail, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::{CasOutcome, NewsItem, NewsRepository, NewsStatus, UserDirectory, UserOverview};

/// In-memory news store for tests and local development
#[derive(Debug, Default)]
pub struct MemoryNewsRepository {
    items: RwLock<HashMap<Uuid, NewsItem>>,
    offline: RwLock<bool>,
}

impl MemoryNewsRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails while offline
    pub fn set_offline(&self, offline: bool) {
        *self.offline.write() = offline;
    }

    /// Overwrite a record as-is, image version included. Simulates a
    /// writer in another process.
    pub fn force_put(&self, item: NewsItem) {
        self.items.write().insert(item.id, item);
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    fn check(&self) -> Result<()> {
        if *self.offline.read() {
            bail!("news repository is offline");
        }
        Ok(())
    }
}

#[async_trait]
impl NewsRepository for MemoryNewsRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<NewsItem>> {
        self.check()?;
        Ok(self.items.read().get(&id).cloned())
    }

    async fn save(&self, mut item: NewsItem) -> Result<NewsItem> {
        self.check()?;
        let mut items = self.items.write();
        if let Some(stored) = items.get(&item.id) {
            item.image_version = stored.image_version;
        }
        items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn update(&self, mut item: NewsItem) -> Result<Option<NewsItem>> {
        self.check()?;
        let mut items = self.items.write();
        let Some(stored) = items.get_mut(&item.id) else {
            return Ok(None);
        };
        item.image_version = stored.image_version;
        *stored = item.clone();
        Ok(Some(item))
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        self.check()?;
        Ok(self.items.write().remove(&id).is_some())
    }

    async fn find_all_by_status(&self, status: NewsStatus) -> Result<Vec<NewsItem>> {
        self.check()?;
        let mut found: Vec<NewsItem> = self
            .items
            .read()
            .values()
            .filter(|item| item.status == status)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(found)
    }

    async fn count_by_status(&self, status: NewsStatus) -> Result<u64> {
        self.check()?;
        Ok(self
            .items
            .read()
            .values()
            .filter(|item| item.status == status)
            .count() as u64)
    }

    async fn find_latest_updated(&self) -> Result<Option<NewsItem>> {
        self.check()?;
        Ok(self
            .items
            .read()
            .values()
            .max_by_key(|item| item.updated_at)
            .cloned())
    }

    async fn compare_and_set_image_version(
        &self,
        id: Uuid,
        expected: u32,
        new: u32,
    ) -> Result<CasOutcome> {
        self.check()?;
        let mut items = self.items.write();
        let Some(item) = items.get_mut(&id) else {
            return Ok(CasOutcome::Missing);
        };
        if item.image_version != expected {
            return Ok(CasOutcome::Conflict {
                actual: item.image_version,
            });
        }
        item.image_version = new;
        Ok(CasOutcome::Applied)
    }
}

/// Fixed user table
#[derive(Debug, Default)]
pub struct MemoryUserDirectory {
    users: RwLock<HashMap<Uuid, UserOverview>>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user: UserOverview) {
        self.users.write().insert(user.id, user);
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn overview(&self, user_id: Uuid) -> Result<Option<UserOverview>> {
        Ok(self.users.read().get(&user_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NewsCategory;
    use chrono::{Duration, Utc};
    use tokio_test::assert_ok;

    fn item(created_offset: i64) -> NewsItem {
        let at = Utc::now() + Duration::seconds(created_offset);
        NewsItem {
            id: Uuid::new_v4(),
            title: "t".into(),
            summary: "s".into(),
            description: "d".into(),
            category: NewsCategory::Other,
            status: NewsStatus::Active,
            image_version: 0,
            created_at: at,
            updated_at: at,
            created_by: Uuid::new_v4(),
            updated_by: None,
        }
    }

    #[tokio::test]
    async fn save_never_moves_image_version() {
        let repo = MemoryNewsRepository::new();
        let stored = repo.save(item(0)).await.unwrap();

        assert_eq!(
            repo.compare_and_set_image_version(stored.id, 0, 1).await.unwrap(),
            CasOutcome::Applied
        );
        let resaved = repo.save(stored.clone()).await.unwrap();
        assert_eq!(resaved.image_version, 1);

        assert_eq!(
            repo.compare_and_set_image_version(stored.id, 0, 1).await.unwrap(),
            CasOutcome::Conflict { actual: 1 }
        );
        assert_eq!(
            repo.compare_and_set_image_version(Uuid::new_v4(), 0, 1).await.unwrap(),
            CasOutcome::Missing
        );
    }

    #[tokio::test]
    async fn update_never_resurrects_a_deleted_record() {
        let repo = MemoryNewsRepository::new();
        let stored = assert_ok!(repo.save(item(0)).await);
        repo.compare_and_set_image_version(stored.id, 0, 1).await.unwrap();

        let mut edited = stored.clone();
        edited.title = "edited".into();
        let updated = repo.update(edited.clone()).await.unwrap().unwrap();
        assert_eq!(updated.title, "edited");
        assert_eq!(updated.image_version, 1);

        assert!(repo.delete(stored.id).await.unwrap());
        assert!(repo.update(edited).await.unwrap().is_none());
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn status_queries_are_newest_first() {
        let repo = MemoryNewsRepository::new();
        let older = assert_ok!(repo.save(item(-60)).await);
        let newer = assert_ok!(repo.save(item(0)).await);
        let mut archived = item(30);
        archived.status = NewsStatus::Archived;
        let archived = assert_ok!(repo.save(archived).await);

        let active = repo.find_all_by_status(NewsStatus::Active).await.unwrap();
        assert_eq!(
            active.iter().map(|i| i.id).collect::<Vec<_>>(),
            vec![newer.id, older.id]
        );
        assert_eq!(repo.count_by_status(NewsStatus::Archived).await.unwrap(), 1);
        assert_eq!(repo.find_latest_updated().await.unwrap().unwrap().id, archived.id);

        repo.set_offline(true);
        assert!(repo.find_by_id(older.id).await.is_err());
    }
}
