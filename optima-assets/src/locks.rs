use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::EntityClass;

type LockKey = (EntityClass, Uuid);

/// Per-entity advisory locks. Image replacement for one entity is
/// serialized; different entities never contend.
#[derive(Debug, Default, Clone)]
pub struct EntityLocks {
    locks: Arc<DashMap<LockKey, Arc<Mutex<()>>>>,
}

impl EntityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `(class, id)`. Released on drop.
    pub async fn acquire(&self, class: EntityClass, id: Uuid) -> EntityGuard {
        let key = (class, id);
        let mutex = self
            .locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = mutex.lock_owned().await;

        EntityGuard {
            key,
            guard: Some(guard),
            locks: self.locks.clone(),
        }
    }

    /// Number of entities with a live lock entry
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Held for the duration of one entity's image mutation
#[derive(Debug)]
pub struct EntityGuard {
    key: LockKey,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<DashMap<LockKey, Arc<Mutex<()>>>>,
}

impl Drop for EntityGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the table itself still references the mutex: nobody waits.
        self.locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_entity_is_serialized() {
        let locks = EntityLocks::new();
        let id = Uuid::new_v4();

        let first = locks.acquire(EntityClass::News, id).await;
        let contender = tokio::time::timeout(
            Duration::from_millis(30),
            locks.acquire(EntityClass::News, id),
        )
        .await;
        assert!(contender.is_err());

        drop(first);
        let _second = locks.acquire(EntityClass::News, id).await;
    }

    #[tokio::test]
    async fn different_entities_do_not_contend_and_entries_are_released() {
        let locks = EntityLocks::new();
        let a = locks.acquire(EntityClass::News, Uuid::new_v4()).await;
        let b = locks.acquire(EntityClass::User, Uuid::new_v4()).await;
        assert_eq!(locks.len(), 2);

        drop(a);
        drop(b);
        assert!(locks.is_empty());
    }
}
