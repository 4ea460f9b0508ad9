//! In-process entity store.
//!
//! Backs tests and single-process deployments. All state sits behind one
//! async mutex, so a commit is trivially atomic. Transient failures can be
//! injected to exercise callers' retry paths.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};

use tokio::sync::Mutex;

use cellblock_types::{Entity, EntityId, Feed, FeedRecord};

use crate::error::StoreError;
use crate::store::{EntityStore, StoreBatch};

#[derive(Debug, Default)]
struct Inner {
    entities: BTreeMap<EntityId, Entity>,
    feeds: BTreeMap<Feed, Vec<FeedRecord>>,
}

/// An [`EntityStore`] held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    failing_commits: AtomicU32,
    failing_updates: AtomicU32,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` calls to [`EntityStore::commit`] fail with
    /// [`StoreError::Backend`].
    pub fn fail_next_commits(&self, count: u32) {
        self.failing_commits.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` calls to [`EntityStore::update`] fail with
    /// [`StoreError::Backend`].
    pub fn fail_next_updates(&self, count: u32) {
        self.failing_updates.store(count, Ordering::SeqCst);
    }

    /// Number of stored entities.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.entities.len()
    }

    /// Whether no entities are stored.
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.entities.is_empty()
    }

    /// Consume one injected failure, if any are pending.
    fn take_fault(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// Validate every write against the stored versions, then apply the batch.
fn apply(inner: &mut Inner, batch: &StoreBatch) -> Result<Vec<Entity>, StoreError> {
    let mut staged: BTreeMap<EntityId, Entity> = BTreeMap::new();
    let mut stored = Vec::with_capacity(batch.writes.len());

    for entity in &batch.writes {
        let current = staged
            .get(&entity.id)
            .or_else(|| inner.entities.get(&entity.id))
            .map(|current| current.version)
            .ok_or(StoreError::NotFound(entity.id))?;
        if current != entity.version {
            return Err(StoreError::Conflict {
                id: entity.id,
                expected: entity.version,
            });
        }
        let mut next = entity.clone();
        next.version = entity.version.saturating_add(1);
        staged.insert(next.id, next.clone());
        stored.push(next);
    }

    inner.entities.extend(staged);
    for record in &batch.appends {
        inner
            .feeds
            .entry(record.feed())
            .or_default()
            .push(record.clone());
    }
    Ok(stored)
}

impl EntityStore for MemoryStore {
    async fn get(&self, id: EntityId) -> Result<Entity, StoreError> {
        self.inner
            .lock()
            .await
            .entities
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn insert(&self, entity: &Entity) -> Result<Entity, StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.entities.contains_key(&entity.id) {
            return Err(StoreError::AlreadyExists(entity.id));
        }
        let mut stored = entity.clone();
        stored.version = 1;
        inner.entities.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update(&self, entity: &Entity) -> Result<Entity, StoreError> {
        if Self::take_fault(&self.failing_updates) {
            return Err(StoreError::Backend(String::from("injected update failure")));
        }
        let batch = StoreBatch::new().write(entity.clone());
        let mut inner = self.inner.lock().await;
        apply(&mut inner, &batch)?
            .pop()
            .ok_or(StoreError::NotFound(entity.id))
    }

    async fn append(&self, record: &FeedRecord) -> Result<(), StoreError> {
        self.inner
            .lock()
            .await
            .feeds
            .entry(record.feed())
            .or_default()
            .push(record.clone());
        Ok(())
    }

    async fn commit(&self, batch: &StoreBatch) -> Result<Vec<Entity>, StoreError> {
        if Self::take_fault(&self.failing_commits) {
            return Err(StoreError::Backend(String::from("injected commit failure")));
        }
        let mut inner = self.inner.lock().await;
        apply(&mut inner, batch)
    }

    async fn list(&self) -> Result<Vec<Entity>, StoreError> {
        Ok(self.inner.lock().await.entities.values().cloned().collect())
    }

    async fn read_feed(&self, feed: Feed) -> Result<Vec<FeedRecord>, StoreError> {
        Ok(self
            .inner
            .lock()
            .await
            .feeds
            .get(&feed)
            .cloned()
            .unwrap_or_default())
    }
}
