//! The entity store adapter interface.
//!
//! Every write is a compare-and-swap on [`Entity::version`]: the caller
//! hands back the entity as it read it (mutated), and the store accepts the
//! write only if the stored version still matches, bumping it by one.

use std::future::Future;

use cellblock_types::{Entity, EntityId, Feed, FeedRecord};

use crate::error::StoreError;

/// A group of entity writes and feed appends applied atomically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreBatch {
    /// Entities to write, each carrying the version it was read at.
    pub writes: Vec<Entity>,
    /// Records to append once every write is accepted.
    pub appends: Vec<FeedRecord>,
}

impl StoreBatch {
    /// Create an empty batch.
    pub const fn new() -> Self {
        Self {
            writes: Vec::new(),
            appends: Vec::new(),
        }
    }

    /// Add an entity write.
    #[must_use]
    pub fn write(mut self, entity: Entity) -> Self {
        self.writes.push(entity);
        self
    }

    /// Add a feed append.
    #[must_use]
    pub fn append(mut self, record: FeedRecord) -> Self {
        self.appends.push(record);
        self
    }

    /// Whether the batch does nothing.
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty() && self.appends.is_empty()
    }
}

/// Key-value persistence for entities and append-only feeds.
///
/// Implementations must be safe to share across tasks. Writes are atomic at
/// the level of one call: [`EntityStore::commit`] applies all of its writes
/// and appends or none of them.
pub trait EntityStore: Send + Sync {
    /// Read one entity.
    fn get(&self, id: EntityId) -> impl Future<Output = Result<Entity, StoreError>> + Send;

    /// Store a new entity. The stored copy (version 1) is returned.
    fn insert(&self, entity: &Entity) -> impl Future<Output = Result<Entity, StoreError>> + Send;

    /// Write one entity if its version is unchanged. Returns the stored copy.
    fn update(&self, entity: &Entity) -> impl Future<Output = Result<Entity, StoreError>> + Send;

    /// Append one record to its feed.
    fn append(&self, record: &FeedRecord) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Apply a batch atomically. Returns the stored copies in batch order.
    fn commit(
        &self,
        batch: &StoreBatch,
    ) -> impl Future<Output = Result<Vec<Entity>, StoreError>> + Send;

    /// Read every entity.
    fn list(&self) -> impl Future<Output = Result<Vec<Entity>, StoreError>> + Send;

    /// Read a feed, oldest record first.
    fn read_feed(&self, feed: Feed)
    -> impl Future<Output = Result<Vec<FeedRecord>, StoreError>> + Send;
}
