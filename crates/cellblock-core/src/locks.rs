//! Per-entity lock table.
//!
//! Serializes read-modify-write cycles on the same entity inside one
//! process. Operations touching several entities take their locks in
//! ascending id order, so two attacks between the same pair cannot
//! deadlock. Cross-process safety comes from the store's version check.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

use cellblock_types::EntityId;

/// Held locks for one or more entities. Dropping it releases them.
#[derive(Debug)]
pub struct EntityGuard {
    _guards: Vec<OwnedMutexGuard<()>>,
}

/// Lazily populated map from entity id to its mutex.
#[derive(Debug, Default)]
pub struct EntityLocks {
    table: Mutex<HashMap<EntityId, Arc<Mutex<()>>>>,
}

impl EntityLocks {
    /// Create an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock one entity.
    pub async fn lock(&self, id: EntityId) -> EntityGuard {
        self.lock_many(&[id]).await
    }

    /// Lock several entities in ascending id order. Duplicates are locked once.
    pub async fn lock_many(&self, ids: &[EntityId]) -> EntityGuard {
        let mut ordered = ids.to_vec();
        ordered.sort_unstable();
        ordered.dedup();

        let mutexes: Vec<Arc<Mutex<()>>> = {
            let mut table = self.table.lock().await;
            ordered
                .iter()
                .map(|id| Arc::clone(table.entry(*id).or_default()))
                .collect()
        };

        let mut guards = Vec::with_capacity(mutexes.len());
        for mutex in mutexes {
            guards.push(mutex.lock_owned().await);
        }
        EntityGuard { _guards: guards }
    }

    /// Number of entities that have ever been locked.
    pub async fn len(&self) -> usize {
        self.table.lock().await.len()
    }

    /// Whether no entity has been locked yet.
    pub async fn is_empty(&self) -> bool {
        self.table.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn second_lock_waits_for_the_first() {
        let locks = Arc::new(EntityLocks::new());
        let id = EntityId::new();
        let guard = locks.lock(id).await;

        let contender = Arc::clone(&locks);
        let handle = tokio::spawn(async move {
            let _guard = contender.lock(id).await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_finished());
        drop(guard);
        assert!(handle.await.is_ok());
    }

    #[tokio::test]
    async fn opposite_order_pairs_do_not_deadlock() {
        let locks = Arc::new(EntityLocks::new());
        let a = EntityId::new();
        let b = EntityId::new();

        let mut handles = Vec::new();
        for i in 0..50 {
            let locks = Arc::clone(&locks);
            handles.push(tokio::spawn(async move {
                let pair = if i % 2 == 0 { [a, b] } else { [b, a] };
                let _guard = locks.lock_many(&pair).await;
                tokio::task::yield_now().await;
            }));
        }
        let all = tokio::time::timeout(Duration::from_secs(5), futures::future::join_all(handles))
            .await;
        assert!(all.is_ok(), "lock ordering deadlocked");
        assert_eq!(locks.len().await, 2);
    }

    #[tokio::test]
    async fn duplicate_ids_lock_once() {
        let locks = EntityLocks::new();
        let id = EntityId::new();
        let _guard = locks.lock_many(&[id, id]).await;
        assert_eq!(locks.len().await, 1);
    }
}
