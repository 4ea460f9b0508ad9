//! Error types for the entity store.
//!
//! All errors are propagated via [`StoreError`]. Callers retry on
//! [`StoreError::is_transient`] errors (version conflicts and backend
//! failures) by re-reading and re-applying their operation.

use cellblock_types::EntityId;

/// Errors that can occur in the entity store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No entity is stored under the id.
    #[error("entity not found: {0}")]
    NotFound(EntityId),

    /// The entity changed since it was read (optimistic concurrency collision).
    #[error("version conflict on entity {id}: expected version {expected}")]
    Conflict {
        /// The contended entity.
        id: EntityId,
        /// The version the writer read.
        expected: u64,
    },

    /// An insert collided with an existing entity.
    #[error("entity already exists: {0}")]
    AlreadyExists(EntityId),

    /// A transient backend failure.
    #[error("store backend error: {0}")]
    Backend(String),

    /// A `Dragonfly`/Redis operation failed.
    #[error("Dragonfly error: {0}")]
    Dragonfly(#[from] fred::error::Error),

    /// A serialization or deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// Whether re-reading and retrying the operation may succeed.
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Conflict { .. } | Self::Backend(_) | Self::Dragonfly(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflicts_and_backend_failures_are_transient() {
        let id = EntityId::new();
        assert!(StoreError::Conflict { id, expected: 3 }.is_transient());
        assert!(StoreError::Backend(String::from("timeout")).is_transient());
        assert!(!StoreError::NotFound(id).is_transient());
        assert!(!StoreError::AlreadyExists(id).is_transient());
    }
}
