//! Error types for engine operations.

use cellblock_sim::SimError;
use cellblock_store::StoreError;
use cellblock_types::{EntityId, WeaponId};

/// Errors returned by [`Engine`](crate::engine::Engine) operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A game rule rejected the operation; nothing was changed.
    #[error(transparent)]
    Sim(#[from] SimError),

    /// The operation named an entity that does not exist.
    #[error("entity not found: {0}")]
    EntityNotFound(EntityId),

    /// The entity store failed.
    #[error("store error: {0}")]
    Store(StoreError),

    /// The weapon named in an attack is not the one equipped.
    #[error("weapon {weapon} is not equipped by {entity}")]
    WeaponMismatch {
        /// The attacker.
        entity: EntityId,
        /// The weapon named by the caller.
        weapon: WeaponId,
    },

    /// Every attempt failed with a transient error.
    #[error("gave up after {attempts} attempts: {source}")]
    RetriesExhausted {
        /// Attempts made.
        attempts: u32,
        /// The last failure.
        source: Box<EngineError>,
    },
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::EntityNotFound(id),
            other => Self::Store(other),
        }
    }
}

impl EngineError {
    /// Whether re-reading and re-applying the operation may succeed.
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Store(err) => err.is_transient(),
            Self::Sim(_)
            | Self::EntityNotFound(_)
            | Self::WeaponMismatch { .. }
            | Self::RetriesExhausted { .. } => false,
        }
    }

    /// Whether a version conflict is at the root of this error.
    pub fn is_conflict(&self) -> bool {
        match self {
            Self::Store(StoreError::Conflict { .. }) => true,
            Self::RetriesExhausted { source, .. } => source.is_conflict(),
            _ => false,
        }
    }
}
