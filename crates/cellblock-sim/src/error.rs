//! Error types for the cellblock-sim crate.
//!
//! Every rule violation is reported before anything is mutated, so a
//! returned [`SimError`] always means the entity is exactly as it was.

use cellblock_types::{EntityId, ResourceKind};

/// Errors raised by the simulation rules.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SimError {
    /// Attempted to spend more of a resource than the entity holds.
    #[error("insufficient {resource}: wanted {requested} but only have {available}")]
    InsufficientResource {
        /// The resource being spent.
        resource: ResourceKind,
        /// The amount the caller attempted to spend.
        requested: u32,
        /// The amount the entity actually holds.
        available: u32,
    },

    /// The attacker cannot pay the attack cost.
    #[error("insufficient action points: attack costs {required} but only have {available}")]
    InsufficientActionPoints {
        /// Fixed attack cost.
        required: u32,
        /// The attacker's current action points.
        available: u32,
    },

    /// The defender is already incapacitated.
    #[error("target {0} is already down")]
    TargetAlreadyDown(EntityId),

    /// Attacking requires an equipped weapon.
    #[error("entity {0} has no weapon equipped")]
    NoWeaponEquipped(EntityId),

    /// The attacker is incapacitated and cannot act.
    #[error("attacker {0} is incapacitated")]
    AttackerIncapacitated(EntityId),

    /// An entity tried to attack itself.
    #[error("entity {0} cannot attack itself")]
    SelfTarget(EntityId),

    /// The entity is incapacitated and the action needs it to be up.
    #[error("entity {0} is incapacitated")]
    Incapacitated(EntityId),

    /// The entity is not incapacitated, so it cannot be revived.
    #[error("entity {0} is not incapacitated")]
    NotIncapacitated(EntityId),

    /// Attempted to spend more experience than is banked.
    #[error("insufficient experience: wanted {requested} but only have {available}")]
    InsufficientExperience {
        /// The amount the caller attempted to allocate.
        requested: u32,
        /// Banked unallocated experience.
        available: u32,
    },

    /// Amounts must be strictly positive.
    #[error("invalid amount: {0}")]
    InvalidAmount(u32),

    /// An arithmetic overflow occurred during a computation.
    #[error("arithmetic overflow: {context}")]
    ArithmeticOverflow {
        /// Description of what was being computed.
        context: String,
    },
}
