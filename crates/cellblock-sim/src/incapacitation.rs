//! Incapacitation state machine.
//!
//! ```text
//!            health hits 0                    recovery window elapsed
//!  Active ─────────────────▶ Incapacitated ─────────────────────────▶ Active
//!     ▲                           │                (Reviving is the instant
//!     └───── force_revive ────────┘                 the window has elapsed but
//!                                                   the revival is not applied)
//! ```
//!
//! Evaluation is lazy and idempotent: [`evaluate`] only looks at
//! `incapacitated_at`, the fast-revive flag, and `now`, so a read-path
//! check and a periodic sweep converge on the same state.

use chrono::{DateTime, Utc};

use cellblock_types::{Entity, EntityKind};

use crate::config::{EconomyConfig, RecoveryConfig};
use crate::error::SimError;

/// Where an entity is in the incapacitation state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    /// Up and able to act.
    Active,
    /// Down and still inside the recovery window.
    Incapacitated,
    /// Down, but the recovery window has elapsed; the next evaluation revives it.
    Reviving,
}

impl core::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Incapacitated => write!(f, "incapacitated"),
            Self::Reviving => write!(f, "reviving"),
        }
    }
}

/// How an entity came back up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Revival {
    /// The recovery window elapsed.
    Natural {
        /// Health the entity woke up with.
        health: u32,
    },
    /// An administrator intervened.
    Forced {
        /// Health the entity woke up with.
        health: u32,
    },
}

impl Revival {
    /// Health restored by the revival.
    pub const fn health(self) -> u32 {
        match self {
            Self::Natural { health } | Self::Forced { health } => health,
        }
    }
}

/// Current state of an entity at `now`.
pub fn state(entity: &Entity, now: DateTime<Utc>, config: &RecoveryConfig) -> LifecycleState {
    if !entity.is_incapacitated() {
        LifecycleState::Active
    } else if revival_due(entity, now, config) {
        LifecycleState::Reviving
    } else {
        LifecycleState::Incapacitated
    }
}

/// Whether a downed entity's recovery window has elapsed at `now`.
///
/// Monotonic in `now`: once true it stays true. A downed entity with no
/// recorded start time is treated as due.
pub fn revival_due(entity: &Entity, now: DateTime<Utc>, config: &RecoveryConfig) -> bool {
    if !entity.is_incapacitated() {
        return false;
    }
    entity.lifecycle.incapacitated_at.is_none_or(|started| {
        now.signed_duration_since(started) >= config.recovery_window(entity)
    })
}

/// Put an entity down.
///
/// Zeroes health, marks it inactive and incapacitated, records the start of
/// the recovery window, and moves it to the recovery area. Calling this on
/// an entity that is already down leaves the original start time intact.
pub fn incapacitate(entity: &mut Entity, now: DateTime<Utc>, config: &RecoveryConfig) {
    if entity.is_incapacitated() {
        return;
    }
    entity.health = 0;
    entity.lifecycle.is_active = false;
    entity.lifecycle.is_incapacitated = true;
    entity.lifecycle.incapacitated_at = Some(now);
    config.recovery_area.clone_into(&mut entity.position.area);
    entity.position.last_move_at = now;

    tracing::debug!(
        entity_id = %entity.id,
        area = %entity.position.area,
        "Entity incapacitated"
    );
}

/// Apply a natural revival if one is due. Returns what happened, if anything.
///
/// Players wake with `player_revive_health`; NPCs come back at full health.
/// The entity stays in the recovery area and the fast-revive flag is used up.
pub fn evaluate(
    entity: &mut Entity,
    now: DateTime<Utc>,
    recovery: &RecoveryConfig,
    economy: &EconomyConfig,
) -> Option<Revival> {
    if !revival_due(entity, now, recovery) {
        return None;
    }
    let max = economy.max_health(entity);
    let health = match entity.kind {
        EntityKind::Player => recovery.player_revive_health.min(max),
        EntityKind::Guard | EntityKind::StaticNpc => max,
    };
    bring_up(entity, health);

    tracing::debug!(entity_id = %entity.id, health, "Entity revived naturally");
    Some(Revival::Natural { health })
}

/// Revive a downed entity immediately at full health.
pub fn force_revive(entity: &mut Entity, economy: &EconomyConfig) -> Result<Revival, SimError> {
    if !entity.is_incapacitated() {
        return Err(SimError::NotIncapacitated(entity.id));
    }
    let health = economy.max_health(entity);
    bring_up(entity, health);

    tracing::debug!(entity_id = %entity.id, health, "Entity force-revived");
    Ok(Revival::Forced { health })
}

fn bring_up(entity: &mut Entity, health: u32) {
    entity.health = health.max(1);
    entity.lifecycle.is_active = true;
    entity.lifecycle.is_incapacitated = false;
    entity.lifecycle.incapacitated_at = None;
    entity.lifecycle.fast_revive = false;
}
