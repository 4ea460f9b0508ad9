//! NPC behavior profiles and relocation planning.
//!
//! Relocation is coarse: each sweep gives every eligible NPC a uniformly
//! drawn area and a uniformly drawn profile. Of the profile parameters only
//! the reaction time is simulated here; an NPC is not moved again until it
//! has elapsed since its last move. The rest are carried for higher-level AI.

use chrono::{DateTime, TimeDelta, Utc};
use rand::Rng;

use cellblock_types::{BehaviorProfile, Entity, EntityId, EntityKind};

use crate::rolls;

/// Tunables attached to a behavior profile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BehaviorParameters {
    /// Hostility in `[0, 1]` above which the NPC engages.
    pub aggression_threshold: f64,
    /// How long the NPC keeps chasing a target.
    pub pursuit_duration_secs: u32,
    /// How many neighbouring areas a patrol circuit spans.
    pub patrol_radius: u32,
    /// How far the NPC notices disturbances.
    pub detection_range: u32,
    /// Delay before the NPC reacts.
    pub reaction_time_ms: u32,
    /// How long the NPC remembers a disturbance.
    pub memory_window_secs: u32,
}

/// Parameters for a profile.
pub const fn parameters(profile: BehaviorProfile) -> BehaviorParameters {
    match profile {
        BehaviorProfile::Aggressive => BehaviorParameters {
            aggression_threshold: 0.3,
            pursuit_duration_secs: 120,
            patrol_radius: 3,
            detection_range: 8,
            reaction_time_ms: 300,
            memory_window_secs: 300,
        },
        BehaviorProfile::Defensive => BehaviorParameters {
            aggression_threshold: 0.8,
            pursuit_duration_secs: 20,
            patrol_radius: 1,
            detection_range: 5,
            reaction_time_ms: 800,
            memory_window_secs: 120,
        },
        BehaviorProfile::Patroller => BehaviorParameters {
            aggression_threshold: 0.5,
            pursuit_duration_secs: 60,
            patrol_radius: 6,
            detection_range: 6,
            reaction_time_ms: 500,
            memory_window_secs: 180,
        },
        BehaviorProfile::Investigator => BehaviorParameters {
            aggression_threshold: 0.6,
            pursuit_duration_secs: 90,
            patrol_radius: 4,
            detection_range: 10,
            reaction_time_ms: 600,
            memory_window_secs: 600,
        },
        BehaviorProfile::Sentinel => BehaviorParameters {
            aggression_threshold: 0.7,
            pursuit_duration_secs: 30,
            patrol_radius: 0,
            detection_range: 12,
            reaction_time_ms: 400,
            memory_window_secs: 240,
        },
    }
}

impl BehaviorParameters {
    /// Least time between two moves of an NPC with this profile.
    pub fn reaction_time(&self) -> TimeDelta {
        TimeDelta::milliseconds(i64::from(self.reaction_time_ms))
    }
}

/// One NPC's planned move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relocation {
    /// The relocated entity.
    pub entity_id: EntityId,
    /// Area before the move.
    pub from_area: String,
    /// Area after the move (may equal `from_area`).
    pub to_area: String,
    /// Newly assigned profile.
    pub profile: BehaviorProfile,
}

/// Whether the behavior sweep may touch this entity.
///
/// Players, static NPCs, and inactive or downed NPCs are left alone.
pub const fn is_eligible(entity: &Entity) -> bool {
    !matches!(entity.kind, EntityKind::Player)
        && !entity.position.is_static
        && entity.lifecycle.is_active
        && !entity.lifecycle.is_incapacitated
}

/// Whether an NPC's current profile lets it move again at `now`.
///
/// NPCs without a profile are always ready.
pub fn is_ready(entity: &Entity, now: DateTime<Utc>) -> bool {
    entity.behavior.is_none_or(|profile| {
        now.signed_duration_since(entity.position.last_move_at) >= parameters(profile).reaction_time()
    })
}

/// Reassign an eligible NPC's area and profile.
///
/// Draws the area first, then the profile. Returns `None` and leaves the
/// entity untouched when it is not eligible, when its profile's reaction
/// time has not elapsed since its last move, or when `areas` is empty.
pub fn reassign<R: Rng + ?Sized>(
    entity: &mut Entity,
    areas: &[String],
    now: DateTime<Utc>,
    rng: &mut R,
) -> Option<Relocation> {
    if !is_eligible(entity) || !is_ready(entity, now) {
        return None;
    }
    let to_area = rolls::pick(rng, areas)?.clone();
    let profile = *rolls::pick(rng, &BehaviorProfile::ALL)?;

    let from_area = core::mem::replace(&mut entity.position.area, to_area.clone());
    entity.position.last_move_at = now;
    entity.behavior = Some(profile);

    tracing::trace!(
        entity_id = %entity.id,
        from = %from_area,
        to = %to_area,
        profile = %profile,
        "NPC relocated"
    );

    Some(Relocation {
        entity_id: entity.id,
        from_area,
        to_area,
        profile,
    })
}
