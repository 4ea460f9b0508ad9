//! Core entity structs for the Cellblock simulation.
//!
//! Everything here is plain data: the JSON-compatible field set that the
//! entity store persists and that external callers read. Rules that
//! operate on these structs live in `cellblock-sim`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{BehaviorProfile, EntityKind, Feed};
use crate::ids::{EntityId, HistoryRecordId, KillRecordId, WeaponId};

// ---------------------------------------------------------------------------
// Entity components
// ---------------------------------------------------------------------------

/// Combat stats plus banked experience.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Stats {
    /// Raw attack power added to the weapon bonus.
    pub strength: u32,
    /// Reduces incoming damage.
    pub defense: u32,
    /// Drives counter-attack chance (and crit chance under guard rules).
    pub agility: u32,
    /// Drives the chance to avoid an attack entirely.
    pub dodge: u32,
    /// Experience earned from kills and not yet spent on a stat.
    pub unallocated_xp: u32,
}

/// Long-lived progression counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Progression {
    /// Permanent points; an NPC's max health grows with them.
    pub points: u32,
    /// Currency balance.
    pub money: u64,
    /// Number of fatal attacks landed.
    pub kills: u32,
    /// Number of times this entity was incapacitated by an attack.
    pub deaths: u32,
    /// Total damage dealt by fatal blows.
    pub damage_dealt: u64,
}

/// An equipped weapon. Inventory is external; only the equipped instance
/// is carried on the entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Weapon {
    /// Weapon instance identifier.
    pub id: WeaponId,
    /// Display name ("Sharpened Toothbrush").
    pub name: String,
    /// Flat bonus added to the wielder's strength.
    pub attack_bonus: u32,
    /// Remaining durability; the weapon breaks at zero.
    pub durability: u32,
    /// Durability when new.
    pub max_durability: u32,
    /// Kill-feed template using `[killer]` and `[victim]` placeholders.
    pub death_message: String,
}

impl Weapon {
    /// Create a weapon at full durability.
    pub fn new(
        name: impl Into<String>,
        attack_bonus: u32,
        max_durability: u32,
        death_message: impl Into<String>,
    ) -> Self {
        Self {
            id: WeaponId::new(),
            name: name.into(),
            attack_bonus,
            durability: max_durability,
            max_durability,
            death_message: death_message.into(),
        }
    }
}

/// Where an entity is on the map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Position {
    /// Current area name.
    pub area: String,
    /// When the entity last changed area.
    pub last_move_at: DateTime<Utc>,
    /// Static entities are never relocated by the behavior scheduler.
    pub is_static: bool,
}

/// Life/death flags for the incapacitation state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Lifecycle {
    /// Whether the entity is up and able to act.
    pub is_active: bool,
    /// Whether the entity is down at zero health.
    pub is_incapacitated: bool,
    /// When the entity went down, if it is down.
    pub incapacitated_at: Option<DateTime<Utc>>,
    /// Shortens the natural recovery window; consumed on revival.
    pub fast_revive: bool,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self {
            is_active: true,
            is_incapacitated: false,
            incapacitated_at: None,
            fast_revive: false,
        }
    }
}

/// Temporary effects with an expiry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Buffs {
    /// While in the future, the action point cap is raised.
    pub max_ap_expires_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// The unit of simulation: a player, guard, or static NPC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Entity {
    /// Stable unique identifier.
    pub id: EntityId,
    /// Display name used in kill records.
    pub name: String,
    /// Player, guard, or static NPC.
    pub kind: EntityKind,
    /// Optimistic concurrency counter, bumped by the store on each write.
    pub version: u64,
    /// Current health.
    pub health: u32,
    /// Current action points.
    pub action_points: u32,
    /// Current movement points.
    pub movement_points: u32,
    /// Combat stats and banked experience.
    pub stats: Stats,
    /// Points, money, kill and death counters.
    pub progression: Progression,
    /// The weapon in hand, if any.
    pub equipped_weapon: Option<Weapon>,
    /// Map position.
    pub position: Position,
    /// Incapacitation flags.
    pub lifecycle: Lifecycle,
    /// Current behavior profile (NPCs only).
    pub behavior: Option<BehaviorProfile>,
    /// Temporary effects.
    pub buffs: Buffs,
    /// Regeneration is credited from this instant forward.
    pub last_sync_at: DateTime<Utc>,
}

impl Entity {
    /// Create a fresh, active entity with full base resources.
    ///
    /// Static NPCs are created with `position.is_static` set. Guards start
    /// with the default patrol profile; the scheduler reassigns it later.
    pub fn new(
        name: impl Into<String>,
        kind: EntityKind,
        area: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: EntityId::new(),
            name: name.into(),
            kind,
            version: 0,
            health: 100,
            action_points: 20,
            movement_points: 10,
            stats: Stats::default(),
            progression: Progression::default(),
            equipped_weapon: None,
            position: Position {
                area: area.into(),
                last_move_at: now,
                is_static: kind == EntityKind::StaticNpc,
            },
            lifecycle: Lifecycle::default(),
            behavior: match kind {
                EntityKind::Guard => Some(BehaviorProfile::Patroller),
                EntityKind::Player | EntityKind::StaticNpc => None,
            },
            buffs: Buffs::default(),
            last_sync_at: now,
        }
    }

    /// Whether the entity is down.
    pub const fn is_incapacitated(&self) -> bool {
        self.lifecycle.is_incapacitated
    }
}

// ---------------------------------------------------------------------------
// Combat outcome (ephemeral)
// ---------------------------------------------------------------------------

/// The result of one attack. Never persisted on its own.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct CombatOutcome {
    /// Damage applied to the defender.
    pub damage: u32,
    /// Whether the hit was critical.
    pub is_critical: bool,
    /// Whether the defender dodged (damage is then zero).
    pub is_dodged: bool,
    /// Whether the defender was incapacitated by this hit.
    pub is_fatal: bool,
    /// Damage dealt back to the attacker, if the defender countered.
    pub counter_damage: Option<u32>,
    /// Human-readable description of the counter.
    pub counter_message: Option<String>,
    /// Durability points the attacker's weapon lost.
    pub weapon_wear: u32,
    /// Whether the attacker's weapon broke and was unequipped.
    pub weapon_broken: bool,
    /// Money credited to the attacker on a kill.
    pub money_awarded: Option<u64>,
    /// The kill record appended on a kill.
    pub kill_record_id: Option<KillRecordId>,
}

// ---------------------------------------------------------------------------
// Feed records
// ---------------------------------------------------------------------------

/// Append-only record of one fatal attack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct KillRecord {
    /// Record identifier.
    pub id: KillRecordId,
    /// The attacker.
    pub killer_id: EntityId,
    /// Attacker display name at the time of the kill.
    pub killer_name: String,
    /// The incapacitated defender.
    pub victim_id: EntityId,
    /// Defender display name at the time of the kill.
    pub victim_name: String,
    /// The weapon's death message with names substituted.
    pub weapon_death_message: String,
    /// Area where the kill happened.
    pub area: String,
    /// Money credited to the killer.
    pub money_awarded: u64,
    /// When the kill happened.
    pub timestamp: DateTime<Utc>,
}

/// What a [`HistoryRecord`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum HistoryKind {
    /// A weapon reached zero durability or snapped and was unequipped.
    WeaponBroken,
    /// An entity recovered naturally after its recovery window.
    Revived,
    /// An entity was revived administratively.
    ForceRevived,
}

/// Append-only record of a notable state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct HistoryRecord {
    /// Record identifier.
    pub id: HistoryRecordId,
    /// The entity the change happened to.
    pub entity_id: EntityId,
    /// The kind of change.
    pub kind: HistoryKind,
    /// Free-form detail (weapon name, revival health, ...).
    pub detail: String,
    /// When the change happened.
    pub timestamp: DateTime<Utc>,
}

impl HistoryRecord {
    /// Create a history record stamped with a fresh id.
    pub fn new(
        entity_id: EntityId,
        kind: HistoryKind,
        detail: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: HistoryRecordId::new(),
            entity_id,
            kind,
            detail: detail.into(),
            timestamp,
        }
    }
}

/// A record destined for one of the append-only feeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum FeedRecord {
    /// Goes to [`Feed::Kills`].
    Kill(KillRecord),
    /// Goes to [`Feed::History`].
    History(HistoryRecord),
}

impl FeedRecord {
    /// The feed this record belongs to.
    pub const fn feed(&self) -> Feed {
        match self {
            Self::Kill(_) => Feed::Kills,
            Self::History(_) => Feed::History,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_entity_starts_active_with_base_resources() {
        let now = Utc::now();
        let entity = Entity::new("Rook", EntityKind::Player, "yard", now);
        assert_eq!(entity.health, 100);
        assert_eq!(entity.action_points, 20);
        assert_eq!(entity.movement_points, 10);
        assert!(entity.lifecycle.is_active);
        assert!(!entity.is_incapacitated());
        assert!(!entity.position.is_static);
        assert_eq!(entity.behavior, None);
        assert_eq!(entity.last_sync_at, now);
    }

    #[test]
    fn static_npcs_are_pinned() {
        let entity = Entity::new("Warden", EntityKind::StaticNpc, "office", Utc::now());
        assert!(entity.position.is_static);
    }

    #[test]
    fn guards_start_with_a_profile() {
        let entity = Entity::new("Officer Hale", EntityKind::Guard, "yard", Utc::now());
        assert_eq!(entity.behavior, Some(BehaviorProfile::Patroller));
    }

    #[test]
    fn entity_roundtrips_through_json() {
        let mut entity = Entity::new("Rook", EntityKind::Player, "yard", Utc::now());
        entity.equipped_weapon = Some(Weapon::new("Shiv", 5, 20, "[killer] shanked [victim]"));
        let json = serde_json::to_string(&entity).ok();
        let back: Option<Entity> = json.and_then(|j| serde_json::from_str(&j).ok());
        assert_eq!(back, Some(entity));
    }

    #[test]
    fn feed_record_reports_its_feed() {
        let record = FeedRecord::History(HistoryRecord::new(
            EntityId::new(),
            HistoryKind::WeaponBroken,
            "Shiv",
            Utc::now(),
        ));
        assert_eq!(record.feed(), Feed::History);
    }
}
