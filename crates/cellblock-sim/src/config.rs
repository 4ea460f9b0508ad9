//! Configuration constants and defaults for the simulation rules.
//!
//! Every tunable of the resource economy, combat resolver, recovery state
//! machine, loot lottery, and NPC relocation lives here. Each struct
//! deserializes with `#[serde(default)]` so `cellblock-config.yaml` only
//! needs to name the values it overrides; the defaults reproduce the live
//! game's numbers.

use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;

use cellblock_types::{Entity, EntityKind, ResourceKind};

// ---------------------------------------------------------------------------
// Economy
// ---------------------------------------------------------------------------

/// Caps and regeneration rates for health, action points, and movement points.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    /// Maximum health of a player (default: 100).
    pub player_max_health: u32,
    /// NPC max health before points are added (default: 100).
    pub npc_base_health: u32,
    /// NPC max health gained per permanent point (default: 50).
    pub npc_health_per_point: u32,
    /// Health regenerated per elapsed minute, players only (default: 1).
    pub health_regen_per_minute: u32,
    /// Action point cap without a buff (default: 20).
    pub base_max_action_points: u32,
    /// Action point cap while the buff is running (default: 30).
    pub buffed_max_action_points: u32,
    /// Action points regenerated per elapsed minute (default: 1).
    pub ap_regen_per_minute: u32,
    /// Movement point cap (default: 10).
    pub max_movement_points: u32,
    /// Movement points regenerated per elapsed minute (default: 2).
    pub mp_regen_per_minute: u32,
    /// Movement points debited per area change (default: 1).
    pub move_cost: u32,
    /// Area in which action points do not regenerate (default: `"isolation"`).
    pub isolation_area: String,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            player_max_health: 100,
            npc_base_health: 100,
            npc_health_per_point: 50,
            health_regen_per_minute: 1,
            base_max_action_points: 20,
            buffed_max_action_points: 30,
            ap_regen_per_minute: 1,
            max_movement_points: 10,
            mp_regen_per_minute: 2,
            move_cost: 1,
            isolation_area: String::from("isolation"),
        }
    }
}

impl EconomyConfig {
    /// Maximum health for an entity.
    ///
    /// Players are fixed at `player_max_health`. NPCs scale with their
    /// permanent points: `npc_base_health + points * npc_health_per_point`.
    pub const fn max_health(&self, entity: &Entity) -> u32 {
        match entity.kind {
            EntityKind::Player => self.player_max_health,
            EntityKind::Guard | EntityKind::StaticNpc => self.npc_base_health.saturating_add(
                entity
                    .progression
                    .points
                    .saturating_mul(self.npc_health_per_point),
            ),
        }
    }

    /// Whether the max-AP buff is running at `now`.
    pub fn buff_active(entity: &Entity, now: DateTime<Utc>) -> bool {
        entity.buffs.max_ap_expires_at.is_some_and(|expiry| expiry > now)
    }

    /// Action point cap at `now`.
    pub fn max_action_points(&self, entity: &Entity, now: DateTime<Utc>) -> u32 {
        if Self::buff_active(entity, now) {
            self.buffed_max_action_points
        } else {
            self.base_max_action_points
        }
    }

    /// Cap for any resource at `now`.
    pub fn max_for(&self, entity: &Entity, resource: ResourceKind, now: DateTime<Utc>) -> u32 {
        match resource {
            ResourceKind::Health => self.max_health(entity),
            ResourceKind::ActionPoints => self.max_action_points(entity, now),
            ResourceKind::MovementPoints => self.max_movement_points,
        }
    }
}

// ---------------------------------------------------------------------------
// Combat
// ---------------------------------------------------------------------------

/// A linear probability curve: `min(base + stat * per_point, cap)`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ChanceCurve {
    /// Probability at stat zero.
    pub base: f64,
    /// Probability added per stat point.
    pub per_point: f64,
    /// Upper bound on the probability.
    pub cap: f64,
}

impl ChanceCurve {
    /// Evaluate the curve for a stat value.
    pub fn at(&self, stat: u32) -> f64 {
        f64::from(stat).mul_add(self.per_point, self.base).min(self.cap)
    }
}

/// How the defender's defense reduces incoming damage.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefenseReduction {
    /// `defense * factor`.
    Fixed {
        /// Multiplier applied to defense.
        factor: f64,
    },
    /// `defense * U(min, max)`, drawn per hit.
    Randomized {
        /// Lowest multiplier.
        min: f64,
        /// Highest multiplier.
        max: f64,
    },
}

/// How much a critical hit multiplies damage.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CritMultiplier {
    /// Always the same multiplier.
    Fixed {
        /// The multiplier.
        factor: f64,
    },
    /// `U(min, max)`, drawn per critical hit.
    Randomized {
        /// Lowest multiplier.
        min: f64,
        /// Highest multiplier.
        max: f64,
    },
}

/// Which stat drives the critical-hit chance.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CritChance {
    /// Attacker strength plus weapon bonus.
    AttackStat(ChanceCurve),
    /// Attacker agility.
    Agility(ChanceCurve),
}

/// A named variant of the damage-formula constants.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct CombatRuleset {
    /// Lowest damage variance factor.
    pub variance_min: f64,
    /// Highest damage variance factor.
    pub variance_max: f64,
    /// Defense reduction rule.
    pub defense_reduction: DefenseReduction,
    /// Critical multiplier rule.
    pub crit_multiplier: CritMultiplier,
    /// Critical chance rule.
    pub crit_chance: CritChance,
}

impl CombatRuleset {
    /// Player-vs-player rules: variance 0.85--1.15, randomized defense
    /// reduction 0.25--0.75, randomized crit multiplier 1.5--2.0, crit
    /// chance from attack stat.
    pub const fn standard() -> Self {
        Self {
            variance_min: 0.85,
            variance_max: 1.15,
            defense_reduction: DefenseReduction::Randomized { min: 0.25, max: 0.75 },
            crit_multiplier: CritMultiplier::Randomized { min: 1.5, max: 2.0 },
            crit_chance: CritChance::AttackStat(ChanceCurve {
                base: 0.05,
                per_point: 0.01,
                cap: 0.5,
            }),
        }
    }

    /// Rules used whenever a guard is involved: variance 0.8--1.2, fixed
    /// half-defense reduction, fixed 1.5 crit multiplier, crit chance from
    /// agility.
    pub const fn guard() -> Self {
        Self {
            variance_min: 0.8,
            variance_max: 1.2,
            defense_reduction: DefenseReduction::Fixed { factor: 0.5 },
            crit_multiplier: CritMultiplier::Fixed { factor: 1.5 },
            crit_chance: CritChance::Agility(ChanceCurve {
                base: 0.1,
                per_point: 0.01,
                cap: 0.5,
            }),
        }
    }
}

/// Combat resolver parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    /// Action points spent per attack (default: 5).
    pub attack_cost: u32,
    /// Dodge chance from the defender's dodge stat (5% + 1%/pt, cap 50%).
    pub dodge: ChanceCurve,
    /// Counter chance from the defender's agility (70% + 1%/pt, cap 90%).
    pub counter: ChanceCurve,
    /// Least durability a hit costs the weapon (default: 1).
    pub min_wear: u32,
    /// Most durability a hit costs the weapon (default: 3).
    pub max_wear: u32,
    /// Durability percentage at or below which a weapon may snap (default: 40).
    pub fragile_threshold_pct: u32,
    /// Chance per hit that a fragile weapon snaps (default: 0.15).
    pub fragile_break_chance: f64,
    /// Player-vs-player rules.
    pub standard: CombatRuleset,
    /// Rules for fights involving a guard.
    pub guard: CombatRuleset,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            attack_cost: 5,
            dodge: ChanceCurve {
                base: 0.05,
                per_point: 0.01,
                cap: 0.5,
            },
            counter: ChanceCurve {
                base: 0.7,
                per_point: 0.01,
                cap: 0.9,
            },
            min_wear: 1,
            max_wear: 3,
            fragile_threshold_pct: 40,
            fragile_break_chance: 0.15,
            standard: CombatRuleset::standard(),
            guard: CombatRuleset::guard(),
        }
    }
}

// ---------------------------------------------------------------------------
// Recovery
// ---------------------------------------------------------------------------

/// Incapacitation and revival parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Minutes until natural revival (default: 120).
    pub recovery_minutes: i64,
    /// Minutes until natural revival with the fast-revive flag (default: 30).
    pub fast_recovery_minutes: i64,
    /// Health a player wakes up with after natural recovery (default: 20).
    pub player_revive_health: u32,
    /// Area downed entities are moved to (default: `"infirmary"`).
    pub recovery_area: String,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            recovery_minutes: 120,
            fast_recovery_minutes: 30,
            player_revive_health: 20,
            recovery_area: String::from("infirmary"),
        }
    }
}

impl RecoveryConfig {
    /// Recovery window for an entity, honoring its fast-revive flag.
    pub fn recovery_window(&self, entity: &Entity) -> TimeDelta {
        let minutes = if entity.lifecycle.fast_revive {
            self.fast_recovery_minutes
        } else {
            self.recovery_minutes
        };
        TimeDelta::try_minutes(minutes.max(0)).unwrap_or(TimeDelta::MAX)
    }
}

// ---------------------------------------------------------------------------
// Loot
// ---------------------------------------------------------------------------

/// One tier of the money lottery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct LootTier {
    /// Relative weight (the defaults sum to 100, i.e. percent).
    pub weight: u32,
    /// Smallest amount this tier pays (inclusive).
    pub min: u64,
    /// Largest amount this tier pays (inclusive).
    pub max: u64,
}

/// Kill rewards.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LootConfig {
    /// Weighted money tiers. Exactly one fires per kill.
    pub tiers: Vec<LootTier>,
    /// Unallocated experience credited per kill (default: 5).
    pub xp_per_kill: u32,
    /// Permanent points credited per kill (default: 2).
    pub points_per_kill: u32,
    /// Kill-feed template used when the weapon has none.
    pub default_death_message: String,
}

impl Default for LootConfig {
    fn default() -> Self {
        Self {
            tiers: vec![
                LootTier { weight: 60, min: 500, max: 2000 },
                LootTier { weight: 30, min: 2001, max: 5000 },
                LootTier { weight: 8, min: 5001, max: 8000 },
                LootTier { weight: 2, min: 8001, max: 10_000 },
            ],
            xp_per_kill: 5,
            points_per_kill: 2,
            default_death_message: String::from("[killer] took down [victim]"),
        }
    }
}

impl LootConfig {
    /// Check that the lottery can always pay out.
    ///
    /// Returns a description of the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.tiers.is_empty() {
            return Err(String::from("loot table has no tiers"));
        }
        if self.tiers.iter().all(|tier| tier.weight == 0) {
            return Err(String::from("loot table weights sum to zero"));
        }
        if let Some(tier) = self.tiers.iter().find(|tier| tier.min > tier.max) {
            return Err(format!("loot tier {}..{} has min > max", tier.min, tier.max));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Behavior
// ---------------------------------------------------------------------------

/// NPC relocation parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Areas roaming NPCs are spread over uniformly.
    pub patrol_areas: Vec<String>,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            patrol_areas: [
                "cell_block_a",
                "cell_block_b",
                "cafeteria",
                "yard",
                "gym",
                "library",
                "showers",
                "workshop",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}
