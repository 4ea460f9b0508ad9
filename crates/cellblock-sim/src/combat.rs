//! Combat resolver: the outcome of one attack.
//!
//! ## Attack flow
//!
//! 1. Validate preconditions (attacker up and armed, defender up, AP >= cost)
//! 2. Dodge check; a dodge costs the attacker AP but no weapon wear
//! 3. Critical check (stat depends on the ruleset)
//! 4. Base damage `floor((strength + bonus - reduction) * variance)`, min 1
//! 5. Critical multiplier
//! 6. Apply damage to the defender, flooring health at 0
//! 7. Weapon wear and breakage
//! 8. Counter-attack if the defender is still up
//! 9. Debit the attack cost
//!
//! ## Draw order
//!
//! Randomness is consumed in a fixed order so a seeded generator replays a
//! fight exactly: dodge, crit, variance, defense reduction (randomized rules
//! only), crit multiplier (randomized rules, crits only), wear, fragile
//! breakage (fragile weapons only), counter, counter variance, counter
//! defense reduction (randomized rules only).
//!
//! The resolver mutates the two entities it is handed. Incapacitation and
//! kill rewards are applied afterwards by the caller.

use rand::Rng;
use serde::Deserialize;

use cellblock_types::{CombatOutcome, Entity, EntityKind, Weapon};

use crate::config::{CombatConfig, CombatRuleset, CritChance, CritMultiplier, DefenseReduction};
use crate::error::SimError;
use crate::rolls;

// ---------------------------------------------------------------------------
// Ruleset selection
// ---------------------------------------------------------------------------

/// Which damage-formula variant applies to a fight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RulesetKind {
    /// Player-vs-player rules.
    Standard,
    /// Rules for any fight involving a guard.
    Guard,
}

impl RulesetKind {
    /// Pick the ruleset for a fight between two kinds of entity.
    pub const fn for_matchup(attacker: EntityKind, defender: EntityKind) -> Self {
        match (attacker, defender) {
            (EntityKind::Guard, _) | (_, EntityKind::Guard) => Self::Guard,
            _ => Self::Standard,
        }
    }
}

impl core::fmt::Display for RulesetKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Standard => write!(f, "standard"),
            Self::Guard => write!(f, "guard"),
        }
    }
}

impl CombatConfig {
    /// The ruleset constants for a kind.
    pub const fn ruleset(&self, kind: RulesetKind) -> &CombatRuleset {
        match kind {
            RulesetKind::Standard => &self.standard,
            RulesetKind::Guard => &self.guard,
        }
    }
}

// ---------------------------------------------------------------------------
// AttackResolution
// ---------------------------------------------------------------------------

/// Everything an attack changed, for the caller to persist and report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttackResolution {
    /// The outcome reported to players.
    pub outcome: CombatOutcome,
    /// The attacker's weapon after wear (also set when it broke).
    pub weapon_used: Option<Weapon>,
    /// Whether the counter-attack dropped the attacker to zero health.
    pub attacker_downed: bool,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Check every attack precondition without mutating anything.
pub fn validate_attack(
    attacker: &Entity,
    defender: &Entity,
    config: &CombatConfig,
) -> Result<(), SimError> {
    if attacker.id == defender.id {
        return Err(SimError::SelfTarget(attacker.id));
    }
    if attacker.is_incapacitated() || !attacker.lifecycle.is_active {
        return Err(SimError::AttackerIncapacitated(attacker.id));
    }
    if attacker.equipped_weapon.is_none() {
        return Err(SimError::NoWeaponEquipped(attacker.id));
    }
    if defender.is_incapacitated() {
        return Err(SimError::TargetAlreadyDown(defender.id));
    }
    if attacker.action_points < config.attack_cost {
        return Err(SimError::InsufficientActionPoints {
            required: config.attack_cost,
            available: attacker.action_points,
        });
    }
    Ok(())
}

/// Resolve one attack.
///
/// On error nothing is mutated. On success the defender's health, the
/// attacker's weapon durability, the attacker's health (counter), and the
/// attacker's AP have been updated in place.
pub fn resolve_attack<R: Rng + ?Sized>(
    attacker: &mut Entity,
    defender: &mut Entity,
    config: &CombatConfig,
    kind: RulesetKind,
    rng: &mut R,
) -> Result<AttackResolution, SimError> {
    validate_attack(attacker, defender, config)?;
    let ruleset = config.ruleset(kind);
    let attack_bonus = weapon_bonus(attacker);
    let mut outcome = CombatOutcome::default();

    // 1. Dodge
    if rolls::chance(rng, config.dodge.at(defender.stats.dodge)) {
        outcome.is_dodged = true;
        pay_attack_cost(attacker, config);
        tracing::debug!(
            attacker_id = %attacker.id,
            defender_id = %defender.id,
            ruleset = %kind,
            "Attack dodged"
        );
        return Ok(AttackResolution {
            outcome,
            weapon_used: attacker.equipped_weapon.clone(),
            attacker_downed: false,
        });
    }

    // 2. Critical check
    let crit_probability = match ruleset.crit_chance {
        CritChance::AttackStat(curve) => {
            curve.at(attacker.stats.strength.saturating_add(attack_bonus))
        }
        CritChance::Agility(curve) => curve.at(attacker.stats.agility),
    };
    outcome.is_critical = rolls::chance(rng, crit_probability);

    // 3. Base damage
    let mut damage = roll_damage(
        attacker.stats.strength,
        attack_bonus,
        defender.stats.defense,
        ruleset,
        rng,
    );

    // 4. Critical multiplier
    if outcome.is_critical {
        let multiplier = match ruleset.crit_multiplier {
            CritMultiplier::Fixed { factor } => factor,
            CritMultiplier::Randomized { min, max } => rolls::between(rng, min, max),
        };
        damage = rolls::floor_to_u32(f64::from(damage) * multiplier).max(1);
    }

    // 5. Apply damage
    outcome.damage = damage;
    defender.health = defender.health.saturating_sub(damage);
    outcome.is_fatal = defender.health == 0;

    // 6. Weapon wear and breakage
    let (wear, broken) = wear_weapon(attacker, config, rng);
    outcome.weapon_wear = wear;
    outcome.weapon_broken = broken.is_some();
    let weapon_used = broken.or_else(|| attacker.equipped_weapon.clone());

    // 7. Counter-attack
    let mut attacker_downed = false;
    if !outcome.is_fatal
        && defender.lifecycle.is_active
        && rolls::chance(rng, config.counter.at(defender.stats.agility))
    {
        let counter = roll_damage(
            defender.stats.strength,
            weapon_bonus(defender),
            attacker.stats.defense,
            ruleset,
            rng,
        );
        attacker.health = attacker.health.saturating_sub(counter);
        attacker_downed = attacker.health == 0;
        outcome.counter_damage = Some(counter);
        outcome.counter_message = Some(format!(
            "{} counters {} for {counter} damage",
            defender.name, attacker.name
        ));
    }

    // 8. Pay for the attack last
    pay_attack_cost(attacker, config);

    tracing::debug!(
        attacker_id = %attacker.id,
        defender_id = %defender.id,
        ruleset = %kind,
        damage = outcome.damage,
        critical = outcome.is_critical,
        fatal = outcome.is_fatal,
        counter = ?outcome.counter_damage,
        weapon_broken = outcome.weapon_broken,
        "Attack resolved"
    );

    Ok(AttackResolution {
        outcome,
        weapon_used,
        attacker_downed,
    })
}

/// Roll base damage: `floor((strength + bonus - reduction) * variance)`, at least 1.
///
/// Draws the variance first, then the defense reduction when the ruleset
/// randomizes it.
pub fn roll_damage<R: Rng + ?Sized>(
    strength: u32,
    weapon_bonus: u32,
    defense: u32,
    ruleset: &CombatRuleset,
    rng: &mut R,
) -> u32 {
    let variance = rolls::between(rng, ruleset.variance_min, ruleset.variance_max);
    let reduction_factor = match ruleset.defense_reduction {
        DefenseReduction::Fixed { factor } => factor,
        DefenseReduction::Randomized { min, max } => rolls::between(rng, min, max),
    };
    let base = f64::from(strength.saturating_add(weapon_bonus));
    let reduced = f64::from(defense).mul_add(-reduction_factor, base);
    rolls::floor_to_u32(reduced * variance).max(1)
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

fn weapon_bonus(entity: &Entity) -> u32 {
    entity
        .equipped_weapon
        .as_ref()
        .map_or(0, |weapon| weapon.attack_bonus)
}

fn pay_attack_cost(attacker: &mut Entity, config: &CombatConfig) {
    attacker.action_points = attacker.action_points.saturating_sub(config.attack_cost);
}

/// Wear down the attacker's weapon. Returns the wear applied and, if the
/// weapon broke, the unequipped weapon.
fn wear_weapon<R: Rng + ?Sized>(
    attacker: &mut Entity,
    config: &CombatConfig,
    rng: &mut R,
) -> (u32, Option<Weapon>) {
    let Some(weapon) = attacker.equipped_weapon.as_mut() else {
        return (0, None);
    };

    let wear = u32::try_from(rolls::int_between(
        rng,
        u64::from(config.min_wear),
        u64::from(config.max_wear),
    ))
    .unwrap_or(config.max_wear);
    weapon.durability = weapon.durability.saturating_sub(wear);

    let snapped = weapon.durability == 0
        || (is_fragile(weapon, config.fragile_threshold_pct)
            && rolls::chance(rng, config.fragile_break_chance));

    if snapped {
        tracing::debug!(
            entity_id = %attacker.id,
            weapon = %weapon.name,
            durability = weapon.durability,
            "Weapon broke"
        );
        return (wear, attacker.equipped_weapon.take());
    }
    (wear, None)
}

/// Whether durability has fallen to `threshold_pct` percent of max or below.
fn is_fragile(weapon: &Weapon, threshold_pct: u32) -> bool {
    u64::from(weapon.durability).saturating_mul(100)
        <= u64::from(weapon.max_durability).saturating_mul(u64::from(threshold_pct))
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use crate::rolls::ScriptedRolls;

    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap_or_default()
    }

    fn attacker() -> Entity {
        let mut entity = Entity::new("Rook", EntityKind::Player, "yard", now());
        entity.stats.strength = 10;
        entity.action_points = 20;
        entity.equipped_weapon = Some(Weapon::new("Shiv", 5, 100, "[killer] shanked [victim]"));
        entity
    }

    fn defender() -> Entity {
        let mut entity = Entity::new("Mole", EntityKind::Player, "yard", now());
        entity.health = 12;
        entity.stats.defense = 4;
        entity
    }

    /// Fixed-reduction rules with no variance, for exact-value checks.
    fn flat_config() -> CombatConfig {
        let mut config = CombatConfig::default();
        config.standard = CombatRuleset {
            variance_min: 1.0,
            variance_max: 1.0,
            ..CombatRuleset::guard()
        };
        config
    }

    #[test]
    fn ruleset_selection_prefers_guard_rules() {
        assert_eq!(
            RulesetKind::for_matchup(EntityKind::Player, EntityKind::Player),
            RulesetKind::Standard
        );
        assert_eq!(
            RulesetKind::for_matchup(EntityKind::Player, EntityKind::Guard),
            RulesetKind::Guard
        );
        assert_eq!(
            RulesetKind::for_matchup(EntityKind::Guard, EntityKind::Player),
            RulesetKind::Guard
        );
        assert_eq!(
            RulesetKind::for_matchup(EntityKind::StaticNpc, EntityKind::Player),
            RulesetKind::Standard
        );
    }

    #[test]
    fn fatal_hit_with_fixed_reduction_deals_thirteen() {
        let config = flat_config();
        let mut a = attacker();
        let mut d = defender();
        // dodge, crit, variance, wear
        let mut rng = ScriptedRolls::new([0.99, 0.99, 0.5, 0.0]);
        let result = resolve_attack(&mut a, &mut d, &config, RulesetKind::Standard, &mut rng);
        let resolution = result.unwrap_or_else(|e| panic!("attack failed: {e}"));
        assert_eq!(resolution.outcome.damage, 13);
        assert!(resolution.outcome.is_fatal);
        assert!(!resolution.outcome.is_critical);
        assert!(!resolution.outcome.is_dodged);
        assert_eq!(resolution.outcome.counter_damage, None);
        assert_eq!(d.health, 0);
        assert_eq!(a.action_points, 15);
        assert_eq!(resolution.outcome.weapon_wear, 1);
        assert_eq!(a.equipped_weapon.as_ref().map(|w| w.durability), Some(99));
    }

    #[test]
    fn guard_rules_apply_variance_after_reduction() {
        let config = CombatConfig::default();
        let mut a = attacker();
        let mut d = defender();
        d.health = 100;
        // dodge, crit, variance (0.8), wear, counter (miss)
        let mut rng = ScriptedRolls::new([0.99, 0.99, 0.0, 0.0, 0.95]);
        let resolution = resolve_attack(&mut a, &mut d, &config, RulesetKind::Guard, &mut rng)
            .unwrap_or_else(|e| panic!("attack failed: {e}"));
        // floor((15 - 2) * 0.8) = 10
        assert_eq!(resolution.outcome.damage, 10);
        assert_eq!(d.health, 90);
    }

    #[test]
    fn standard_rules_randomize_reduction() {
        let config = CombatConfig::default();
        let mut a = attacker();
        let mut d = defender();
        d.health = 100;
        // dodge, crit, variance (0.85), reduction (0.25), wear, counter (miss)
        let mut rng = ScriptedRolls::new([0.99, 0.99, 0.0, 0.0, 0.0, 0.95]);
        let resolution = resolve_attack(&mut a, &mut d, &config, RulesetKind::Standard, &mut rng)
            .unwrap_or_else(|e| panic!("attack failed: {e}"));
        // floor((15 - 1) * 0.85) = 11
        assert_eq!(resolution.outcome.damage, 11);
    }

    #[test]
    fn fixed_crit_multiplies_by_one_and_a_half() {
        let config = flat_config();
        let mut a = attacker();
        let mut d = defender();
        d.health = 100;
        d.stats.agility = 0;
        // dodge, crit (hit), variance, wear, counter (miss)
        let mut rng = ScriptedRolls::new([0.99, 0.0, 0.5, 0.0, 0.95]);
        let resolution = resolve_attack(&mut a, &mut d, &config, RulesetKind::Standard, &mut rng)
            .unwrap_or_else(|e| panic!("attack failed: {e}"));
        assert!(resolution.outcome.is_critical);
        // floor(13 * 1.5) = 19
        assert_eq!(resolution.outcome.damage, 19);
    }

    #[test]
    fn damage_never_drops_below_one() {
        let config = flat_config();
        let mut a = attacker();
        let mut d = defender();
        d.health = 100;
        d.stats.defense = 500;
        let mut rng = ScriptedRolls::new([0.99, 0.99, 0.5, 0.0, 0.95]);
        let resolution = resolve_attack(&mut a, &mut d, &config, RulesetKind::Standard, &mut rng)
            .unwrap_or_else(|e| panic!("attack failed: {e}"));
        assert_eq!(resolution.outcome.damage, 1);
        assert_eq!(d.health, 99);
    }

    #[test]
    fn dodge_costs_ap_but_no_wear() {
        let config = CombatConfig::default();
        let mut a = attacker();
        let mut d = defender();
        let mut rng = ScriptedRolls::new([0.0]);
        let resolution = resolve_attack(&mut a, &mut d, &config, RulesetKind::Standard, &mut rng)
            .unwrap_or_else(|e| panic!("attack failed: {e}"));
        assert!(resolution.outcome.is_dodged);
        assert_eq!(resolution.outcome.damage, 0);
        assert_eq!(resolution.outcome.weapon_wear, 0);
        assert_eq!(d.health, 12);
        assert_eq!(a.action_points, 15);
        assert_eq!(a.equipped_weapon.as_ref().map(|w| w.durability), Some(100));
    }

    #[test]
    fn dodge_chance_clamps_at_half() {
        let config = CombatConfig::default();
        let mut d = defender();
        d.stats.dodge = 100;

        // A draw of exactly 0.5 is not a dodge even with 100 dodge.
        let mut a = attacker();
        let mut rng = ScriptedRolls::new([0.5, 0.99, 0.5, 0.0, 0.95]);
        let resolution = resolve_attack(&mut a, &mut d, &config, RulesetKind::Standard, &mut rng)
            .unwrap_or_else(|e| panic!("attack failed: {e}"));
        assert!(!resolution.outcome.is_dodged);

        // Over many seeded attacks the dodge rate sits at 50%.
        let mut rng = SmallRng::seed_from_u64(2024);
        let mut dodges = 0_u32;
        let trials = 10_000_u32;
        for _ in 0..trials {
            let mut a = attacker();
            let mut d = defender();
            d.health = 1_000;
            d.stats.dodge = 100;
            if let Ok(res) =
                resolve_attack(&mut a, &mut d, &config, RulesetKind::Standard, &mut rng)
                && res.outcome.is_dodged
            {
                dodges = dodges.saturating_add(1);
            }
        }
        let rate = f64::from(dodges) / f64::from(trials);
        assert!((rate - 0.5).abs() < 0.03, "dodge rate {rate}");
    }

    #[test]
    fn counter_attack_hits_back_without_chaining() {
        let config = flat_config();
        let mut a = attacker();
        a.stats.defense = 2;
        let mut d = defender();
        d.health = 50;
        d.stats.strength = 8;
        // dodge, crit, variance, wear, counter (hit), counter variance
        let mut rng = ScriptedRolls::new([0.99, 0.99, 0.5, 0.0, 0.1, 0.5]);
        let resolution = resolve_attack(&mut a, &mut d, &config, RulesetKind::Standard, &mut rng)
            .unwrap_or_else(|e| panic!("attack failed: {e}"));
        // (8 + 0 - 2 * 0.5) * 1.0 = 7
        assert_eq!(resolution.outcome.counter_damage, Some(7));
        assert!(resolution.outcome.counter_message.is_some());
        assert_eq!(a.health, 93);
        assert!(!resolution.attacker_downed);
        assert_eq!(rng.remaining(), 0);
    }

    #[test]
    fn counter_can_drop_the_attacker() {
        let config = flat_config();
        let mut a = attacker();
        a.health = 3;
        let mut d = defender();
        d.health = 50;
        d.stats.strength = 8;
        let mut rng = ScriptedRolls::new([0.99, 0.99, 0.5, 0.0, 0.1, 0.5]);
        let resolution = resolve_attack(&mut a, &mut d, &config, RulesetKind::Standard, &mut rng)
            .unwrap_or_else(|e| panic!("attack failed: {e}"));
        assert!(resolution.attacker_downed);
        assert_eq!(a.health, 0);
    }

    #[test]
    fn weapon_breaks_at_zero_durability() {
        let config = flat_config();
        let mut a = attacker();
        if let Some(weapon) = a.equipped_weapon.as_mut() {
            weapon.durability = 2;
        }
        let mut d = defender();
        d.health = 100;
        // dodge, crit, variance, wear (3), counter (miss)
        let mut rng = ScriptedRolls::new([0.99, 0.99, 0.5, 0.999, 0.95]);
        let resolution = resolve_attack(&mut a, &mut d, &config, RulesetKind::Standard, &mut rng)
            .unwrap_or_else(|e| panic!("attack failed: {e}"));
        assert!(resolution.outcome.weapon_broken);
        assert_eq!(resolution.outcome.weapon_wear, 3);
        assert!(a.equipped_weapon.is_none());
        assert_eq!(resolution.weapon_used.map(|w| w.durability), Some(0));
    }

    #[test]
    fn fragile_weapon_can_snap() {
        let config = flat_config();
        let mut a = attacker();
        if let Some(weapon) = a.equipped_weapon.as_mut() {
            weapon.durability = 41;
        }
        let mut d = defender();
        d.health = 100;
        // dodge, crit, variance, wear (1 -> 40%), fragile roll (snap), counter (miss)
        let mut rng = ScriptedRolls::new([0.99, 0.99, 0.5, 0.0, 0.1, 0.95]);
        let resolution = resolve_attack(&mut a, &mut d, &config, RulesetKind::Standard, &mut rng)
            .unwrap_or_else(|e| panic!("attack failed: {e}"));
        assert!(resolution.outcome.weapon_broken);
        assert!(a.equipped_weapon.is_none());
    }

    #[test]
    fn fragile_weapon_survives_a_lucky_roll() {
        let config = flat_config();
        let mut a = attacker();
        if let Some(weapon) = a.equipped_weapon.as_mut() {
            weapon.durability = 41;
        }
        let mut d = defender();
        d.health = 100;
        let mut rng = ScriptedRolls::new([0.99, 0.99, 0.5, 0.0, 0.5, 0.95]);
        let resolution = resolve_attack(&mut a, &mut d, &config, RulesetKind::Standard, &mut rng)
            .unwrap_or_else(|e| panic!("attack failed: {e}"));
        assert!(!resolution.outcome.weapon_broken);
        assert_eq!(a.equipped_weapon.as_ref().map(|w| w.durability), Some(40));
    }

    #[test]
    fn attacking_a_downed_target_costs_nothing() {
        let config = CombatConfig::default();
        let mut a = attacker();
        let mut d = defender();
        d.health = 0;
        d.lifecycle.is_incapacitated = true;
        d.lifecycle.is_active = false;
        let before = a.clone();
        let mut rng = SmallRng::seed_from_u64(1);
        let result = resolve_attack(&mut a, &mut d, &config, RulesetKind::Standard, &mut rng);
        assert_eq!(result, Err(SimError::TargetAlreadyDown(d.id)));
        assert_eq!(a, before);
    }

    #[test]
    fn attacking_requires_a_weapon() {
        let config = CombatConfig::default();
        let mut a = attacker();
        a.equipped_weapon = None;
        let mut d = defender();
        let mut rng = SmallRng::seed_from_u64(1);
        let result = resolve_attack(&mut a, &mut d, &config, RulesetKind::Standard, &mut rng);
        assert_eq!(result, Err(SimError::NoWeaponEquipped(a.id)));
    }

    #[test]
    fn attacking_requires_enough_action_points() {
        let config = CombatConfig::default();
        let mut a = attacker();
        a.action_points = 4;
        let mut d = defender();
        let mut rng = SmallRng::seed_from_u64(1);
        let result = resolve_attack(&mut a, &mut d, &config, RulesetKind::Standard, &mut rng);
        assert_eq!(
            result,
            Err(SimError::InsufficientActionPoints {
                required: 5,
                available: 4
            })
        );
        assert_eq!(d.health, 12);
    }

    #[test]
    fn downed_attackers_and_self_targets_are_rejected() {
        let config = CombatConfig::default();
        let mut a = attacker();
        let mut same = a.clone();
        let mut rng = SmallRng::seed_from_u64(1);
        assert_eq!(
            resolve_attack(&mut a, &mut same, &config, RulesetKind::Standard, &mut rng),
            Err(SimError::SelfTarget(a.id))
        );

        a.lifecycle.is_incapacitated = true;
        let mut d = defender();
        assert_eq!(
            resolve_attack(&mut a, &mut d, &config, RulesetKind::Standard, &mut rng),
            Err(SimError::AttackerIncapacitated(a.id))
        );
    }

    #[test]
    fn seeded_resolution_is_deterministic() {
        let config = CombatConfig::default();
        let run = |seed: u64| {
            let mut rng = SmallRng::seed_from_u64(seed);
            let mut a = attacker();
            let mut d = defender();
            d.health = 100;
            resolve_attack(&mut a, &mut d, &config, RulesetKind::Standard, &mut rng)
                .map(|r| (r.outcome, a.health, d.health))
        };
        assert_eq!(run(77), run(77));
    }

    #[test]
    fn health_stays_in_bounds_over_many_fights() {
        let config = CombatConfig::default();
        let mut rng = SmallRng::seed_from_u64(5);
        for _ in 0..2_000 {
            let mut a = attacker();
            a.stats.strength = 40;
            let mut d = defender();
            d.health = 30;
            d.stats.strength = 30;
            if resolve_attack(&mut a, &mut d, &config, RulesetKind::Standard, &mut rng).is_ok() {
                assert!(d.health <= 30);
                assert!(a.health <= 100);
                assert_eq!(a.action_points, 15);
            }
        }
    }
}
