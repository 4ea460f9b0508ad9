//! Kill rewards and experience allocation.
//!
//! A fatal attack pays the killer from a weighted money lottery, credits
//! experience and permanent points, and produces a [`KillRecord`] for the
//! kill feed. Banked experience is later spent one stat at a time through
//! [`allocate_experience`].

use chrono::{DateTime, Utc};
use rand::Rng;

use cellblock_types::{Entity, KillRecord, KillRecordId, StatName};

use crate::config::{LootConfig, LootTier};
use crate::error::SimError;
use crate::rolls;

/// Placeholder replaced by the killer's name in death messages.
pub const KILLER_PLACEHOLDER: &str = "[killer]";

/// Placeholder replaced by the victim's name in death messages.
pub const VICTIM_PLACEHOLDER: &str = "[victim]";

/// Draw the money paid for one kill.
///
/// Exactly one tier fires, chosen with probability proportional to its
/// weight, then the amount is drawn uniformly from that tier's inclusive
/// range. A table that fails [`LootConfig::validate`] pays nothing.
pub fn roll_money<R: Rng + ?Sized>(rng: &mut R, config: &LootConfig) -> u64 {
    let Some(tier) = pick_tier(rng, &config.tiers) else {
        return 0;
    };
    rolls::int_between(rng, tier.min, tier.max)
}

fn pick_tier<'a, R: Rng + ?Sized>(rng: &mut R, tiers: &'a [LootTier]) -> Option<&'a LootTier> {
    let total: u64 = tiers.iter().map(|tier| u64::from(tier.weight)).sum();
    if total == 0 {
        return None;
    }
    let mut target = rolls::int_between(rng, 0, total.saturating_sub(1));
    for tier in tiers {
        let weight = u64::from(tier.weight);
        if target < weight {
            return Some(tier);
        }
        target = target.saturating_sub(weight);
    }
    tiers.iter().rev().find(|tier| tier.weight > 0)
}

/// Substitute names into a death-message template.
pub fn render_death_message(template: &str, killer: &str, victim: &str) -> String {
    template
        .replace(KILLER_PLACEHOLDER, killer)
        .replace(VICTIM_PLACEHOLDER, victim)
}

/// Credit a kill to `killer` and a death to `victim`.
///
/// `money` is the lottery result from [`roll_money`]. `final_damage` is
/// added to the killer's damage-dealt total. Returns the record for the
/// kill feed; the victim's position is read before incapacitation moves it.
pub fn award_kill(
    killer: &mut Entity,
    victim: &mut Entity,
    final_damage: u32,
    death_message: Option<&str>,
    money: u64,
    now: DateTime<Utc>,
    config: &LootConfig,
) -> KillRecord {
    let template = death_message
        .filter(|message| !message.trim().is_empty())
        .unwrap_or(config.default_death_message.as_str());

    let record = KillRecord {
        id: KillRecordId::new(),
        killer_id: killer.id,
        killer_name: killer.name.clone(),
        victim_id: victim.id,
        victim_name: victim.name.clone(),
        weapon_death_message: render_death_message(template, &killer.name, &victim.name),
        area: victim.position.area.clone(),
        money_awarded: money,
        timestamp: now,
    };

    killer.stats.unallocated_xp = killer.stats.unallocated_xp.saturating_add(config.xp_per_kill);
    killer.progression.points = killer.progression.points.saturating_add(config.points_per_kill);
    killer.progression.money = killer.progression.money.saturating_add(money);
    killer.progression.kills = killer.progression.kills.saturating_add(1);
    killer.progression.damage_dealt = killer
        .progression
        .damage_dealt
        .saturating_add(u64::from(final_damage));
    victim.progression.deaths = victim.progression.deaths.saturating_add(1);

    tracing::info!(
        killer_id = %killer.id,
        victim_id = %victim.id,
        money,
        area = %record.area,
        "Kill recorded"
    );

    record
}

/// Move banked experience into a stat. Returns the stat's new value.
///
/// Fails with [`SimError::InvalidAmount`] for zero and with
/// [`SimError::InsufficientExperience`] when not enough is banked; in both
/// cases nothing changes.
pub fn allocate_experience(
    entity: &mut Entity,
    stat: StatName,
    amount: u32,
) -> Result<u32, SimError> {
    if amount == 0 {
        return Err(SimError::InvalidAmount(amount));
    }
    let available = entity.stats.unallocated_xp;
    if amount > available {
        return Err(SimError::InsufficientExperience {
            requested: amount,
            available,
        });
    }

    let slot = match stat {
        StatName::Strength => &mut entity.stats.strength,
        StatName::Defense => &mut entity.stats.defense,
        StatName::Agility => &mut entity.stats.agility,
        StatName::Dodge => &mut entity.stats.dodge,
    };
    let raised = slot
        .checked_add(amount)
        .ok_or_else(|| SimError::ArithmeticOverflow {
            context: format!("allocating {amount} experience to {stat}"),
        })?;
    *slot = raised;
    entity.stats.unallocated_xp = available.saturating_sub(amount);
    Ok(raised)
}
