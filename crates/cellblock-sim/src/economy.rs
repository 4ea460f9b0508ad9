//! Resource economy: regeneration, consumption, and refunds.
//!
//! Health, action points (AP), and movement points (MP) regenerate per
//! elapsed whole minute since the entity's `last_sync_at` marker:
//!
//! - Health: `+health_regen_per_minute`, players only, never while down
//! - AP: `+ap_regen_per_minute`, except inside the isolation cell
//! - MP: `+mp_regen_per_minute`
//!
//! The marker advances by exactly the minutes credited, keeping the
//! sub-minute remainder for the next tick. Ticking twice with the same
//! `now` therefore credits nothing the second time, and a long offline gap
//! is credited in full on the next tick.
//!
//! All arithmetic saturates and every resource is clamped to its cap.

use chrono::{DateTime, TimeDelta, Utc};

use cellblock_types::{Entity, EntityKind, ResourceKind};

use crate::config::EconomyConfig;
use crate::error::SimError;

/// What one regeneration tick credited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegenResult {
    /// Whole minutes credited (zero when the tick was a no-op).
    pub minutes: u32,
    /// Health gained.
    pub health: u32,
    /// Action points gained (negative adjustments from buff expiry are not counted).
    pub action_points: u32,
    /// Movement points gained.
    pub movement_points: u32,
    /// Whether the max-AP buff expired during this tick.
    pub buff_expired: bool,
}

impl RegenResult {
    /// Whether the tick changed anything.
    pub const fn changed(&self) -> bool {
        self.minutes > 0 || self.buff_expired
    }
}

/// Apply regeneration for the time elapsed since `entity.last_sync_at`.
///
/// # Order of operations
///
/// 1. Compute whole elapsed minutes (negative gaps count as zero)
/// 2. Expire the max-AP buff if its expiry is not after `now`
/// 3. Credit health (players, not incapacitated), AP (outside isolation), MP
/// 4. Clamp every resource to its cap at `now`
/// 5. Advance `last_sync_at` by the credited minutes
pub fn tick(entity: &mut Entity, config: &EconomyConfig, now: DateTime<Utc>) -> RegenResult {
    let minutes = elapsed_minutes(entity.last_sync_at, now);
    let mut result = RegenResult {
        minutes,
        ..RegenResult::default()
    };

    if let Some(expiry) = entity.buffs.max_ap_expires_at
        && expiry <= now
    {
        entity.buffs.max_ap_expires_at = None;
        result.buff_expired = true;
    }

    if minutes > 0 {
        if entity.kind == EntityKind::Player && !entity.is_incapacitated() {
            let before = entity.health;
            entity.health = credit(
                before,
                minutes.saturating_mul(config.health_regen_per_minute),
                config.max_health(entity),
            );
            result.health = entity.health.saturating_sub(before);
        }

        if entity.position.area != config.isolation_area {
            let before = entity.action_points;
            entity.action_points = credit(
                before,
                minutes.saturating_mul(config.ap_regen_per_minute),
                config.max_action_points(entity, now),
            );
            result.action_points = entity.action_points.saturating_sub(before);
        }

        let before = entity.movement_points;
        entity.movement_points = credit(
            before,
            minutes.saturating_mul(config.mp_regen_per_minute),
            config.max_movement_points,
        );
        result.movement_points = entity.movement_points.saturating_sub(before);

        entity.last_sync_at = TimeDelta::try_minutes(i64::from(minutes))
            .and_then(|delta| entity.last_sync_at.checked_add_signed(delta))
            .unwrap_or(now);
    }

    clamp_to_caps(entity, config, now);

    if result.changed() {
        tracing::trace!(
            entity_id = %entity.id,
            minutes = result.minutes,
            health = result.health,
            action_points = result.action_points,
            movement_points = result.movement_points,
            buff_expired = result.buff_expired,
            "Regeneration applied"
        );
    }

    result
}

/// Spend `amount` of a resource.
///
/// Fails with [`SimError::InsufficientResource`] if `amount` exceeds the
/// current value; nothing is mutated in that case. Returns the new value.
///
/// Spending health down to zero does not incapacitate by itself; the
/// caller runs the incapacitation state machine on the result.
pub fn consume(entity: &mut Entity, resource: ResourceKind, amount: u32) -> Result<u32, SimError> {
    let slot = resource_slot(entity, resource);
    let available = *slot;
    let remaining = available
        .checked_sub(amount)
        .ok_or(SimError::InsufficientResource {
            resource,
            requested: amount,
            available,
        })?;
    *slot = remaining;
    Ok(remaining)
}

/// Credit `amount` of a resource, capped at its maximum at `now`.
///
/// Health cannot be refunded to an incapacitated entity; revival is the
/// only way back up. Returns the new value.
pub fn refund(
    entity: &mut Entity,
    resource: ResourceKind,
    amount: u32,
    config: &EconomyConfig,
    now: DateTime<Utc>,
) -> Result<u32, SimError> {
    if resource == ResourceKind::Health && entity.is_incapacitated() {
        return Err(SimError::Incapacitated(entity.id));
    }
    let cap = config.max_for(entity, resource, now);
    let slot = resource_slot(entity, resource);
    *slot = credit(*slot, amount, cap);
    Ok(*slot)
}

/// Move an entity to another area, paying `move_cost` movement points.
///
/// Returns `Ok(false)` without charging when the entity is already there.
pub fn move_to(
    entity: &mut Entity,
    area: &str,
    config: &EconomyConfig,
    now: DateTime<Utc>,
) -> Result<bool, SimError> {
    if entity.is_incapacitated() {
        return Err(SimError::Incapacitated(entity.id));
    }
    if entity.position.area == area {
        return Ok(false);
    }
    consume(entity, ResourceKind::MovementPoints, config.move_cost)?;
    area.clone_into(&mut entity.position.area);
    entity.position.last_move_at = now;
    Ok(true)
}

/// Raise the action point cap until `until`.
///
/// An already-running buff is only ever extended, never shortened.
pub fn grant_max_ap_buff(entity: &mut Entity, until: DateTime<Utc>) {
    let expiry = entity
        .buffs
        .max_ap_expires_at
        .map_or(until, |current| current.max(until));
    entity.buffs.max_ap_expires_at = Some(expiry);
}

/// Clamp health, AP, and MP to their caps at `now`.
pub fn clamp_to_caps(entity: &mut Entity, config: &EconomyConfig, now: DateTime<Utc>) {
    entity.health = entity.health.min(config.max_health(entity));
    entity.action_points = entity
        .action_points
        .min(config.max_action_points(entity, now));
    entity.movement_points = entity.movement_points.min(config.max_movement_points);
}

/// Whole minutes between the marker and `now`, zero if `now` is earlier.
fn elapsed_minutes(since: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
    let minutes = now.signed_duration_since(since).num_minutes().max(0);
    u32::try_from(minutes).unwrap_or(u32::MAX)
}

/// Saturating add capped at `cap`. A value already above the cap is kept
/// as-is so that credits never reduce a resource.
fn credit(current: u32, amount: u32, cap: u32) -> u32 {
    if current >= cap {
        return current;
    }
    current.saturating_add(amount).min(cap)
}

fn resource_slot(entity: &mut Entity, resource: ResourceKind) -> &mut u32 {
    match resource {
        ResourceKind::Health => &mut entity.health,
        ResourceKind::ActionPoints => &mut entity.action_points,
        ResourceKind::MovementPoints => &mut entity.movement_points,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(minutes: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap_or_default() + TimeDelta::minutes(minutes)
    }

    fn player() -> Entity {
        let mut entity = Entity::new("Rook", EntityKind::Player, "yard", at(0));
        entity.health = 50;
        entity.action_points = 5;
        entity.movement_points = 0;
        entity
    }

    #[test]
    fn regenerates_per_elapsed_minute() {
        let cfg = EconomyConfig::default();
        let mut entity = player();
        let result = tick(&mut entity, &cfg, at(3));
        assert_eq!(result.minutes, 3);
        assert_eq!(entity.health, 53);
        assert_eq!(entity.action_points, 8);
        assert_eq!(entity.movement_points, 6);
        assert_eq!(entity.last_sync_at, at(3));
    }

    #[test]
    fn repeated_tick_with_same_now_is_idempotent() {
        let cfg = EconomyConfig::default();
        let mut entity = player();
        let _ = tick(&mut entity, &cfg, at(4));
        let snapshot = entity.clone();
        let second = tick(&mut entity, &cfg, at(4));
        assert!(!second.changed());
        assert_eq!(entity, snapshot);
    }

    #[test]
    fn sub_minute_remainder_is_kept() {
        let cfg = EconomyConfig::default();
        let mut entity = player();
        let half = at(0) + TimeDelta::seconds(90);
        let _ = tick(&mut entity, &cfg, half);
        assert_eq!(entity.action_points, 6);
        assert_eq!(entity.last_sync_at, at(1));
        // The 30s remainder stays on the marker for the next tick.
        let _ = tick(&mut entity, &cfg, at(2));
        assert_eq!(entity.action_points, 7);
    }

    #[test]
    fn offline_gap_is_credited_but_capped() {
        let cfg = EconomyConfig::default();
        let mut entity = player();
        let _ = tick(&mut entity, &cfg, at(60 * 24));
        assert_eq!(entity.health, 100);
        assert_eq!(entity.action_points, 20);
        assert_eq!(entity.movement_points, 10);
    }

    #[test]
    fn clock_going_backwards_credits_nothing() {
        let cfg = EconomyConfig::default();
        let mut entity = player();
        entity.last_sync_at = at(10);
        let result = tick(&mut entity, &cfg, at(5));
        assert_eq!(result.minutes, 0);
        assert_eq!(entity.action_points, 5);
        assert_eq!(entity.last_sync_at, at(10));
    }

    #[test]
    fn isolation_cell_blocks_ap_regeneration_only() {
        let cfg = EconomyConfig::default();
        let mut entity = player();
        entity.position.area = cfg.isolation_area.clone();
        let _ = tick(&mut entity, &cfg, at(5));
        assert_eq!(entity.action_points, 5);
        assert_eq!(entity.health, 55);
        assert_eq!(entity.movement_points, 10);
    }

    #[test]
    fn guards_do_not_regenerate_health() {
        let cfg = EconomyConfig::default();
        let mut guard = Entity::new("Hale", EntityKind::Guard, "yard", at(0));
        guard.health = 40;
        let _ = tick(&mut guard, &cfg, at(10));
        assert_eq!(guard.health, 40);
    }

    #[test]
    fn incapacitated_players_do_not_regenerate_health() {
        let cfg = EconomyConfig::default();
        let mut entity = player();
        entity.health = 0;
        entity.lifecycle.is_incapacitated = true;
        entity.lifecycle.is_active = false;
        let _ = tick(&mut entity, &cfg, at(10));
        assert_eq!(entity.health, 0);
    }

    #[test]
    fn buff_raises_ap_cap_while_running() {
        let cfg = EconomyConfig::default();
        let mut entity = player();
        entity.action_points = 18;
        grant_max_ap_buff(&mut entity, at(60));
        let _ = tick(&mut entity, &cfg, at(10));
        assert_eq!(entity.action_points, 28);
    }

    #[test]
    fn buff_expiry_clamps_ap_down() {
        let cfg = EconomyConfig::default();
        let mut entity = player();
        entity.action_points = 28;
        entity.buffs.max_ap_expires_at = Some(at(5));
        let result = tick(&mut entity, &cfg, at(6));
        assert!(result.buff_expired);
        assert_eq!(entity.buffs.max_ap_expires_at, None);
        assert_eq!(entity.action_points, 20);
    }

    #[test]
    fn buff_is_only_extended() {
        let mut entity = player();
        grant_max_ap_buff(&mut entity, at(30));
        grant_max_ap_buff(&mut entity, at(10));
        assert_eq!(entity.buffs.max_ap_expires_at, Some(at(30)));
        grant_max_ap_buff(&mut entity, at(45));
        assert_eq!(entity.buffs.max_ap_expires_at, Some(at(45)));
    }

    #[test]
    fn consume_debits_and_rejects_overdraft() {
        let mut entity = player();
        assert_eq!(consume(&mut entity, ResourceKind::ActionPoints, 5), Ok(0));
        let err = consume(&mut entity, ResourceKind::ActionPoints, 1);
        assert_eq!(
            err,
            Err(SimError::InsufficientResource {
                resource: ResourceKind::ActionPoints,
                requested: 1,
                available: 0,
            })
        );
        assert_eq!(entity.action_points, 0);
    }

    #[test]
    fn refund_is_capped() {
        let cfg = EconomyConfig::default();
        let mut entity = player();
        assert_eq!(refund(&mut entity, ResourceKind::MovementPoints, 50, &cfg, at(0)), Ok(10));
        assert_eq!(refund(&mut entity, ResourceKind::ActionPoints, 3, &cfg, at(0)), Ok(8));
    }

    #[test]
    fn refund_health_to_downed_entity_is_rejected() {
        let cfg = EconomyConfig::default();
        let mut entity = player();
        entity.health = 0;
        entity.lifecycle.is_incapacitated = true;
        let result = refund(&mut entity, ResourceKind::Health, 10, &cfg, at(0));
        assert_eq!(result, Err(SimError::Incapacitated(entity.id)));
        assert_eq!(entity.health, 0);
    }

    #[test]
    fn moving_costs_one_movement_point() {
        let cfg = EconomyConfig::default();
        let mut entity = player();
        entity.movement_points = 2;
        assert_eq!(move_to(&mut entity, "gym", &cfg, at(1)), Ok(true));
        assert_eq!(entity.position.area, "gym");
        assert_eq!(entity.movement_points, 1);
        assert_eq!(entity.position.last_move_at, at(1));
        assert_eq!(move_to(&mut entity, "gym", &cfg, at(2)), Ok(false));
        assert_eq!(entity.movement_points, 1);
    }

    #[test]
    fn moving_without_points_fails_cleanly() {
        let cfg = EconomyConfig::default();
        let mut entity = player();
        let result = move_to(&mut entity, "gym", &cfg, at(1));
        assert!(matches!(result, Err(SimError::InsufficientResource { .. })));
        assert_eq!(entity.position.area, "yard");
    }

    #[test]
    fn bounds_hold_across_mixed_operations() {
        let cfg = EconomyConfig::default();
        let mut entity = player();
        for step in 0..200_i64 {
            let now = at(step * 7);
            let _ = tick(&mut entity, &cfg, now);
            let _ = consume(&mut entity, ResourceKind::ActionPoints, 3);
            let _ = refund(&mut entity, ResourceKind::MovementPoints, 4, &cfg, now);
            if step % 13 == 0 {
                grant_max_ap_buff(&mut entity, now + TimeDelta::minutes(20));
            }
            assert!(entity.health <= cfg.max_health(&entity));
            assert!(entity.action_points <= cfg.buffed_max_action_points);
            assert!(entity.action_points <= cfg.max_action_points(&entity, now));
            assert!(entity.movement_points <= cfg.max_movement_points);
        }
    }
}
