//! The engine: every state-changing operation on entities.
//!
//! Each operation is a read-modify-write cycle against an [`EntityStore`]:
//!
//! 1. Take the in-process lock for every entity involved (ascending id order)
//! 2. Read fresh copies from the store
//! 3. Bring them up to date: regeneration first, then lifecycle evaluation
//! 4. Apply the rule from `cellblock-sim`
//! 5. Write back with a version check, together with any feed records
//!
//! A version conflict or backend failure re-runs the whole cycle under the
//! [`RetryPolicy`]. Rule violations are returned at once and nothing is
//! written. Random draws come from one shared generator seeded from the
//! world seed, so a single-threaded run is reproducible.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use futures::StreamExt;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tracing::{debug, info, warn};

use cellblock_sim::combat::{self, RulesetKind};
use cellblock_sim::{SimError, behavior, economy, incapacitation, loot};
use cellblock_store::{EntityStore, StoreBatch};
use cellblock_types::{
    CombatOutcome, Entity, EntityId, Feed, FeedRecord, HistoryKind, HistoryRecord, ResourceKind,
    StatName, WeaponId,
};

use crate::clock::Clock;
use crate::config::SimulationConfig;
use crate::error::EngineError;
use crate::locks::EntityLocks;
use crate::retry::RetryPolicy;

/// How many entities a full regeneration sweep works on at once.
const SWEEP_CONCURRENCY: usize = 16;

/// Result of a regeneration sweep over every entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Entities looked at.
    pub examined: usize,
    /// Entities whose state changed and was written.
    pub updated: usize,
    /// Entities that came back from incapacitation.
    pub revived: usize,
    /// Entities skipped because their update failed.
    pub failed: usize,
}

/// A read-modify-write result.
#[derive(Debug)]
struct Applied<T> {
    entity: Entity,
    value: T,
    written: bool,
}

/// Shared engine state. Wrap it in an [`Arc`](std::sync::Arc) to hand it
/// to the schedulers.
pub struct Engine<S, C> {
    store: S,
    clock: C,
    config: SimulationConfig,
    rng: Mutex<Box<dyn RngCore + Send>>,
    locks: EntityLocks,
    retry: RetryPolicy,
}

impl<S, C> std::fmt::Debug for Engine<S, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("seed", &self.config.world.seed)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl<S: EntityStore, C: Clock> Engine<S, C> {
    /// Create an engine whose random draws are seeded from `config.world.seed`.
    pub fn new(store: S, clock: C, config: SimulationConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.world.seed);
        Self::with_rng(store, clock, config, rng)
    }

    /// Create an engine drawing from a caller-supplied generator.
    pub fn with_rng(
        store: S,
        clock: C,
        config: SimulationConfig,
        rng: impl RngCore + Send + 'static,
    ) -> Self {
        let retry = RetryPolicy::from_config(&config.retry);
        Self {
            store,
            clock,
            config,
            rng: Mutex::new(Box::new(rng)),
            locks: EntityLocks::new(),
            retry,
        }
    }

    /// Replace the retry policy.
    #[must_use]
    pub const fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The backing store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// The time source.
    pub const fn clock(&self) -> &C {
        &self.clock
    }

    /// The active configuration.
    pub const fn config(&self) -> &SimulationConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Entities
    // -----------------------------------------------------------------------

    /// Add a new entity to the world.
    pub async fn insert_entity(&self, entity: &Entity) -> Result<Entity, EngineError> {
        let stored = self.store.insert(entity).await?;
        debug!(entity_id = %stored.id, kind = %stored.kind, "Entity inserted");
        Ok(stored)
    }

    /// Read an entity, reviving it first if its recovery window has elapsed.
    ///
    /// A plain read never writes; only a due revival is persisted.
    pub async fn get_entity(&self, id: EntityId) -> Result<Entity, EngineError> {
        let entity = self.store.get(id).await?;
        if !incapacitation::revival_due(&entity, self.clock.now(), &self.config.recovery) {
            return Ok(entity);
        }

        let _guard = self.locks.lock(id).await;
        let applied = self
            .mutate_locked(id, "get_entity", |entity, now| {
                Ok(((), self.evaluate_lifecycle(entity, now)))
            })
            .await?;
        Ok(applied.entity)
    }

    /// Every entity in the world, as stored.
    pub async fn list_entities(&self) -> Result<Vec<Entity>, EngineError> {
        Ok(self.store.list().await?)
    }

    /// Records from one feed, oldest first.
    pub async fn read_feed(&self, feed: Feed) -> Result<Vec<FeedRecord>, EngineError> {
        Ok(self.store.read_feed(feed).await?)
    }

    // -----------------------------------------------------------------------
    // Combat
    // -----------------------------------------------------------------------

    /// Resolve one attack and persist both combatants atomically.
    ///
    /// `weapon`, when given, must name the attacker's equipped weapon. A
    /// fatal hit incapacitates the defender, pays out loot, and appends a
    /// kill record. A counterattack that drops the attacker incapacitates
    /// the attacker in the same write.
    pub async fn attack(
        &self,
        attacker_id: EntityId,
        defender_id: EntityId,
        weapon: Option<WeaponId>,
    ) -> Result<CombatOutcome, EngineError> {
        if attacker_id == defender_id {
            return Err(SimError::SelfTarget(attacker_id).into());
        }
        let _guard = self.locks.lock_many(&[attacker_id, defender_id]).await;
        self.retry
            .run("attack", move || async move {
                self.attack_once(attacker_id, defender_id, weapon).await
            })
            .await
    }

    async fn attack_once(
        &self,
        attacker_id: EntityId,
        defender_id: EntityId,
        weapon: Option<WeaponId>,
    ) -> Result<CombatOutcome, EngineError> {
        let (mut attacker, mut defender) = futures::try_join!(
            self.store.get(attacker_id),
            self.store.get(defender_id)
        )?;
        let now = self.clock.now();

        let mut appends = self.sync(&mut attacker, now);
        appends.extend(self.sync(&mut defender, now));
        check_weapon(&attacker, weapon)?;

        let kind = RulesetKind::for_matchup(attacker.kind, defender.kind);
        let resolution = self.roll(|rng| {
            combat::resolve_attack(&mut attacker, &mut defender, &self.config.combat, kind, rng)
        })?;
        let mut outcome = resolution.outcome;

        if outcome.weapon_broken
            && let Some(broken) = &resolution.weapon_used
        {
            appends.push(FeedRecord::History(HistoryRecord::new(
                attacker.id,
                HistoryKind::WeaponBroken,
                broken.name.clone(),
                now,
            )));
        }

        if outcome.is_fatal {
            let money = self.roll(|rng| loot::roll_money(rng, &self.config.loot));
            let death_message = resolution
                .weapon_used
                .as_ref()
                .map(|used| used.death_message.as_str());
            let record = loot::award_kill(
                &mut attacker,
                &mut defender,
                outcome.damage,
                death_message,
                money,
                now,
                &self.config.loot,
            );
            incapacitation::incapacitate(&mut defender, now, &self.config.recovery);
            outcome.money_awarded = Some(money);
            outcome.kill_record_id = Some(record.id);
            appends.push(FeedRecord::Kill(record));
        }

        if resolution.attacker_downed {
            attacker.progression.deaths = attacker.progression.deaths.saturating_add(1);
            incapacitation::incapacitate(&mut attacker, now, &self.config.recovery);
        }

        let batch = StoreBatch {
            writes: vec![attacker, defender],
            appends,
        };
        self.store.commit(&batch).await?;

        info!(
            attacker_id = %attacker_id,
            defender_id = %defender_id,
            ruleset = %kind,
            damage = outcome.damage,
            critical = outcome.is_critical,
            dodged = outcome.is_dodged,
            fatal = outcome.is_fatal,
            counter = outcome.counter_damage,
            "Attack resolved"
        );
        Ok(outcome)
    }

    // -----------------------------------------------------------------------
    // Resources and progression
    // -----------------------------------------------------------------------

    /// Spend a resource. Returns the new value.
    ///
    /// Spending the last point of health puts the entity down in the same
    /// write.
    pub async fn consume(
        &self,
        id: EntityId,
        resource: ResourceKind,
        amount: u32,
    ) -> Result<u32, EngineError> {
        self.mutate(id, "consume", |entity, now| {
            let appends = self.sync(entity, now);
            let value = economy::consume(entity, resource, amount)?;
            if resource == ResourceKind::Health && value == 0 {
                incapacitation::incapacitate(entity, now, &self.config.recovery);
                info!(entity_id = %entity.id, "Entity spent its last health");
            }
            Ok((value, appends))
        })
        .await
        .map(|applied| applied.value)
    }

    /// Credit a resource back, capped at its maximum. Returns the new value.
    pub async fn refund(
        &self,
        id: EntityId,
        resource: ResourceKind,
        amount: u32,
    ) -> Result<u32, EngineError> {
        self.mutate(id, "refund", |entity, now| {
            let appends = self.sync(entity, now);
            let value = economy::refund(entity, resource, amount, &self.config.economy, now)?;
            Ok((value, appends))
        })
        .await
        .map(|applied| applied.value)
    }

    /// Move an entity to `area`, paying the movement cost.
    pub async fn move_entity(&self, id: EntityId, area: &str) -> Result<Entity, EngineError> {
        self.mutate(id, "move_entity", |entity, now| {
            let appends = self.sync(entity, now);
            economy::move_to(entity, area, &self.config.economy, now)?;
            Ok(((), appends))
        })
        .await
        .map(|applied| applied.entity)
    }

    /// Raise the entity's action point cap until `until`, extending any
    /// running buff.
    pub async fn grant_max_ap_buff(
        &self,
        id: EntityId,
        until: DateTime<Utc>,
    ) -> Result<Entity, EngineError> {
        self.mutate(id, "grant_max_ap_buff", |entity, now| {
            let appends = self.sync(entity, now);
            economy::grant_max_ap_buff(entity, until);
            Ok(((), appends))
        })
        .await
        .map(|applied| applied.entity)
    }

    /// Spend banked experience on a stat. Returns the updated entity.
    pub async fn allocate_experience(
        &self,
        id: EntityId,
        stat: StatName,
        amount: u32,
    ) -> Result<Entity, EngineError> {
        self.mutate(id, "allocate_experience", |entity, _now| {
            loot::allocate_experience(entity, stat, amount)?;
            Ok(((), Vec::new()))
        })
        .await
        .map(|applied| applied.entity)
    }

    /// Revive a downed entity immediately at full health.
    pub async fn force_revive(&self, id: EntityId) -> Result<Entity, EngineError> {
        let applied = self
            .mutate(id, "force_revive", |entity, now| {
                let revival = incapacitation::force_revive(entity, &self.config.economy)?;
                let record = HistoryRecord::new(
                    entity.id,
                    HistoryKind::ForceRevived,
                    format!("revived with {} health", revival.health()),
                    now,
                );
                Ok(((), vec![FeedRecord::History(record)]))
            })
            .await?;
        info!(entity_id = %id, "Entity force-revived");
        Ok(applied.entity)
    }

    // -----------------------------------------------------------------------
    // Ticks and sweeps
    // -----------------------------------------------------------------------

    /// Bring one entity up to date at `now`: regeneration, then lifecycle.
    ///
    /// Idempotent for a fixed `now`; nothing is written when nothing changed.
    pub async fn tick(&self, id: EntityId, now: DateTime<Utc>) -> Result<Entity, EngineError> {
        self.tick_detailed(id, now)
            .await
            .map(|applied| applied.entity)
    }

    async fn tick_detailed(
        &self,
        id: EntityId,
        now: DateTime<Utc>,
    ) -> Result<Applied<bool>, EngineError> {
        self.mutate(id, "tick", move |entity, _clock_now| {
            economy::tick(entity, &self.config.economy, now);
            let appends = self.evaluate_lifecycle(entity, now);
            Ok((!appends.is_empty(), appends))
        })
        .await
    }

    /// Tick every entity in the world.
    ///
    /// One entity failing does not stop the sweep; it is counted and logged.
    pub async fn tick_all(&self, now: DateTime<Utc>) -> Result<SweepReport, EngineError> {
        let ids: Vec<EntityId> = self.store.list().await?.iter().map(|e| e.id).collect();

        let results: Vec<(EntityId, Result<Applied<bool>, EngineError>)> =
            futures::stream::iter(ids)
                .map(|id| async move { (id, self.tick_detailed(id, now).await) })
                .buffer_unordered(SWEEP_CONCURRENCY)
                .collect()
                .await;

        let mut report = SweepReport {
            examined: results.len(),
            ..SweepReport::default()
        };
        for (id, result) in results {
            match result {
                Ok(applied) => {
                    if applied.written {
                        report.updated = report.updated.saturating_add(1);
                    }
                    if applied.value {
                        report.revived = report.revived.saturating_add(1);
                    }
                }
                Err(err) => {
                    warn!(entity_id = %id, error = %err, "Regeneration tick failed");
                    report.failed = report.failed.saturating_add(1);
                }
            }
        }

        debug!(
            examined = report.examined,
            updated = report.updated,
            revived = report.revived,
            failed = report.failed,
            "Regeneration sweep complete"
        );
        Ok(report)
    }

    /// Reassign every eligible NPC to a random patrol area and profile.
    ///
    /// All moves are first attempted as one atomic batch. If that write is
    /// rejected, each NPC is retried on its own and NPCs that still fail
    /// are skipped. Returns how many NPCs moved.
    pub async fn sweep_behaviors(&self, now: DateTime<Utc>) -> Result<usize, EngineError> {
        let areas = &self.config.behavior.rules.patrol_areas;
        let mut entities = self.store.list().await?;

        let moved: Vec<Entity> = self.roll(|rng| {
            entities
                .iter_mut()
                .filter_map(|entity| {
                    behavior::reassign(entity, areas, now, &mut *rng).map(|_| entity.clone())
                })
                .collect()
        });
        if moved.is_empty() {
            return Ok(0);
        }

        let ids: Vec<EntityId> = moved.iter().map(|e| e.id).collect();
        let batch = StoreBatch {
            writes: moved,
            appends: Vec::new(),
        };
        match self.store.commit(&batch).await {
            Ok(stored) => {
                info!(moved = stored.len(), "Behavior sweep committed");
                Ok(stored.len())
            }
            Err(err) => {
                warn!(
                    error = %err,
                    candidates = ids.len(),
                    "Behavior batch rejected, relocating individually"
                );
                Ok(self.relocate_individually(&ids, now).await)
            }
        }
    }

    async fn relocate_individually(&self, ids: &[EntityId], now: DateTime<Utc>) -> usize {
        let areas = &self.config.behavior.rules.patrol_areas;
        let attempts = ids.iter().map(|&id| async move {
            let result = self
                .mutate(id, "relocate", |entity, _clock_now| {
                    let relocation =
                        self.roll(|rng| behavior::reassign(entity, areas, now, rng));
                    Ok((relocation.is_some(), Vec::new()))
                })
                .await;
            (id, result)
        });

        let mut moved: usize = 0;
        for (id, result) in futures::future::join_all(attempts).await {
            match result {
                Ok(applied) if applied.value => moved = moved.saturating_add(1),
                Ok(_) => {}
                Err(err) => warn!(entity_id = %id, error = %err, "Skipping NPC relocation"),
            }
        }
        info!(moved, "Behavior sweep relocated individually");
        moved
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Regenerate, then evaluate lifecycle. Returns the feed records produced.
    fn sync(&self, entity: &mut Entity, now: DateTime<Utc>) -> Vec<FeedRecord> {
        economy::tick(entity, &self.config.economy, now);
        self.evaluate_lifecycle(entity, now)
    }

    /// Apply a due natural revival, returning its history record.
    fn evaluate_lifecycle(&self, entity: &mut Entity, now: DateTime<Utc>) -> Vec<FeedRecord> {
        let Some(revival) = incapacitation::evaluate(
            entity,
            now,
            &self.config.recovery,
            &self.config.economy,
        ) else {
            return Vec::new();
        };
        info!(entity_id = %entity.id, health = revival.health(), "Entity revived");
        vec![FeedRecord::History(HistoryRecord::new(
            entity.id,
            HistoryKind::Revived,
            format!("revived with {} health", revival.health()),
            now,
        ))]
    }

    fn roll<T>(&self, draw: impl FnOnce(&mut dyn RngCore) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        draw(&mut **rng)
    }

    /// Lock one entity and run a retried read-modify-write on it.
    async fn mutate<T, F>(
        &self,
        id: EntityId,
        label: &'static str,
        apply: F,
    ) -> Result<Applied<T>, EngineError>
    where
        T: Send,
        F: Fn(&mut Entity, DateTime<Utc>) -> Result<(T, Vec<FeedRecord>), EngineError> + Sync,
    {
        let _guard = self.locks.lock(id).await;
        self.mutate_locked(id, label, apply).await
    }

    /// Retried read-modify-write on one entity. The caller holds its lock.
    ///
    /// `apply` receives a fresh copy and the clock reading for this attempt.
    /// When it leaves the entity unchanged and produces no records, nothing
    /// is written.
    async fn mutate_locked<T, F>(
        &self,
        id: EntityId,
        label: &'static str,
        apply: F,
    ) -> Result<Applied<T>, EngineError>
    where
        T: Send,
        F: Fn(&mut Entity, DateTime<Utc>) -> Result<(T, Vec<FeedRecord>), EngineError> + Sync,
    {
        let apply = &apply;
        self.retry
            .run(label, move || async move {
                let mut entity = self.store.get(id).await?;
                let before = entity.clone();
                let (value, appends) = apply(&mut entity, self.clock.now())?;

                if entity == before && appends.is_empty() {
                    return Ok(Applied {
                        entity,
                        value,
                        written: false,
                    });
                }

                let stored = if appends.is_empty() {
                    self.store.update(&entity).await?
                } else {
                    let batch = StoreBatch {
                        writes: vec![entity],
                        appends,
                    };
                    self.store
                        .commit(&batch)
                        .await?
                        .pop()
                        .ok_or(EngineError::EntityNotFound(id))?
                };
                Ok(Applied {
                    entity: stored,
                    value,
                    written: true,
                })
            })
            .await
    }
}

/// Reject an attack naming a weapon other than the equipped one.
fn check_weapon(attacker: &Entity, weapon: Option<WeaponId>) -> Result<(), EngineError> {
    let Some(named) = weapon else {
        return Ok(());
    };
    match &attacker.equipped_weapon {
        None => Err(SimError::NoWeaponEquipped(attacker.id).into()),
        Some(equipped) if equipped.id == named => Ok(()),
        Some(_) => Err(EngineError::WeaponMismatch {
            entity: attacker.id,
            weapon: named,
        }),
    }
}
