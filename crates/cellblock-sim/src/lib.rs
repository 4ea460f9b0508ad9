//! Simulation rules for the Cellblock engine.
//!
//! This crate contains the logic layer for entities -- everything that
//! operates on entity state without touching I/O. It sits between
//! `cellblock-types` (which defines the data structures) and
//! `cellblock-core` (which handles persistence, locking, and scheduling).
//!
//! Every function here takes the entities, config, clock reading, and random
//! source it needs as arguments, so the same inputs always give the same
//! result.
//!
//! # Modules
//!
//! - [`behavior`] -- NPC profiles and relocation planning ([`reassign`])
//! - [`combat`] -- Attack resolution under a selectable ruleset ([`resolve_attack`])
//! - [`config`] -- Tunables for every rule, with the live game's defaults
//! - [`economy`] -- Health, AP, and MP regeneration, spending, and movement
//! - [`error`] -- Rule violations ([`SimError`])
//! - [`incapacitation`] -- The down/revive state machine
//! - [`loot`] -- Kill rewards and experience allocation
//! - [`rolls`] -- Random draws and the [`ScriptedRolls`] replay generator

pub mod behavior;
pub mod combat;
pub mod config;
pub mod economy;
pub mod error;
pub mod incapacitation;
pub mod loot;
pub mod rolls;

// Re-export primary types at crate root for convenience.
pub use behavior::{BehaviorParameters, Relocation, is_eligible, is_ready, reassign};
pub use combat::{AttackResolution, RulesetKind, resolve_attack, validate_attack};
pub use config::{
    BehaviorConfig, ChanceCurve, CombatConfig, CombatRuleset, CritChance, CritMultiplier,
    DefenseReduction, EconomyConfig, LootConfig, LootTier, RecoveryConfig,
};
pub use economy::RegenResult;
pub use error::SimError;
pub use incapacitation::{LifecycleState, Revival};
pub use loot::{allocate_experience, award_kill, roll_money};
pub use rolls::ScriptedRolls;
