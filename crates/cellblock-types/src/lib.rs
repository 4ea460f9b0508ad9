//! Shared type definitions for the Cellblock simulation.
//!
//! This crate is the single source of truth for the data that flows between
//! the simulation logic, the entity store, and external callers. Types are
//! JSON-serializable via `serde` and export `TypeScript` bindings via `ts-rs`
//! for dashboards that read the store directly.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for entities, weapons, and records
//! - [`enums`] -- Entity kinds, resources, stats, behavior profiles, feeds
//! - [`structs`] -- [`Entity`] and its components, [`CombatOutcome`], feed records

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{BehaviorProfile, EntityKind, Feed, ResourceKind, StatName, UnknownStat};
pub use ids::{EntityId, HistoryRecordId, KillRecordId, WeaponId};
pub use structs::{
    Buffs, CombatOutcome, Entity, FeedRecord, HistoryKind, HistoryRecord, KillRecord, Lifecycle,
    Position, Progression, Stats, Weapon,
};

#[cfg(test)]
mod tests {
    //! `TypeScript` binding generation.

    #[test]
    fn export_bindings() {
        use ts_rs::TS;

        // IDs
        let _ = crate::ids::EntityId::export_all();
        let _ = crate::ids::WeaponId::export_all();
        let _ = crate::ids::KillRecordId::export_all();
        let _ = crate::ids::HistoryRecordId::export_all();

        // Enums
        let _ = crate::enums::EntityKind::export_all();
        let _ = crate::enums::ResourceKind::export_all();
        let _ = crate::enums::StatName::export_all();
        let _ = crate::enums::BehaviorProfile::export_all();
        let _ = crate::enums::Feed::export_all();

        // Structs
        let _ = crate::structs::Entity::export_all();
        let _ = crate::structs::CombatOutcome::export_all();
        let _ = crate::structs::KillRecord::export_all();
        let _ = crate::structs::HistoryRecord::export_all();
        let _ = crate::structs::FeedRecord::export_all();
    }
}
