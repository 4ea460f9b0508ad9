//! World seeding at startup.
//!
//! Seed entities are described in a small JSON format (name, kind, area,
//! stats, optional weapon) rather than full entity documents, so a seed
//! file stays readable. Seeding only happens when the store is empty;
//! restarting against a populated Dragonfly instance keeps its state.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

use cellblock_core::{Clock, Engine};
use cellblock_store::EntityStore;
use cellblock_types::{Entity, EntityKind, Weapon};

use crate::error::ServerError;

/// One entity to create at startup.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SeedEntity {
    /// Display name.
    pub name: String,
    /// Player, guard, or static NPC.
    pub kind: EntityKind,
    /// Starting area.
    pub area: String,
    /// Strength stat.
    #[serde(default)]
    pub strength: u32,
    /// Defense stat.
    #[serde(default)]
    pub defense: u32,
    /// Agility stat.
    #[serde(default)]
    pub agility: u32,
    /// Dodge stat.
    #[serde(default)]
    pub dodge: u32,
    /// Permanent points (NPC health scales with these).
    #[serde(default)]
    pub points: u32,
    /// Weapon equipped at start.
    #[serde(default)]
    pub weapon: Option<SeedWeapon>,
}

/// A weapon handed out at startup.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SeedWeapon {
    /// Display name.
    pub name: String,
    /// Damage bonus.
    pub attack_bonus: u32,
    /// Durability when new.
    pub max_durability: u32,
    /// Kill-feed template with `[killer]` and `[victim]` placeholders.
    #[serde(default)]
    pub death_message: String,
}

impl SeedEntity {
    /// Build a fresh entity at `now`. NPCs start at their full health.
    pub fn into_entity(self, now: DateTime<Utc>, npc_health: impl Fn(&Entity) -> u32) -> Entity {
        let mut entity = Entity::new(self.name, self.kind, self.area, now);
        entity.stats.strength = self.strength;
        entity.stats.defense = self.defense;
        entity.stats.agility = self.agility;
        entity.stats.dodge = self.dodge;
        entity.progression.points = self.points;
        entity.equipped_weapon = self.weapon.map(|weapon| {
            Weapon::new(
                weapon.name,
                weapon.attack_bonus,
                weapon.max_durability,
                weapon.death_message,
            )
        });
        if entity.kind.is_npc() {
            entity.health = npc_health(&entity);
        }
        entity
    }
}

/// Parse a seed file: a JSON array of [`SeedEntity`].
pub fn load_seed_file(path: &Path) -> Result<Vec<SeedEntity>, ServerError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ServerError::Seed {
        message: format!("failed to read {}: {e}", path.display()),
    })?;
    parse_seeds(&contents)
}

/// Parse seed entities from a JSON string.
pub fn parse_seeds(json: &str) -> Result<Vec<SeedEntity>, ServerError> {
    serde_json::from_str(json).map_err(|e| ServerError::Seed {
        message: format!("failed to parse seed entities: {e}"),
    })
}

/// Insert `seeds` unless the world already has entities.
///
/// Returns how many entities were created.
pub async fn seed_world<S, C>(
    engine: &Engine<S, C>,
    seeds: Vec<SeedEntity>,
) -> Result<usize, ServerError>
where
    S: EntityStore,
    C: Clock,
{
    let existing = engine.list_entities().await?;
    if !existing.is_empty() {
        info!(existing = existing.len(), "World already populated, skipping seed");
        return Ok(0);
    }

    let now = engine.clock().now();
    let economy = &engine.config().economy;
    let mut created: usize = 0;
    for seed in seeds {
        let entity = seed.into_entity(now, |e| economy.max_health(e));
        engine.insert_entity(&entity).await?;
        created = created.saturating_add(1);
    }

    info!(created, "World seeded");
    Ok(created)
}
