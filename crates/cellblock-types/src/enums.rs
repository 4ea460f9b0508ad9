//! Enumeration types for the Cellblock simulation.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Entity kinds
// ---------------------------------------------------------------------------

/// The category of a simulated entity.
///
/// Players are driven by humans. Guards and static NPCs are driven by the
/// behavior scheduler (static NPCs never move).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum EntityKind {
    /// A human-controlled inmate.
    Player,
    /// A roaming guard NPC.
    Guard,
    /// An NPC pinned to a single area (shopkeeper, warden, ...).
    StaticNpc,
}

impl EntityKind {
    /// Whether entities of this kind are non-player characters.
    pub const fn is_npc(self) -> bool {
        matches!(self, Self::Guard | Self::StaticNpc)
    }
}

impl core::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Player => write!(f, "player"),
            Self::Guard => write!(f, "guard"),
            Self::StaticNpc => write!(f, "static_npc"),
        }
    }
}

// ---------------------------------------------------------------------------
// Resources
// ---------------------------------------------------------------------------

/// A regenerating, consumable entity resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum ResourceKind {
    /// Hit points. Zero means incapacitated.
    Health,
    /// Action points, spent on attacks and other actions.
    ActionPoints,
    /// Movement points, spent one per area change.
    MovementPoints,
}

impl core::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Health => write!(f, "health"),
            Self::ActionPoints => write!(f, "action_points"),
            Self::MovementPoints => write!(f, "movement_points"),
        }
    }
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// A combat stat that unallocated experience can be spent on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum StatName {
    /// Raw attack power.
    Strength,
    /// Flat damage reduction.
    Defense,
    /// Counter-attack and guard crit chance.
    Agility,
    /// Chance to avoid an attack entirely.
    Dodge,
}

impl StatName {
    /// Every allocatable stat, in display order.
    pub const ALL: [Self; 4] = [Self::Strength, Self::Defense, Self::Agility, Self::Dodge];
}

impl core::fmt::Display for StatName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Strength => write!(f, "strength"),
            Self::Defense => write!(f, "defense"),
            Self::Agility => write!(f, "agility"),
            Self::Dodge => write!(f, "dodge"),
        }
    }
}

/// Error returned when parsing an unknown stat name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStat(pub String);

impl core::fmt::Display for UnknownStat {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "unknown stat: {}", self.0)
    }
}

impl std::error::Error for UnknownStat {}

impl core::str::FromStr for StatName {
    type Err = UnknownStat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strength" => Ok(Self::Strength),
            "defense" => Ok(Self::Defense),
            "agility" => Ok(Self::Agility),
            "dodge" => Ok(Self::Dodge),
            other => Err(UnknownStat(other.to_owned())),
        }
    }
}

// ---------------------------------------------------------------------------
// Behavior profiles
// ---------------------------------------------------------------------------

/// Behavior profile assigned to a roaming NPC by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum BehaviorProfile {
    /// Engages readily and pursues for a long time.
    Aggressive,
    /// Holds ground and reacts only when provoked.
    Defensive,
    /// Walks a wide circuit of areas.
    Patroller,
    /// Follows up on disturbances with a long memory.
    Investigator,
    /// Watches a single post with a wide detection range.
    Sentinel,
}

impl BehaviorProfile {
    /// All profiles, in a stable order used for uniform selection.
    pub const ALL: [Self; 5] = [
        Self::Aggressive,
        Self::Defensive,
        Self::Patroller,
        Self::Investigator,
        Self::Sentinel,
    ];
}

impl core::fmt::Display for BehaviorProfile {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Aggressive => write!(f, "aggressive"),
            Self::Defensive => write!(f, "defensive"),
            Self::Patroller => write!(f, "patroller"),
            Self::Investigator => write!(f, "investigator"),
            Self::Sentinel => write!(f, "sentinel"),
        }
    }
}

// ---------------------------------------------------------------------------
// Feeds
// ---------------------------------------------------------------------------

/// An append-only log maintained by the entity store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum Feed {
    /// One [`KillRecord`](crate::KillRecord) per fatal attack.
    Kills,
    /// Miscellaneous state-change records (weapon breakage, revivals).
    History,
}

impl Feed {
    /// Storage name of the feed.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Kills => "kills",
            Self::History => "history",
        }
    }
}

impl core::fmt::Display for Feed {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stat_names_parse_case_insensitively() {
        assert_eq!("Strength".parse::<StatName>().ok(), Some(StatName::Strength));
        assert_eq!(" dodge ".parse::<StatName>().ok(), Some(StatName::Dodge));
        assert!("charisma".parse::<StatName>().is_err());
    }

    #[test]
    fn stat_display_roundtrips_through_parse() {
        for stat in StatName::ALL {
            assert_eq!(stat.to_string().parse::<StatName>().ok(), Some(stat));
        }
    }

    #[test]
    fn only_guards_and_static_npcs_are_npcs() {
        assert!(!EntityKind::Player.is_npc());
        assert!(EntityKind::Guard.is_npc());
        assert!(EntityKind::StaticNpc.is_npc());
    }

    #[test]
    fn feed_names_are_stable() {
        assert_eq!(Feed::Kills.as_str(), "kills");
        assert_eq!(Feed::History.to_string(), "history");
    }
}
