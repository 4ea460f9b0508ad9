//! Configuration loading and typed config structures for the Cellblock engine.
//!
//! The canonical configuration lives in `cellblock-config.yaml` at the
//! project root. This module defines strongly-typed structs that mirror the
//! YAML structure, and provides a loader that reads and validates the file.
//! Rule tunables reuse the structs from `cellblock-sim`; this module adds
//! the scheduling, retry, store, world, and logging sections around them.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use cellblock_sim::{BehaviorConfig, CombatConfig, EconomyConfig, LootConfig, RecoveryConfig};

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The configuration parsed but describes an unusable setup.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level engine configuration.
///
/// Mirrors the structure of `cellblock-config.yaml`. Every section is
/// optional and defaults to the live game's values.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SimulationConfig {
    /// World settings (seed, seed entities).
    #[serde(default)]
    pub world: WorldConfig,

    /// Resource caps and regeneration rates.
    #[serde(default)]
    pub economy: EconomyConfig,

    /// Combat resolver parameters and rulesets.
    #[serde(default)]
    pub combat: CombatConfig,

    /// Incapacitation and revival parameters.
    #[serde(default)]
    pub recovery: RecoveryConfig,

    /// Kill rewards.
    #[serde(default)]
    pub loot: LootConfig,

    /// NPC relocation sweep.
    #[serde(default)]
    pub behavior: BehaviorScheduleConfig,

    /// Regeneration sweep.
    #[serde(default)]
    pub regeneration: RegenerationConfig,

    /// Retry policy for store conflicts and failures.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Entity store backend.
    #[serde(default)]
    pub store: StoreConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SimulationConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values for infrastructure URLs:
    /// - `DRAGONFLY_URL` overrides `store.dragonfly_url`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.store.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the engine cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::Invalid { reason };

        self.loot.validate().map_err(invalid)?;

        for (name, ruleset) in [("standard", &self.combat.standard), ("guard", &self.combat.guard)]
        {
            if ruleset.variance_min > ruleset.variance_max {
                return Err(invalid(format!(
                    "combat.{name}: variance_min exceeds variance_max"
                )));
            }
        }
        if self.combat.min_wear > self.combat.max_wear {
            return Err(invalid(String::from("combat: min_wear exceeds max_wear")));
        }
        if self.behavior.rules.patrol_areas.is_empty() {
            return Err(invalid(String::from("behavior: patrol_areas is empty")));
        }
        if self.behavior.interval_secs == 0 || self.regeneration.interval_secs == 0 {
            return Err(invalid(String::from("sweep intervals must be at least 1 second")));
        }
        if self.retry.max_attempts == 0 {
            return Err(invalid(String::from("retry: max_attempts must be at least 1")));
        }
        Ok(())
    }
}

/// World-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorldConfig {
    /// Seed for the engine's random source.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Optional JSON file of entities to create at startup.
    #[serde(default)]
    pub seed_entities: Option<PathBuf>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            seed_entities: None,
        }
    }
}

/// NPC relocation sweep configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BehaviorScheduleConfig {
    /// Seconds between sweeps.
    #[serde(default = "default_behavior_interval_secs")]
    pub interval_secs: u64,

    /// Areas NPCs are spread over.
    #[serde(flatten)]
    pub rules: BehaviorConfig,
}

impl Default for BehaviorScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_behavior_interval_secs(),
            rules: BehaviorConfig::default(),
        }
    }
}

/// Regeneration sweep configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegenerationConfig {
    /// Seconds between sweeps.
    #[serde(default = "default_regeneration_interval_secs")]
    pub interval_secs: u64,
}

impl Default for RegenerationConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_regeneration_interval_secs(),
        }
    }
}

/// Retry policy configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, including the first (default: 3).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry, doubled each time (default: 25).
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Upper bound on any single delay (default: 400).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// Which [`EntityStore`](cellblock_store::EntityStore) implementation to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// In-process store; state is lost on exit.
    #[default]
    Memory,
    /// `Dragonfly` (Redis-compatible) store.
    Dragonfly,
}

/// Entity store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoreConfig {
    /// Backend selection.
    #[serde(default)]
    pub backend: StoreBackend,

    /// Dragonfly (Redis-compatible) URL.
    #[serde(default = "default_dragonfly_url")]
    pub dragonfly_url: String,
}

impl StoreConfig {
    /// Override infrastructure URLs with environment variables when set.
    ///
    /// This allows Docker Compose (or any deployment) to set connection
    /// strings via env vars without modifying the YAML config file.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("DRAGONFLY_URL") {
            self.dragonfly_url = val;
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            dragonfly_url: default_dragonfly_url(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

const fn default_seed() -> u64 {
    42
}

const fn default_behavior_interval_secs() -> u64 {
    30
}

const fn default_regeneration_interval_secs() -> u64 {
    60
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_base_delay_ms() -> u64 {
    25
}

const fn default_max_delay_ms() -> u64 {
    400
}

fn default_dragonfly_url() -> String {
    "redis://localhost:6379".to_owned()
}

fn default_log_level() -> String {
    "info".to_owned()
}
