//! Engine, schedulers, and configuration for the Cellblock simulation.
//!
//! This crate turns the pure rules in `cellblock-sim` into persisted,
//! concurrent operations on an entity store: every mutation is a locked,
//! version-checked, retried read-modify-write.
//!
//! # Modules
//!
//! - [`clock`] -- [`Clock`] trait, wall clock, and a manual clock for tests
//! - [`config`] -- Loading `cellblock-config.yaml` into [`SimulationConfig`]
//! - [`control`] -- Pause, resume, and stop switches for the sweep loops
//! - [`engine`] -- The [`Engine`] and every entity operation
//! - [`error`] -- [`EngineError`]
//! - [`locks`] -- Per-entity lock table
//! - [`retry`] -- Bounded exponential backoff ([`RetryPolicy`])
//! - [`scheduler`] -- The behavior and regeneration loops ([`Scheduler`])

pub mod clock;
pub mod config;
pub mod control;
pub mod engine;
pub mod error;
pub mod locks;
pub mod retry;
pub mod scheduler;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, SimulationConfig};
pub use control::TaskControl;
pub use engine::{Engine, SweepReport};
pub use error::EngineError;
pub use retry::RetryPolicy;
pub use scheduler::Scheduler;
