//! Engine binary for the Cellblock simulation.
//!
//! Wires the engine to a store, seeds the world, and runs the behavior and
//! regeneration sweeps until Ctrl-C.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `CELLBLOCK_CONFIG` or `cellblock-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Connect the configured store (in-memory or Dragonfly)
//! 4. Seed the world if the store is empty
//! 5. Start the sweep loops
//! 6. Wait for Ctrl-C, then stop the loops cleanly

mod error;
mod seed;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use cellblock_core::config::{LoggingConfig, StoreBackend};
use cellblock_core::{Engine, Scheduler, SimulationConfig, SystemClock};
use cellblock_store::{DragonflyStore, EntityStore, MemoryStore};

use crate::error::ServerError;

/// Default configuration path, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "cellblock-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if any startup step fails.
#[tokio::main]
async fn main() -> Result<(), ServerError> {
    // 1. Load configuration.
    let config = load_config()?;

    // 2. Initialize structured logging.
    init_logging(&config.logging)?;
    info!(
        seed = config.world.seed,
        backend = ?config.store.backend,
        behavior_interval_secs = config.behavior.interval_secs,
        regeneration_interval_secs = config.regeneration.interval_secs,
        "cellblock-server starting"
    );

    // 3. Connect the store and run.
    match config.store.backend {
        StoreBackend::Memory => {
            info!("Using in-memory store; state is lost on exit");
            run(MemoryStore::new(), config).await
        }
        StoreBackend::Dragonfly => {
            info!(url = %config.store.dragonfly_url, "Connecting to Dragonfly");
            let store = DragonflyStore::connect(&config.store.dragonfly_url).await?;
            info!("Dragonfly connected");
            run(store, config).await
        }
    }
}

/// Seed, schedule, and wait for shutdown on the chosen store.
async fn run<S>(store: S, config: SimulationConfig) -> Result<(), ServerError>
where
    S: EntityStore + 'static,
{
    let seed_path = config.world.seed_entities.clone();
    let engine = Arc::new(Engine::new(store, SystemClock, config));

    // 4. Seed the world.
    if let Some(path) = seed_path {
        let seeds = seed::load_seed_file(&path)?;
        let created = seed::seed_world(&engine, seeds).await?;
        info!(path = %path.display(), created, "Seed entities processed");
    }

    // 5. Start the sweep loops.
    let scheduler = Scheduler::start(Arc::clone(&engine));
    info!("Sweep loops running, press Ctrl-C to stop");

    // 6. Wait for shutdown.
    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    scheduler.shutdown().await;

    let entities = engine.list_entities().await?;
    info!(entities = entities.len(), "cellblock-server shutdown complete");
    Ok(())
}

/// Load configuration from `CELLBLOCK_CONFIG`, falling back to the default
/// path. A missing default file means built-in defaults.
fn load_config() -> Result<SimulationConfig, ServerError> {
    let (path, explicit) = std::env::var("CELLBLOCK_CONFIG").map_or_else(
        |_| (PathBuf::from(DEFAULT_CONFIG_PATH), false),
        |value| (PathBuf::from(value), true),
    );
    if explicit || Path::new(&path).exists() {
        Ok(SimulationConfig::from_file(&path)?)
    } else {
        Ok(SimulationConfig::default())
    }
}

/// Install the tracing subscriber. `RUST_LOG` wins over the configured level.
fn init_logging(logging: &LoggingConfig) -> Result<(), ServerError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = if logging.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| ServerError::Logging {
        message: e.to_string(),
    })
}
