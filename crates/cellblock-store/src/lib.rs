//! Entity store adapter for the Cellblock simulation.
//!
//! The engine reads and writes entities only through the [`EntityStore`]
//! trait. Two implementations are provided:
//!
//! ```text
//! Engine
//!     |
//!     +-- EntityStore
//!         |-- MemoryStore     (in-process, tests and single-node runs)
//!         +-- DragonflyStore  (Dragonfly / Redis, Lua-scripted CAS)
//! ```
//!
//! Entity writes are compare-and-swap on the entity's `version` field, and
//! [`EntityStore::commit`] applies several writes plus feed appends as one
//! atomic unit.
//!
//! # Modules
//!
//! - [`store`] -- The [`EntityStore`] trait and [`StoreBatch`]
//! - [`memory`] -- [`MemoryStore`], the in-process implementation
//! - [`dragonfly`] -- [`DragonflyStore`], the `Dragonfly` implementation
//! - [`error`] -- Shared error types

pub mod dragonfly;
pub mod error;
pub mod memory;
pub mod store;

// Re-export primary types for convenience.
pub use dragonfly::DragonflyStore;
pub use error::StoreError;
pub use memory::MemoryStore;
pub use store::{EntityStore, StoreBatch};
