//! Type-safe identifier wrappers around [`Uuid`].
//!
//! Entities, weapons, and feed records each get their own newtype so the
//! compiler rejects a weapon id passed where an entity id is expected. All
//! IDs use UUID v7 (time-ordered) so kill feeds sort naturally by creation.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for a simulated entity (player, guard, or static NPC).
    EntityId
}

define_id! {
    /// Unique identifier for a weapon instance held in an inventory.
    WeaponId
}

define_id! {
    /// Unique identifier for a record appended to the kill feed.
    KillRecordId
}

define_id! {
    /// Unique identifier for a record appended to the history feed.
    HistoryRecordId
}
