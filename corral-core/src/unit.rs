//! Identity Tokens - Opaque Handles for Units, Containers, and Registry Keys
//!
//! Everything the core tracks is named by a small copyable token. The core
//! never dereferences a unit: it has no authority over the execution units
//! themselves, it only records that a token was seen.
//!
//! # Design Notes:
//! - All three tokens are `u64` newtypes so they stay `Copy` and hashable
//! - `ContainerId` values come from a process-wide atomic and are never reused
//! - Tokens serialize for diagnostic dumps, never for equality shortcuts

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque handle naming a single execution unit (e.g. one pool thread).
///
/// The value is assigned by whoever admits the unit; the core treats it as
/// an uninterpreted token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitId(pub u64);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unit-{}", self.0)
    }
}

/// Stable per-instance identity token for a container.
///
/// Used by the privileged bridge to record which container a unit runs
/// under, and by `Display` diagnostics. Not a registry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerId(u64);

impl ContainerId {
    /// Allocate the next process-unique container identity.
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw token value, for diagnostics.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque key minted by a [`ContainerRegistry`](crate::registry::ContainerRegistry)
/// when a container registers.
///
/// Write-once at creation; consumed exactly once by the close call that wins
/// the container's close race.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegistryKey(pub(crate) u64);

impl RegistryKey {
    /// Raw key value, for diagnostics.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}
