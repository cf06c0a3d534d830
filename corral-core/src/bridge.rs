//! Privileged Bridge - Authority Over Execution Units
//!
//! The bridge is the one component allowed to enumerate every live unit in
//! the process, report which container a unit runs under, and actually hand
//! a unit its execution. The core only ever talks to it through this trait,
//! injected at construction, so tests and embedders substitute their own.
//!
//! # Design Notes:
//! - Containers consult `list_all_units`/`owner_of` only on the fallback
//!   enumeration path; pools that track their own membership install an
//!   enumeration override instead
//! - `begin_execution` is called only after the container's admission gate
//!   was observed open

use crate::unit::{ContainerId, UnitId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::trace;

/// Process-wide authority over execution units.
pub trait PrivilegedBridge: Send + Sync {
    /// Every live unit in the process, in no particular order.
    fn list_all_units(&self) -> Vec<UnitId>;

    /// The container a unit currently runs under, if any.
    fn owner_of(&self, unit: UnitId) -> Option<ContainerId>;

    /// Begin executing `unit` under `container`'s identity.
    fn begin_execution(&self, unit: UnitId, container: ContainerId);
}

/// In-process bridge backed by an ownership map.
///
/// Suits embedders without runtime-level thread introspection: the pool
/// drives `begin_execution` through its container's gate and calls
/// [`end_execution`](LocalBridge::end_execution) when the unit retires.
pub struct LocalBridge {
    owners: RwLock<HashMap<UnitId, ContainerId>>,
}

impl LocalBridge {
    /// Create a bridge with no units.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            owners: RwLock::new(HashMap::new()),
        })
    }

    /// Record that a unit has ceased executing, returning the container it
    /// ran under.
    pub fn end_execution(&self, unit: UnitId) -> Option<ContainerId> {
        let owner = self
            .owners
            .write()
            .expect("bridge lock poisoned during end_execution")
            .remove(&unit);
        if let Some(container) = owner {
            trace!(unit = %unit, container = %container, "unit retired");
        }
        owner
    }

    /// Number of units currently executing.
    pub fn unit_count(&self) -> usize {
        self.owners
            .read()
            .expect("bridge lock poisoned during unit_count")
            .len()
    }
}

impl PrivilegedBridge for LocalBridge {
    fn list_all_units(&self) -> Vec<UnitId> {
        self.owners
            .read()
            .expect("bridge lock poisoned during list_all_units")
            .keys()
            .copied()
            .collect()
    }

    fn owner_of(&self, unit: UnitId) -> Option<ContainerId> {
        self.owners
            .read()
            .expect("bridge lock poisoned during owner_of")
            .get(&unit)
            .copied()
    }

    fn begin_execution(&self, unit: UnitId, container: ContainerId) {
        trace!(unit = %unit, container = %container, "unit admitted");
        self.owners
            .write()
            .expect("bridge lock poisoned during begin_execution")
            .insert(unit, container);
    }
}
