//! Shared Container - Unstructured Thread-Group Bookkeeping
//!
//! A shared container has no owner and no scoped lifetime: membership is
//! managed externally, typically by a thread-pool implementation. The
//! container itself only records association notifications, answers count
//! and enumeration queries, and gates admission of new units behind a flag
//! that closes exactly once.
//!
//! # Design Notes:
//! - The container never owns its units; it has no authority over them
//! - Eager counting pays one striped-counter write per notification for
//!   O(1) reads; lazy counting pays nothing on the hot path but reads cost
//!   a full enumeration
//! - Close is a single compare-and-set; only the winner deregisters
//! - Close does not block, wait for, or cancel units admitted around the
//!   same time; it only rejects admissions that observe the closed flag

use crate::counter::StripedCounter;
use crate::error::ContainerError;
use crate::registry::ContainerRegistry;
use crate::bridge::PrivilegedBridge;
use crate::unit::{ContainerId, RegistryKey, UnitId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use tracing::{debug, trace};

/// Contract every container variant satisfies, structured or not.
///
/// A structured variant would report an owning unit and accept
/// `push_current`; the shared variant here does neither.
pub trait ThreadContainer: Send + Sync {
    /// The container's label, if it was given one.
    fn name(&self) -> Option<&str>;

    /// The unit that owns this container. Always `None` for the shared
    /// (unstructured) kind.
    fn owner(&self) -> Option<UnitId>;

    /// Notification that a unit has begun running under this container.
    fn on_start(&self, unit: UnitId);

    /// Notification that a unit has ceased running under this container.
    fn on_exit(&self, unit: UnitId);

    /// Current number of associated units.
    fn thread_count(&self) -> i64;

    /// The units currently associated with this container.
    fn threads(&self) -> Vec<UnitId>;

    /// Make this container current for the calling unit.
    fn push_current(&self) -> Result<(), ContainerError>;
}

/// How a container accounts for its units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CountMode {
    /// Maintain a striped counter on every association event; reads are O(1).
    Eager,
    /// Derive the count by enumerating; nothing happens on the association
    /// path, reads cost O(live units).
    Lazy,
}

/// Replaceable strategy producing the units currently in a container.
/// Each invocation recomputes; the result is a point-in-time snapshot.
pub type ThreadsSupplier = Arc<dyn Fn() -> Vec<UnitId> + Send + Sync>;

/// A container for an unstructured group of execution units.
pub struct SharedContainer {
    name: Option<String>,
    id: ContainerId,
    count: Option<StripedCounter>,
    threads_supplier: RwLock<Option<ThreadsSupplier>>,
    key: Mutex<Option<RegistryKey>>,
    closed: AtomicBool,
    registry: Arc<dyn ContainerRegistry>,
    bridge: Arc<dyn PrivilegedBridge>,
}

impl SharedContainer {
    /// Create a shared container and register it with `registry`.
    ///
    /// The returned `Arc` is handed out only after registration completes,
    /// so no caller ever observes a half-constructed container. The
    /// registry holds a weak reference; the container lives exactly as long
    /// as its owning pool keeps it.
    pub fn create(
        name: Option<&str>,
        mode: CountMode,
        registry: Arc<dyn ContainerRegistry>,
        bridge: Arc<dyn PrivilegedBridge>,
    ) -> Arc<Self> {
        let container = Arc::new(Self {
            name: name.map(str::to_owned),
            id: ContainerId::next(),
            count: match mode {
                CountMode::Eager => Some(StripedCounter::new()),
                CountMode::Lazy => None,
            },
            threads_supplier: RwLock::new(None),
            key: Mutex::new(None),
            closed: AtomicBool::new(false),
            registry,
            bridge,
        });
        let weak: Weak<dyn ThreadContainer> = Arc::downgrade(&container) as Weak<dyn ThreadContainer>;
        let key = container.registry.register(weak);
        *container
            .key
            .lock()
            .expect("key lock poisoned during create") = Some(key);
        debug!(container = %container, key = key.as_u64(), ?mode, "container registered");
        container
    }

    /// Stable per-instance identity token.
    pub fn id(&self) -> ContainerId {
        self.id
    }

    /// The registry key, until the container closes.
    pub fn registry_key(&self) -> Option<RegistryKey> {
        *self.key.lock().expect("key lock poisoned during registry_key")
    }

    /// True once [`close`](Self::close) has taken effect.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Install the strategy that enumerates this container's units.
    ///
    /// `None` is a caller error: it fails with
    /// [`ContainerError::MissingSupplier`] and leaves the previously
    /// installed strategy (or the bridge fallback) intact. Replacement is
    /// last-writer-wins; concurrent `threads` calls observe either the old
    /// or the new strategy, never a torn one.
    pub fn set_threads_supplier(
        &self,
        supplier: Option<ThreadsSupplier>,
    ) -> Result<(), ContainerError> {
        let supplier = supplier.ok_or(ContainerError::MissingSupplier)?;
        *self
            .threads_supplier
            .write()
            .expect("supplier lock poisoned during set_threads_supplier") = Some(supplier);
        Ok(())
    }

    /// Admit a unit: hand it to the privileged bridge to begin execution
    /// under this container's identity.
    ///
    /// Fails with [`ContainerError::Closed`] once the container has closed,
    /// with no further action. A unit may be admitted concurrently with a
    /// close call; close makes no attempt to affect admissions already in
    /// flight, it only rejects those that observe the closed flag.
    pub fn start(&self, unit: UnitId) -> Result<(), ContainerError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ContainerError::Closed);
        }
        trace!(container = %self, unit = %unit, "admitting unit");
        self.bridge.begin_execution(unit, self.id);
        Ok(())
    }

    /// Close this container. Terminal and idempotent: later `start` calls
    /// fail, and exactly one caller deregisters from the registry no matter
    /// how many threads race here. Units already running, and association
    /// notifications for them, are unaffected.
    pub fn close(&self) {
        // Fast path: someone already closed it.
        if self.closed.load(Ordering::Relaxed) {
            return;
        }
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            let key = self
                .key
                .lock()
                .expect("key lock poisoned during close")
                .take();
            if let Some(key) = key {
                self.registry.deregister(key);
                debug!(container = %self, key = key.as_u64(), "container deregistered");
            }
        }
    }
}

impl ThreadContainer for SharedContainer {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn owner(&self) -> Option<UnitId> {
        None
    }

    /// Accepted even after close: a unit admitted just before the gate shut
    /// still reports its association, and rejecting it would leave the
    /// counter permanently skewed.
    fn on_start(&self, _unit: UnitId) {
        if let Some(count) = &self.count {
            count.increment();
        }
    }

    fn on_exit(&self, _unit: UnitId) {
        if let Some(count) = &self.count {
            count.decrement();
        }
    }

    /// Eager mode reads the striped counter; lazy mode evaluates the
    /// enumeration strategy and reports its length, so count and
    /// enumeration always agree.
    ///
    /// In eager mode the value can drift negative if the notifier drops or
    /// reorders notifications; the enumeration path stays correct relative
    /// to the bridge's live view regardless.
    fn thread_count(&self) -> i64 {
        match &self.count {
            Some(count) => count.sum(),
            None => self.threads().len() as i64,
        }
    }

    /// Enumerate via the installed supplier, or fall back to filtering the
    /// bridge's global listing by ownership. The fallback is O(all live
    /// units in the process); pools that already track their own membership
    /// should install a supplier.
    fn threads(&self) -> Vec<UnitId> {
        let supplier = self
            .threads_supplier
            .read()
            .expect("supplier lock poisoned during threads")
            .clone();
        match supplier {
            Some(supplier) => supplier(),
            None => self
                .bridge
                .list_all_units()
                .into_iter()
                .filter(|unit| self.bridge.owner_of(*unit) == Some(self.id))
                .collect(),
        }
    }

    /// A shared container is not tied to any calling unit's scope, so there
    /// is nothing to push.
    fn push_current(&self) -> Result<(), ContainerError> {
        Err(ContainerError::Unsupported("push_current"))
    }
}

impl fmt::Display for SharedContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name}/SharedContainer@{}", self.id),
            None => write!(f, "SharedContainer@{}", self.id),
        }
    }
}

impl fmt::Debug for SharedContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedContainer")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .field("counting", &self.count.is_some())
            .finish()
    }
}
