//! Container Registry - Process-Wide Index of Live Containers
//!
//! Containers register themselves at creation and deregister exactly once
//! at close. The registry holds only weak references: container lifetime is
//! governed solely by the owning pool, and a dead entry simply prunes out
//! of diagnostic listings.
//!
//! # Performance Pattern: Read-Heavy RwLock
//! Diagnostic tooling reads the index far more often than containers come
//! and go. `RwLock` allows unlimited concurrent readers while only blocking
//! on the registration/deregistration write path.

use crate::container::ThreadContainer;
use crate::unit::RegistryKey;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

/// The index a container registers with at creation and deregisters from at
/// close.
///
/// Implementations must tolerate concurrent registration of many containers;
/// `deregister` must be idempotent from the caller's perspective, though the
/// core guarantees it calls it at most once per key.
pub trait ContainerRegistry: Send + Sync {
    /// Register a container, returning its opaque key.
    ///
    /// The reference is weak: registering never extends the container's
    /// lifetime.
    fn register(&self, container: Weak<dyn ThreadContainer>) -> RegistryKey;

    /// Revoke a previously issued key.
    fn deregister(&self, key: RegistryKey);
}

/// In-process registry implementation backed by a weak-reference map.
pub struct InProcessRegistry {
    entries: RwLock<HashMap<u64, Weak<dyn ThreadContainer>>>,
    next_key: AtomicU64,
}

impl InProcessRegistry {
    /// Create an empty registry.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            entries: RwLock::new(HashMap::new()),
            next_key: AtomicU64::new(1),
        })
    }

    /// Look up a registered container by key, if it is still alive.
    pub fn get(&self, key: RegistryKey) -> Option<Arc<dyn ThreadContainer>> {
        self.entries
            .read()
            .expect("registry lock poisoned during get")
            .get(&key.0)
            .and_then(Weak::upgrade)
    }

    /// Snapshot all live registered containers, skipping entries whose
    /// container has already been dropped.
    pub fn containers(&self) -> Vec<Arc<dyn ThreadContainer>> {
        self.entries
            .read()
            .expect("registry lock poisoned during containers")
            .values()
            .filter_map(Weak::upgrade)
            .collect()
    }

    /// Number of registered entries, live or not.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .expect("registry lock poisoned during len")
            .len()
    }

    /// True when no container is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ContainerRegistry for InProcessRegistry {
    fn register(&self, container: Weak<dyn ThreadContainer>) -> RegistryKey {
        let key = RegistryKey(self.next_key.fetch_add(1, Ordering::Relaxed));
        self.entries
            .write()
            .expect("registry lock poisoned during register")
            .insert(key.0, container);
        key
    }

    fn deregister(&self, key: RegistryKey) {
        self.entries
            .write()
            .expect("registry lock poisoned during deregister")
            .remove(&key.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::LocalBridge;
    use crate::container::{CountMode, SharedContainer};

    #[test]
    fn test_register_and_get() {
        let registry = InProcessRegistry::new();
        let bridge = LocalBridge::new();
        let container = SharedContainer::create(
            Some("pool-a"),
            CountMode::Eager,
            registry.clone(),
            bridge,
        );

        assert_eq!(registry.len(), 1);
        let key = container.registry_key().expect("container not registered");
        let found = registry.get(key).expect("registered container missing");
        assert_eq!(found.name(), Some("pool-a"));
    }

    #[test]
    fn test_deregister_is_idempotent() {
        let registry = InProcessRegistry::new();
        let bridge = LocalBridge::new();
        let container =
            SharedContainer::create(None, CountMode::Eager, registry.clone(), bridge);
        let key = container.registry_key().expect("container not registered");

        registry.deregister(key);
        registry.deregister(key);
        assert!(registry.is_empty());
        assert!(registry.get(key).is_none());
    }

    #[test]
    fn test_dead_containers_prune_from_listing() {
        let registry = InProcessRegistry::new();
        let bridge = LocalBridge::new();
        let container =
            SharedContainer::create(Some("short-lived"), CountMode::Eager, registry.clone(), bridge);
        assert_eq!(registry.containers().len(), 1);

        // Dropping the last strong reference leaves a dead weak entry.
        drop(container);
        assert_eq!(registry.len(), 1);
        assert!(registry.containers().is_empty());
    }

    #[test]
    fn test_concurrent_registration() {
        let registry = InProcessRegistry::new();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let reg = registry.clone();
            handles.push(std::thread::spawn(move || {
                let bridge = LocalBridge::new();
                let mut containers = Vec::new();
                for _ in 0..50 {
                    containers.push(SharedContainer::create(
                        None,
                        CountMode::Eager,
                        reg.clone(),
                        bridge.clone(),
                    ));
                }
                containers
            }));
        }
        let mut all = Vec::new();
        for h in handles {
            all.extend(h.join().expect("thread panicked"));
        }
        assert_eq!(registry.len(), 400);
        assert_eq!(registry.containers().len(), 400);
        drop(all);
    }
}
