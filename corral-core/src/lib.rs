//! Corral Core - Bookkeeping for Unstructured Thread Groups
//!
//! This crate provides [`SharedContainer`], a lightweight container for
//! unstructured groups of execution units (thread pools). A container does
//! not own a fixed set of workers up front: it records, on demand, how many
//! units are associated with it and which ones, and exposes a single
//! admission gate that closes exactly once.
//!
//! # Design Principles:
//! - Consistent accounting under concurrent start/exit notifications
//! - Two mutually exclusive counting strategies: an eagerly maintained
//!   striped counter, or a lazily computed enumeration
//! - Idempotent, race-free teardown that deregisters from the process-wide
//!   index exactly once
//! - Collaborators (registry, privileged bridge) are injected traits, never
//!   hidden globals, so pools and tests substitute their own
//!
//! The container never schedules or controls execution units; it only
//! records association and enforces its admission gate.

pub mod bridge;
pub mod container;
pub mod counter;
pub mod error;
pub mod registry;
pub mod unit;

pub use bridge::{LocalBridge, PrivilegedBridge};
pub use container::{CountMode, SharedContainer, ThreadContainer, ThreadsSupplier};
pub use counter::StripedCounter;
pub use error::ContainerError;
pub use registry::{ContainerRegistry, InProcessRegistry};
pub use unit::{ContainerId, RegistryKey, UnitId};
