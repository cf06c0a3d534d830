//! Error Taxonomy for Container Operations
//!
//! All failures here are synchronous logic errors reported to the caller;
//! nothing is transient, so nothing is retried or logged internally.

use thiserror::Error;

/// Errors reported by container operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContainerError {
    /// Admission was requested after the container closed its gate.
    #[error("container is closed")]
    Closed,

    /// An enumeration override was installed without a supplier.
    #[error("threads supplier must be provided")]
    MissingSupplier,

    /// The operation does not exist for an unstructured container.
    #[error("unsupported operation on a shared container: {0}")]
    Unsupported(&'static str),
}
