//! Error types for assoc-controller

use assoc_types::{NamespacedName, ResourceKind};
use assoc_watches::WatchError;
use std::time::Duration;
use thiserror::Error;

/// Controller process errors
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Seed fixture could not be loaded
    #[error("Seed error: {0}")]
    Seed(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Resource store errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Resource does not exist (yet)
    #[error("{kind} {key} not found")]
    NotFound {
        kind: ResourceKind,
        key: NamespacedName,
    },

    /// Optimistic concurrency check failed
    #[error("conflict writing {kind} {key}: stored version {current}, write based on {expected}")]
    Conflict {
        kind: ResourceKind,
        key: NamespacedName,
        current: u64,
        expected: u64,
    },

    /// The store refused the write
    #[error("{kind} {key} rejected: {reason}")]
    Rejected {
        kind: ResourceKind,
        key: NamespacedName,
        reason: String,
    },

    /// Transport or backend failure
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn not_found(kind: ResourceKind, key: &NamespacedName) -> Self {
        StoreError::NotFound {
            kind,
            key: key.clone(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Finalizer errors
#[derive(Debug, Error)]
pub enum FinalizerError {
    /// Cleanup action failed; the finalizer stays in place
    #[error("finalizer {name} failed: {reason}")]
    Execution { name: String, reason: String },

    /// Persisting the finalizer list failed
    #[error("updating finalizers: {0}")]
    Store(#[from] StoreError),
}

/// Errors surfaced by a reconcile invocation
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("dynamic watch: {0}")]
    Watch(#[from] WatchError),

    #[error(transparent)]
    Finalizer(#[from] FinalizerError),

    /// Credential secret exists but lacks the expected entry
    #[error("secret {secret} has no entry {entry}")]
    MissingCredential {
        secret: NamespacedName,
        entry: String,
    },

    /// Reconcile exceeded its deadline and was cancelled
    #[error("reconcile timed out after {0:?}")]
    Timeout(Duration),
}

impl ReconcileError {
    /// A dependency has not been created or populated yet
    pub fn is_not_found(&self) -> bool {
        match self {
            ReconcileError::Store(e) => e.is_not_found(),
            ReconcileError::MissingCredential { .. } => true,
            _ => false,
        }
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type alias for controller operations
pub type ControllerResult<T> = Result<T, ControllerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_classification() {
        let key = NamespacedName::new("ns", "es1");
        let nf = StoreError::not_found(ResourceKind::Secret, &key);
        assert!(nf.is_not_found());
        assert!(ReconcileError::from(nf).is_not_found());

        assert!(ReconcileError::MissingCredential {
            secret: key.clone(),
            entry: "elastic-internal-kibana".to_string(),
        }
        .is_not_found());

        let unavailable = StoreError::Unavailable("connection reset".to_string());
        assert!(!unavailable.is_not_found());
        assert!(!ReconcileError::from(unavailable).is_not_found());
        assert!(!ReconcileError::Timeout(Duration::from_secs(1)).is_not_found());
    }

    #[test]
    fn test_error_messages() {
        let err = StoreError::not_found(ResourceKind::Kibana, &NamespacedName::new("ns", "kb1"));
        assert_eq!(err.to_string(), "kibana ns/kb1 not found");
    }
}
