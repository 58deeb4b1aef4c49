//! Watch registry error types

use assoc_types::NamespacedName;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WatchError {
    #[error("watch name must not be empty")]
    EmptyName,

    #[error("watch {name}: watched key {watched} is incomplete")]
    IncompleteWatchedKey {
        name: String,
        watched: NamespacedName,
    },

    #[error("watch {name}: watcher key {watcher} is incomplete")]
    IncompleteWatcherKey {
        name: String,
        watcher: NamespacedName,
    },
}

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, WatchError>;
