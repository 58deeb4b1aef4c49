//! Name-keyed watch registrations

use crate::error::{Result, WatchError};
use assoc_types::{NamespacedName, ResourceKind};
use dashmap::DashMap;
use tracing::debug;

/// Build the registration name `<namespace>-<name>-<kind>-watch`
pub fn watch_name(owner: &NamespacedName, kind: &str) -> String {
    format!("{}-{}-{}-watch", owner.namespace, owner.name, kind)
}

/// A single subscription: changes to `watched` re-queue `watcher`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedWatch {
    pub name: String,
    pub watched: NamespacedName,
    pub watcher: NamespacedName,
}

/// Registrations for one kind of watched resource
#[derive(Debug)]
pub struct DynamicEnqueue {
    kind: ResourceKind,
    handlers: DashMap<String, NamedWatch>,
}

impl DynamicEnqueue {
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            handlers: DashMap::new(),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Register or overwrite the watch with the same name
    pub fn add_handler(&self, watch: NamedWatch) -> Result<()> {
        if watch.name.is_empty() {
            return Err(WatchError::EmptyName);
        }
        if !watch.watched.is_complete() {
            return Err(WatchError::IncompleteWatchedKey {
                name: watch.name,
                watched: watch.watched,
            });
        }
        if !watch.watcher.is_complete() {
            return Err(WatchError::IncompleteWatcherKey {
                name: watch.name,
                watcher: watch.watcher,
            });
        }

        debug!(
            kind = %self.kind,
            name = %watch.name,
            watched = %watch.watched,
            watcher = %watch.watcher,
            "Registering dynamic watch"
        );
        self.handlers.insert(watch.name.clone(), watch);
        Ok(())
    }

    /// Drop the watch with the given name; returns whether one was registered
    pub fn remove_handler_for_key(&self, name: &str) -> bool {
        let removed = self.handlers.remove(name).is_some();
        if removed {
            debug!(kind = %self.kind, name = %name, "Removed dynamic watch");
        }
        removed
    }

    /// Keys to re-queue after `watched` changed, sorted and de-duplicated
    pub fn watchers_for(&self, watched: &NamespacedName) -> Vec<NamespacedName> {
        let mut watchers: Vec<_> = self
            .handlers
            .iter()
            .filter(|entry| &entry.value().watched == watched)
            .map(|entry| entry.value().watcher.clone())
            .collect();
        watchers.sort();
        watchers.dedup();
        watchers
    }

    pub fn get(&self, name: &str) -> Option<NamedWatch> {
        self.handlers.get(name).map(|w| w.clone())
    }

    /// Snapshot of all registrations ordered by name
    pub fn registrations(&self) -> Vec<NamedWatch> {
        let mut all: Vec<_> = self.handlers.iter().map(|w| w.value().clone()).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Registries for every kind an association can reference
#[derive(Debug)]
pub struct DynamicWatches {
    pub elasticsearch: DynamicEnqueue,
    pub kibana: DynamicEnqueue,
}

impl DynamicWatches {
    pub fn new() -> Self {
        Self {
            elasticsearch: DynamicEnqueue::new(ResourceKind::Elasticsearch),
            kibana: DynamicEnqueue::new(ResourceKind::Kibana),
        }
    }

    pub fn for_kind(&self, kind: ResourceKind) -> Option<&DynamicEnqueue> {
        match kind {
            ResourceKind::Elasticsearch => Some(&self.elasticsearch),
            ResourceKind::Kibana => Some(&self.kibana),
            ResourceKind::Association | ResourceKind::Secret => None,
        }
    }

    /// Total number of registrations across kinds
    pub fn len(&self) -> usize {
        self.elasticsearch.len() + self.kibana.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DynamicWatches {
    fn default() -> Self {
        Self::new()
    }
}
