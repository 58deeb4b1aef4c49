//! In-memory store implementation
//!
//! Behaves like an API server for the handful of kinds the controller uses:
//! resource versions are bumped on every write, deletion of an association
//! that still carries finalizers only sets a tombstone, and every change is
//! broadcast to subscribers. One-shot faults can be injected per operation to
//! simulate API failures.

use super::traits::*;
use crate::error::{StoreError, StoreResult};
use assoc_types::{
    Association, Elasticsearch, Kibana, NamespacedName, ObjectMeta, Resource, ResourceKind, Secret,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{broadcast, Mutex, RwLock};
use uuid::Uuid;

const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Store operations that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    GetAssociation,
    UpdateAssociation,
    UpdateAssociationStatus,
    GetElasticsearch,
    GetKibana,
    UpdateKibana,
    GetSecret,
}

/// Number of successful controller-side writes per operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStats {
    pub association_updates: u64,
    pub status_updates: u64,
    pub kibana_updates: u64,
}

/// One kind of resource, keyed by namespace/name
struct Table<R> {
    items: RwLock<HashMap<NamespacedName, R>>,
}

impl<R: Resource> Table<R> {
    fn new() -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
        }
    }

    async fn get(&self, key: &NamespacedName) -> StoreResult<R> {
        let items = self.items.read().await;
        items
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::not_found(R::KIND, key))
    }

    async fn list(&self) -> Vec<R> {
        let items = self.items.read().await;
        items.values().cloned().collect()
    }

    /// Create or replace, as an external actor would
    ///
    /// Replacing an existing object keeps the fields the controller owns.
    async fn apply(&self, mut resource: R) -> R {
        let mut items = self.items.write().await;
        let key = resource.key();
        let (uid, version, tombstone) = match items.get(&key) {
            Some(existing) => {
                resource.retain_owned_fields(existing);
                (
                    existing.meta().uid,
                    existing.meta().resource_version,
                    existing.meta().deletion_timestamp,
                )
            }
            None => (Some(Uuid::new_v4()), 0, None),
        };

        let meta = resource.meta_mut();
        meta.uid = uid;
        meta.resource_version = version + 1;
        if meta.deletion_timestamp.is_none() {
            meta.deletion_timestamp = tombstone;
        }
        items.insert(key, resource.clone());
        resource
    }

    /// Controller-side write with an optimistic concurrency check
    ///
    /// Removes the resource once it is tombstoned and has no finalizers left.
    async fn update<F>(&self, incoming: &R, merge: F) -> StoreResult<(R, EventAction)>
    where
        F: FnOnce(&mut R, &R),
    {
        let key = incoming.key();
        let mut items = self.items.write().await;
        let stored = items
            .get_mut(&key)
            .ok_or_else(|| StoreError::not_found(R::KIND, &key))?;

        let current = stored.meta().resource_version;
        let expected = incoming.meta().resource_version;
        if expected != 0 && expected != current {
            return Err(StoreError::Conflict {
                kind: R::KIND,
                key,
                current,
                expected,
            });
        }

        merge(stored, incoming);
        stored.meta_mut().resource_version = current + 1;
        let updated = stored.clone();

        if updated.meta().is_being_deleted() && updated.meta().finalizers.is_empty() {
            items.remove(&key);
            return Ok((updated, EventAction::Deleted));
        }
        Ok((updated, EventAction::Applied))
    }

    async fn remove(&self, key: &NamespacedName) -> Option<R> {
        self.items.write().await.remove(key)
    }
}

/// Metadata fields a client write may change; identity and tombstone stay
fn merge_meta(stored: &mut ObjectMeta, incoming: &ObjectMeta) {
    stored.annotations = incoming.annotations.clone();
    stored.finalizers = incoming.finalizers.clone();
}

/// In-memory store for development and testing
pub struct InMemoryStore {
    associations: Table<Association>,
    elasticsearches: Table<Elasticsearch>,
    kibanas: Table<Kibana>,
    secrets: Table<Secret>,
    events: broadcast::Sender<ResourceEvent>,
    faults: Mutex<HashMap<StoreOp, StoreError>>,
    association_updates: AtomicU64,
    status_updates: AtomicU64,
    kibana_updates: AtomicU64,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self::with_event_capacity(DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_event_capacity(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            associations: Table::new(),
            elasticsearches: Table::new(),
            kibanas: Table::new(),
            secrets: Table::new(),
            events,
            faults: Mutex::new(HashMap::new()),
            association_updates: AtomicU64::new(0),
            status_updates: AtomicU64::new(0),
            kibana_updates: AtomicU64::new(0),
        }
    }

    fn emit(&self, kind: ResourceKind, key: NamespacedName, action: EventAction) {
        // No subscribers is fine
        let _ = self.events.send(ResourceEvent { kind, key, action });
    }

    /// Make the next call of `op` fail with `error`
    pub async fn inject_fault(&self, op: StoreOp, error: StoreError) {
        self.faults.lock().await.insert(op, error);
    }

    async fn take_fault(&self, op: StoreOp) -> StoreResult<()> {
        match self.faults.lock().await.remove(&op) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn write_stats(&self) -> WriteStats {
        WriteStats {
            association_updates: self.association_updates.load(Ordering::SeqCst),
            status_updates: self.status_updates.load(Ordering::SeqCst),
            kibana_updates: self.kibana_updates.load(Ordering::SeqCst),
        }
    }

    pub async fn apply_association(&self, association: Association) -> Association {
        let stored = self.associations.apply(association).await;
        self.emit(ResourceKind::Association, stored.key(), EventAction::Applied);
        stored
    }

    pub async fn apply_elasticsearch(&self, es: Elasticsearch) -> Elasticsearch {
        let stored = self.elasticsearches.apply(es).await;
        self.emit(ResourceKind::Elasticsearch, stored.key(), EventAction::Applied);
        stored
    }

    pub async fn apply_kibana(&self, kibana: Kibana) -> Kibana {
        let stored = self.kibanas.apply(kibana).await;
        self.emit(ResourceKind::Kibana, stored.key(), EventAction::Applied);
        stored
    }

    pub async fn apply_secret(&self, secret: Secret) -> Secret {
        let stored = self.secrets.apply(secret).await;
        self.emit(ResourceKind::Secret, stored.key(), EventAction::Applied);
        stored
    }

    /// Request deletion of an association
    ///
    /// With finalizers present only the tombstone is set; the record is
    /// removed once the last finalizer is cleared.
    pub async fn delete_association(&self, key: &NamespacedName) -> StoreResult<()> {
        let action = {
            let mut items = self.associations.items.write().await;
            let stored = items
                .get_mut(key)
                .ok_or_else(|| StoreError::not_found(ResourceKind::Association, key))?;

            if stored.meta.finalizers.is_empty() {
                items.remove(key);
                EventAction::Deleted
            } else {
                if stored.meta.deletion_timestamp.is_none() {
                    stored.meta.deletion_timestamp = Some(chrono::Utc::now());
                    stored.meta.resource_version += 1;
                }
                EventAction::Applied
            }
        };
        self.emit(ResourceKind::Association, key.clone(), action);
        Ok(())
    }

    pub async fn delete_elasticsearch(&self, key: &NamespacedName) -> bool {
        let removed = self.elasticsearches.remove(key).await.is_some();
        if removed {
            self.emit(ResourceKind::Elasticsearch, key.clone(), EventAction::Deleted);
        }
        removed
    }

    pub async fn delete_kibana(&self, key: &NamespacedName) -> bool {
        let removed = self.kibanas.remove(key).await.is_some();
        if removed {
            self.emit(ResourceKind::Kibana, key.clone(), EventAction::Deleted);
        }
        removed
    }

    pub async fn delete_secret(&self, key: &NamespacedName) -> bool {
        let removed = self.secrets.remove(key).await.is_some();
        if removed {
            self.emit(ResourceKind::Secret, key.clone(), EventAction::Deleted);
        }
        removed
    }
}

#[async_trait]
impl ResourceStore for InMemoryStore {
    async fn get_association(&self, key: &NamespacedName) -> StoreResult<Association> {
        self.take_fault(StoreOp::GetAssociation).await?;
        self.associations.get(key).await
    }

    async fn list_associations(&self) -> StoreResult<Vec<Association>> {
        Ok(self.associations.list().await)
    }

    async fn update_association(&self, association: &Association) -> StoreResult<Association> {
        self.take_fault(StoreOp::UpdateAssociation).await?;
        let (updated, action) = self
            .associations
            .update(association, |stored, incoming| {
                merge_meta(&mut stored.meta, &incoming.meta);
                stored.spec = incoming.spec.clone();
            })
            .await?;
        self.association_updates.fetch_add(1, Ordering::SeqCst);
        self.emit(ResourceKind::Association, updated.key(), action);
        Ok(updated)
    }

    async fn update_association_status(
        &self,
        association: &Association,
    ) -> StoreResult<Association> {
        self.take_fault(StoreOp::UpdateAssociationStatus).await?;
        let (updated, action) = self
            .associations
            .update(association, |stored, incoming| {
                stored.status = incoming.status;
            })
            .await?;
        self.status_updates.fetch_add(1, Ordering::SeqCst);
        self.emit(ResourceKind::Association, updated.key(), action);
        Ok(updated)
    }

    async fn get_elasticsearch(&self, key: &NamespacedName) -> StoreResult<Elasticsearch> {
        self.take_fault(StoreOp::GetElasticsearch).await?;
        self.elasticsearches.get(key).await
    }

    async fn get_kibana(&self, key: &NamespacedName) -> StoreResult<Kibana> {
        self.take_fault(StoreOp::GetKibana).await?;
        self.kibanas.get(key).await
    }

    async fn update_kibana(&self, kibana: &Kibana) -> StoreResult<Kibana> {
        self.take_fault(StoreOp::UpdateKibana).await?;
        let (updated, action) = self
            .kibanas
            .update(kibana, |stored, incoming| {
                merge_meta(&mut stored.meta, &incoming.meta);
                stored.spec = incoming.spec.clone();
            })
            .await?;
        self.kibana_updates.fetch_add(1, Ordering::SeqCst);
        self.emit(ResourceKind::Kibana, updated.key(), action);
        Ok(updated)
    }

    async fn get_secret(&self, key: &NamespacedName) -> StoreResult<Secret> {
        self.take_fault(StoreOp::GetSecret).await?;
        self.secrets.get(key).await
    }

    fn subscribe(&self) -> broadcast::Receiver<ResourceEvent> {
        self.events.subscribe()
    }
}
