//! Store trait definitions

use crate::error::StoreResult;
use assoc_types::{Association, Elasticsearch, Kibana, NamespacedName, ResourceKind, Secret};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Shared handle to a store implementation
pub type DynStore = Arc<dyn ResourceStore>;

/// What happened to a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventAction {
    /// Created or modified
    Applied,
    /// Physically removed
    Deleted,
}

/// Change notification delivered to subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceEvent {
    pub kind: ResourceKind,
    pub key: NamespacedName,
    pub action: EventAction,
}

/// Read/write access to the resources the controller works with
///
/// Getters return [`StoreError::NotFound`](crate::StoreError::NotFound) for
/// missing resources. Writes carrying a non-zero `resource_version` that no
/// longer matches the stored one fail with a conflict.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn get_association(&self, key: &NamespacedName) -> StoreResult<Association>;

    async fn list_associations(&self) -> StoreResult<Vec<Association>>;

    /// Write metadata and spec; the stored status is kept
    async fn update_association(&self, association: &Association) -> StoreResult<Association>;

    /// Write the status only
    async fn update_association_status(
        &self,
        association: &Association,
    ) -> StoreResult<Association>;

    async fn get_elasticsearch(&self, key: &NamespacedName) -> StoreResult<Elasticsearch>;

    async fn get_kibana(&self, key: &NamespacedName) -> StoreResult<Kibana>;

    async fn update_kibana(&self, kibana: &Kibana) -> StoreResult<Kibana>;

    async fn get_secret(&self, key: &NamespacedName) -> StoreResult<Secret>;

    /// Subscribe to change notifications for all kinds
    fn subscribe(&self) -> broadcast::Receiver<ResourceEvent>;
}
