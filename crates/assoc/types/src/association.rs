//! Association records
//!
//! An association is the unit of work for the controller. External actors own
//! its spec; the controller only writes `status` and the finalizer list.

use crate::{NamespacedName, ObjectMeta, Resource, ResourceKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Links one Elasticsearch cluster to one Kibana instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Association {
    pub meta: ObjectMeta,
    pub spec: AssociationSpec,
    #[serde(default)]
    pub status: AssociationStatus,
}

impl Association {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        elasticsearch_ref: NamespacedName,
        kibana_ref: NamespacedName,
    ) -> Self {
        Self {
            meta: ObjectMeta::new(namespace, name),
            spec: AssociationSpec {
                elasticsearch_ref,
                kibana_ref,
            },
            status: AssociationStatus::Unknown,
        }
    }
}

impl Resource for Association {
    const KIND: ResourceKind = ResourceKind::Association;

    fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.meta
    }

    /// Status and finalizers belong to the controller
    fn retain_owned_fields(&mut self, stored: &Self) {
        self.meta.finalizers = stored.meta.finalizers.clone();
        self.status = stored.status;
    }
}

/// References to the provider and the consumer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociationSpec {
    pub elasticsearch_ref: NamespacedName,
    pub kibana_ref: NamespacedName,
}

/// Derived state of an association
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssociationStatus {
    /// Never reconciled
    #[default]
    #[serde(rename = "")]
    Unknown,

    /// Waiting on a dependency that is expected to appear
    Pending,

    /// Kibana carries the desired backend configuration
    Established,

    /// A condition that is unlikely to resolve on its own
    Failed,
}

impl fmt::Display for AssociationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AssociationStatus::Unknown => "",
            AssociationStatus::Pending => "Pending",
            AssociationStatus::Established => "Established",
            AssociationStatus::Failed => "Failed",
        };
        f.write_str(s)
    }
}
