//! Object metadata shared by all stored resources

use crate::NamespacedName;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Annotation that suspends reconciliation of a resource when set to `"true"`
pub const PAUSE_ANNOTATION: &str = "common.k8s.elastic.co/pause";

/// Metadata carried by every stored resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub namespace: String,
    pub name: String,

    /// Assigned by the store on creation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<Uuid>,

    /// Bumped by the store on every write; 0 means "not yet stored"
    #[serde(default)]
    pub resource_version: u64,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    /// Pending cleanup obligations blocking physical removal
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub finalizers: Vec<String>,

    /// Tombstone set when deletion was requested while finalizers remained
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<chrono::DateTime<chrono::Utc>>,
}

impl ObjectMeta {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn key(&self) -> NamespacedName {
        NamespacedName::new(self.namespace.clone(), self.name.clone())
    }

    pub fn is_paused(&self) -> bool {
        self.annotations
            .get(PAUSE_ANNOTATION)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }

    pub fn is_being_deleted(&self) -> bool {
        self.deletion_timestamp.is_some()
    }

    pub fn has_finalizer(&self, name: &str) -> bool {
        self.finalizers.iter().any(|f| f == name)
    }

    /// Returns true if the finalizer was not present yet
    pub fn add_finalizer(&mut self, name: &str) -> bool {
        if self.has_finalizer(name) {
            return false;
        }
        self.finalizers.push(name.to_string());
        true
    }

    /// Returns true if the finalizer was present
    pub fn remove_finalizer(&mut self, name: &str) -> bool {
        let before = self.finalizers.len();
        self.finalizers.retain(|f| f != name);
        before != self.finalizers.len()
    }
}

/// Kinds of resources the controller reads or writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Association,
    Elasticsearch,
    Kibana,
    Secret,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceKind::Association => "association",
            ResourceKind::Elasticsearch => "elasticsearch",
            ResourceKind::Kibana => "kibana",
            ResourceKind::Secret => "secret",
        };
        f.write_str(s)
    }
}

/// A stored resource with metadata
pub trait Resource: Clone + Send + Sync + 'static {
    const KIND: ResourceKind;

    fn meta(&self) -> &ObjectMeta;

    fn meta_mut(&mut self) -> &mut ObjectMeta;

    fn key(&self) -> NamespacedName {
        self.meta().key()
    }

    /// Carry over what an external apply of an existing object must not reset
    fn retain_owned_fields(&mut self, stored: &Self) {
        self.meta_mut().finalizers = stored.meta().finalizers.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pause_annotation() {
        let mut meta = ObjectMeta::new("ns", "a");
        assert!(!meta.is_paused());
        meta.annotations
            .insert(PAUSE_ANNOTATION.to_string(), "True".to_string());
        assert!(meta.is_paused());
        meta.annotations
            .insert(PAUSE_ANNOTATION.to_string(), "no".to_string());
        assert!(!meta.is_paused());
    }

    #[test]
    fn test_finalizer_bookkeeping() {
        let mut meta = ObjectMeta::new("ns", "a");
        assert!(meta.add_finalizer("dynamic-watches"));
        assert!(!meta.add_finalizer("dynamic-watches"));
        assert_eq!(meta.finalizers.len(), 1);
        assert!(meta.remove_finalizer("dynamic-watches"));
        assert!(!meta.remove_finalizer("dynamic-watches"));
        assert!(meta.finalizers.is_empty());
    }
}
