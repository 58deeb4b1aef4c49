//! Opaque credential and trust material

use crate::{ObjectMeta, Resource, ResourceKind};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret {
    pub meta: ObjectMeta,
    #[serde(default)]
    pub data: BTreeMap<String, Vec<u8>>,
}

impl Secret {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            meta: ObjectMeta::new(namespace, name),
            data: BTreeMap::new(),
        }
    }

    pub fn with_entry(mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Value of `key` as text; invalid UTF-8 sequences are replaced
    pub fn get_str(&self, key: &str) -> Option<Cow<'_, str>> {
        self.data.get(key).map(|v| String::from_utf8_lossy(v))
    }
}

impl Resource for Secret {
    const KIND: ResourceKind = ResourceKind::Secret;

    fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.meta
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secret")
            .field("meta", &self.meta)
            .field("keys", &self.data.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_str() {
        let secret = Secret::new("ns", "s")
            .with_entry("user", "u")
            .with_entry("bin", vec![0xff, 0xfe]);
        assert_eq!(secret.get_str("user").as_deref(), Some("u"));
        assert_eq!(secret.get_str("bin").as_deref(), Some("\u{fffd}\u{fffd}"));
        assert_eq!(secret.get_str("missing"), None);
    }
}
