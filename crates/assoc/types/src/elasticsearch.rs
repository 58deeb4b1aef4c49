//! Elasticsearch clusters (the provider side)

use crate::{ObjectMeta, Resource, ResourceKind};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Elasticsearch {
    pub meta: ObjectMeta,
    #[serde(default)]
    pub spec: ElasticsearchSpec,
}

impl Elasticsearch {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            meta: ObjectMeta::new(namespace, name),
            spec: ElasticsearchSpec::default(),
        }
    }
}

impl Resource for Elasticsearch {
    const KIND: ResourceKind = ResourceKind::Elasticsearch;

    fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.meta
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElasticsearchSpec {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub node_count: u32,
}
