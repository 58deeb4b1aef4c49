//! Seed fixtures for the in-memory store
//!
//! A JSON document listing resources to load at startup:
//!
//! ```json
//! {
//!   "elasticsearch": [{"meta": {"namespace": "ns", "name": "es1"}}],
//!   "kibana": [{"meta": {"namespace": "ns", "name": "kb1"}}],
//!   "secrets": [{"namespace": "ns", "name": "es1", "string_data": {}}],
//!   "associations": [{
//!     "meta": {"namespace": "ns", "name": "kb1-es1"},
//!     "spec": {
//!       "elasticsearch_ref": {"namespace": "ns", "name": "es1"},
//!       "kibana_ref": {"namespace": "ns", "name": "kb1"}
//!     }
//!   }]
//! }
//! ```

use crate::error::{ControllerError, ControllerResult};
use crate::store::InMemoryStore;
use assoc_types::{Association, Elasticsearch, Kibana, Secret};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Secret with UTF-8 values, for readable fixtures
#[derive(Debug, Clone, Deserialize)]
pub struct SeedSecret {
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub string_data: BTreeMap<String, String>,
}

impl From<SeedSecret> for Secret {
    fn from(seed: SeedSecret) -> Self {
        seed.string_data
            .into_iter()
            .fold(Secret::new(seed.namespace, seed.name), |secret, (k, v)| {
                secret.with_entry(k, v)
            })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedDocument {
    #[serde(default)]
    pub elasticsearch: Vec<Elasticsearch>,
    #[serde(default)]
    pub kibana: Vec<Kibana>,
    #[serde(default)]
    pub secrets: Vec<SeedSecret>,
    #[serde(default)]
    pub associations: Vec<Association>,
}

impl SeedDocument {
    pub fn from_json(json: &str) -> ControllerResult<Self> {
        serde_json::from_str(json).map_err(|e| ControllerError::Seed(e.to_string()))
    }

    pub async fn load(path: &Path) -> ControllerResult<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        Self::from_json(&raw)
    }

    /// Apply every resource to `store`; associations go last
    pub async fn apply(self, store: &InMemoryStore) {
        let counts = (
            self.elasticsearch.len(),
            self.kibana.len(),
            self.secrets.len(),
            self.associations.len(),
        );

        for es in self.elasticsearch {
            store.apply_elasticsearch(es).await;
        }
        for kibana in self.kibana {
            store.apply_kibana(kibana).await;
        }
        for secret in self.secrets {
            store.apply_secret(secret.into()).await;
        }
        for association in self.associations {
            store.apply_association(association).await;
        }

        tracing::info!(
            elasticsearch = counts.0,
            kibana = counts.1,
            secrets = counts.2,
            associations = counts.3,
            "Seeded store"
        );
    }
}
