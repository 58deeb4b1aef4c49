//! Kibana instances (the consumer side) and the backend configuration they embed

use crate::{ObjectMeta, Resource, ResourceKind};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Kibana {
    pub meta: ObjectMeta,
    #[serde(default)]
    pub spec: KibanaSpec,
}

impl Kibana {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            meta: ObjectMeta::new(namespace, name),
            spec: KibanaSpec::default(),
        }
    }
}

impl Resource for Kibana {
    const KIND: ResourceKind = ResourceKind::Kibana;

    fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.meta
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KibanaSpec {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub node_count: u32,

    /// Backend connection settings, owned by the association controller
    #[serde(default)]
    pub elasticsearch: BackendElasticsearch,
}

/// Connection settings Kibana uses to reach its Elasticsearch backend
///
/// Derived from the associated cluster on every reconcile and compared
/// field-by-field against what Kibana currently holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendElasticsearch {
    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub auth: ElasticsearchAuth,

    /// Name of the secret holding the cluster's public CA certificate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert_secret: Option<String>,
}

impl BackendElasticsearch {
    /// Nothing configured yet
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElasticsearchAuth {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline: Option<ElasticsearchInlineAuth>,
}

#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElasticsearchInlineAuth {
    pub username: String,
    pub password: String,
}

// Keep passwords out of logs
impl std::fmt::Debug for ElasticsearchInlineAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElasticsearchInlineAuth")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_equality_is_structural() {
        let a = BackendElasticsearch {
            url: "https://es1-es-public.ns.svc.cluster.local:9200".to_string(),
            auth: ElasticsearchAuth {
                inline: Some(ElasticsearchInlineAuth {
                    username: "u".to_string(),
                    password: "p".to_string(),
                }),
            },
            ca_cert_secret: Some("es1".to_string()),
        };
        let mut b = a.clone();
        assert_eq!(a, b);

        b.auth.inline.as_mut().unwrap().password = "q".to_string();
        assert_ne!(a, b);
        assert!(!a.is_empty());
        assert!(BackendElasticsearch::default().is_empty());
    }

    #[test]
    fn test_password_redacted_in_debug() {
        let auth = ElasticsearchInlineAuth {
            username: "u".to_string(),
            password: "hunter2".to_string(),
        };
        let rendered = format!("{:?}", auth);
        assert!(rendered.contains("u"));
        assert!(!rendered.contains("hunter2"));
    }
}
