//! Well-known names derived from an Elasticsearch cluster

use crate::{Elasticsearch, NamespacedName};

/// Built-in user Kibana authenticates as
pub const INTERNAL_KIBANA_USER: &str = "elastic-internal-kibana";

/// HTTP port of the public service
pub const HTTP_PORT: u16 = 9200;

/// Secret holding the passwords of the cluster's internal users
pub fn internal_users_secret_name(es_name: &str) -> String {
    format!("{}-elastic-internal-users", es_name)
}

pub fn internal_users_secret_key(es: &Elasticsearch) -> NamespacedName {
    NamespacedName::new(
        es.meta.namespace.clone(),
        internal_users_secret_name(&es.meta.name),
    )
}

/// The public CA certificate secret shares the cluster's name
pub fn public_ca_secret_key(es: &Elasticsearch) -> NamespacedName {
    es.meta.key()
}

pub fn public_service_name(es_name: &str) -> String {
    format!("{}-es-public", es_name)
}

pub fn external_service_url(es: &Elasticsearch) -> String {
    format!(
        "https://{}.{}.svc.cluster.local:{}",
        public_service_name(&es.meta.name),
        es.meta.namespace,
        HTTP_PORT
    )
}
