//! Association Types - Core types for the association controller
//!
//! An association links a *provider* (an Elasticsearch cluster) to a
//! *consumer* (a Kibana instance). The controller keeps the Kibana spec
//! populated with the backend configuration derived from the cluster.
//!
//! ## Key Concepts
//!
//! - **NamespacedName**: Identity of every stored resource
//! - **ObjectMeta**: Versioning, annotations, finalizers and deletion tombstone
//! - **Association**: Provider/consumer references plus the derived status
//! - **BackendElasticsearch**: The configuration embedded into Kibana
//! - **Secret**: Opaque credential and trust material

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod association;
pub mod elasticsearch;
pub mod ids;
pub mod kibana;
pub mod meta;
pub mod naming;
pub mod secret;

// Re-export main types
pub use association::{Association, AssociationSpec, AssociationStatus};
pub use elasticsearch::{Elasticsearch, ElasticsearchSpec};
pub use ids::{NamespacedName, ParseKeyError};
pub use kibana::{
    BackendElasticsearch, ElasticsearchAuth, ElasticsearchInlineAuth, Kibana, KibanaSpec,
};
pub use meta::{ObjectMeta, Resource, ResourceKind};
pub use secret::Secret;
