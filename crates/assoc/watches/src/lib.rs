//! Association Watches - Dynamic watch registry
//!
//! A sparse subscription index: instead of reacting to every Elasticsearch
//! cluster or Kibana instance, the controller registers a named watch for each
//! resource an association references. When a watched resource changes, the
//! registry yields the association keys that must be reconciled again.
//!
//! Registrations are keyed by name and upserted, so re-registering on every
//! reconcile is free. All operations are safe to call from concurrent
//! reconciles.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod error;
pub mod registry;

pub use error::{Result, WatchError};
pub use registry::{watch_name, DynamicEnqueue, DynamicWatches, NamedWatch};
