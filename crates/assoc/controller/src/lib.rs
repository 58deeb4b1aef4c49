//! Association controller library
//!
//! This module provides the core components of the association controller:
//! - Resource store seam and in-memory store
//! - Finalizer handling
//! - Requeue policy
//! - Reconciler, work queue and dispatch loop

pub mod config;
pub mod controller;
pub mod error;
pub mod finalizer;
pub mod queue;
pub mod reconciler;
pub mod requeue;
pub mod seed;
pub mod store;

pub use config::AssocConfig;
pub use controller::Controller;
pub use error::{ControllerError, FinalizerError, ReconcileError, StoreError};
pub use finalizer::{Finalizer, FinalizerHandler};
pub use reconciler::{AssociationReconciler, ReconcileOutcome, WATCH_FINALIZER};
pub use requeue::{result_from_status, ReconcileResult};
pub use store::{DynStore, InMemoryStore, ResourceStore};
