//! Resource store layer for assoc-controller
//!
//! The controller only depends on the [`ResourceStore`] trait. The in-memory
//! implementation backs the daemon and the tests.

mod memory;
mod traits;

pub use memory::{InMemoryStore, StoreOp, WriteStats};
pub use traits::{DynStore, EventAction, ResourceEvent, ResourceStore};
