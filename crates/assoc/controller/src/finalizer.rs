//! Finalizers: exactly-once cleanup before an association is removed
//!
//! The handler runs a two-phase protocol:
//!
//! 1. While the association is live, make sure every finalizer name is
//!    recorded on it, so the store keeps the record around after a delete.
//! 2. Once the association carries a deletion tombstone, run the cleanup of
//!    each finalizer still recorded and then clear its name.
//!
//! A cleanup may run again if clearing the name fails, so cleanups must be
//! idempotent.

use crate::error::FinalizerError;
use crate::store::DynStore;
use assoc_types::Association;
use tracing::info;

type CleanupFn = Box<dyn Fn() -> Result<(), FinalizerError> + Send + Sync>;

/// A named cleanup obligation
pub struct Finalizer {
    pub name: String,
    execute: CleanupFn,
}

impl Finalizer {
    pub fn new<F>(name: impl Into<String>, execute: F) -> Self
    where
        F: Fn() -> Result<(), FinalizerError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            execute: Box::new(execute),
        }
    }

    pub fn execute(&self) -> Result<(), FinalizerError> {
        (self.execute)()
    }
}

impl std::fmt::Debug for Finalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Finalizer").field("name", &self.name).finish()
    }
}

/// Registers and executes finalizers on associations
pub struct FinalizerHandler {
    store: DynStore,
}

impl FinalizerHandler {
    pub fn new(store: DynStore) -> Self {
        Self { store }
    }

    /// Run the finalizer protocol; `association` is refreshed from the store
    /// whenever the finalizer list had to be written
    pub async fn handle(
        &self,
        association: &mut Association,
        finalizers: &[Finalizer],
    ) -> Result<(), FinalizerError> {
        if association.meta.is_being_deleted() {
            self.execute(association, finalizers).await
        } else {
            self.register(association, finalizers).await
        }
    }

    async fn register(
        &self,
        association: &mut Association,
        finalizers: &[Finalizer],
    ) -> Result<(), FinalizerError> {
        let mut added = false;
        for finalizer in finalizers {
            added |= association.meta.add_finalizer(&finalizer.name);
        }
        if added {
            info!(
                association = %association.meta.key(),
                finalizers = ?association.meta.finalizers,
                "Registering finalizers"
            );
            *association = self.store.update_association(association).await?;
        }
        Ok(())
    }

    async fn execute(
        &self,
        association: &mut Association,
        finalizers: &[Finalizer],
    ) -> Result<(), FinalizerError> {
        let mut removed = false;
        for finalizer in finalizers {
            if !association.meta.has_finalizer(&finalizer.name) {
                continue;
            }
            info!(
                association = %association.meta.key(),
                finalizer = %finalizer.name,
                "Executing finalizer"
            );
            finalizer.execute()?;
            association.meta.remove_finalizer(&finalizer.name);
            removed = true;
        }
        if removed {
            *association = self.store.update_association(association).await?;
        }
        Ok(())
    }
}
