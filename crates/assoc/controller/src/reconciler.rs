//! Association reconciler
//!
//! Each invocation fetches one association, keeps its dynamic watches and
//! finalizer in place, pushes the backend configuration derived from the
//! Elasticsearch cluster into the Kibana spec, persists the resulting status
//! when it changed and returns the scheduling decision for the key.

use crate::error::ReconcileError;
use crate::finalizer::{Finalizer, FinalizerHandler};
use crate::requeue::{default_requeue, pause_requeue, result_from_status, ReconcileResult};
use crate::store::DynStore;
use assoc_types::naming::{
    external_service_url, internal_users_secret_key, public_ca_secret_key, INTERNAL_KIBANA_USER,
};
use assoc_types::{
    Association, AssociationStatus, BackendElasticsearch, Elasticsearch, ElasticsearchAuth,
    ElasticsearchInlineAuth, NamespacedName,
};
use assoc_watches::{watch_name, DynamicWatches, NamedWatch};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Finalizer removing the dynamic watches of a deleted association
pub const WATCH_FINALIZER: &str = "dynamic-watches";

pub fn elasticsearch_watch_name(association: &NamespacedName) -> String {
    watch_name(association, "es")
}

pub fn kibana_watch_name(association: &NamespacedName) -> String {
    watch_name(association, "kb")
}

/// Drops the watches registered for `association`; safe to run repeatedly
pub fn watch_finalizer(association: NamespacedName, watches: Arc<DynamicWatches>) -> Finalizer {
    Finalizer::new(WATCH_FINALIZER, move || {
        watches
            .kibana
            .remove_handler_for_key(&kibana_watch_name(&association));
        watches
            .elasticsearch
            .remove_handler_for_key(&elasticsearch_watch_name(&association));
        Ok(())
    })
}

/// Scheduling decision plus the error, if any, that accompanied it
#[derive(Debug)]
pub struct ReconcileOutcome {
    pub result: ReconcileResult,
    pub error: Option<ReconcileError>,
}

impl ReconcileOutcome {
    pub fn ok(result: ReconcileResult) -> Self {
        Self {
            result,
            error: None,
        }
    }

    pub fn failed(result: ReconcileResult, error: impl Into<ReconcileError>) -> Self {
        Self {
            result,
            error: Some(error.into()),
        }
    }

    pub fn into_result(self) -> Result<ReconcileResult, ReconcileError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.result),
        }
    }
}

/// Reconciles Elasticsearch/Kibana associations
pub struct AssociationReconciler {
    store: DynStore,
    watches: Arc<DynamicWatches>,
    /// Number of reconcile invocations so far
    iteration: AtomicU64,
}

impl AssociationReconciler {
    pub fn new(store: DynStore, watches: Arc<DynamicWatches>) -> Self {
        Self {
            store,
            watches,
            iteration: AtomicU64::new(0),
        }
    }

    pub fn watches(&self) -> &Arc<DynamicWatches> {
        &self.watches
    }

    pub fn iterations(&self) -> u64 {
        self.iteration.load(Ordering::SeqCst)
    }

    /// Reconcile the association stored under `key`
    pub async fn reconcile(&self, key: &NamespacedName) -> ReconcileOutcome {
        let iteration = self.iteration.fetch_add(1, Ordering::SeqCst) + 1;
        let started = Instant::now();
        info!(iteration, association = %key, "Start reconcile iteration");

        let outcome = self.reconcile_association(key, iteration).await;

        info!(
            iteration,
            association = %key,
            took_ms = started.elapsed().as_millis() as u64,
            "End reconcile iteration"
        );
        outcome
    }

    async fn reconcile_association(
        &self,
        key: &NamespacedName,
        iteration: u64,
    ) -> ReconcileOutcome {
        let mut association = match self.store.get_association(key).await {
            Ok(association) => association,
            // Already gone, nothing left to clean up
            Err(err) if err.is_not_found() => return ReconcileOutcome::ok(ReconcileResult::done()),
            Err(err) => return ReconcileOutcome::failed(ReconcileResult::done(), err),
        };

        if association.meta.is_paused() {
            info!(iteration, association = %key, "Paused: skipping reconciliation");
            return ReconcileOutcome::ok(pause_requeue());
        }

        let handler = FinalizerHandler::new(self.store.clone());
        let finalizers = [watch_finalizer(key.clone(), self.watches.clone())];
        if let Err(err) = handler.handle(&mut association, &finalizers).await {
            // failed to register or run the finalizer: retry
            return ReconcileOutcome::failed(default_requeue(), err);
        }

        // The finalizer path owns cleanup of deleted associations
        if association.meta.is_being_deleted() {
            return ReconcileOutcome::ok(ReconcileResult::done());
        }

        let (new_status, error) = self.reconcile_status(&association).await;

        if association.status != new_status {
            info!(
                association = %key,
                from = %association.status,
                to = %new_status,
                "Updating association status"
            );
            let mut updated = association.clone();
            updated.status = new_status;
            if let Err(err) = self.store.update_association_status(&updated).await {
                if let Some(cause) = &error {
                    warn!(
                        association = %key,
                        error = %cause,
                        "Reconcile error superseded by status update failure"
                    );
                }
                return ReconcileOutcome::failed(default_requeue(), err);
            }
        }

        ReconcileOutcome {
            result: result_from_status(new_status),
            error,
        }
    }

    /// Compute the association status, applying the Kibana update if needed
    async fn reconcile_status(
        &self,
        association: &Association,
    ) -> (AssociationStatus, Option<ReconcileError>) {
        let assoc_key = association.meta.key();
        let es_ref = &association.spec.elasticsearch_ref;
        let kb_ref = &association.spec.kibana_ref;

        // Get notified when either side changes
        let registered = self
            .watches
            .elasticsearch
            .add_handler(NamedWatch {
                name: elasticsearch_watch_name(&assoc_key),
                watched: es_ref.clone(),
                watcher: assoc_key.clone(),
            })
            .and_then(|_| {
                self.watches.kibana.add_handler(NamedWatch {
                    name: kibana_watch_name(&assoc_key),
                    watched: kb_ref.clone(),
                    watcher: assoc_key.clone(),
                })
            });
        if let Err(err) = registered {
            return (AssociationStatus::Failed, Some(err.into()));
        }

        let es = match self.store.get_elasticsearch(es_ref).await {
            Ok(es) => es,
            Err(err) if err.is_not_found() => {
                // Not created yet or deleted; check again later
                debug!(
                    association = %assoc_key,
                    elasticsearch = %es_ref,
                    "Elasticsearch not found"
                );
                return (AssociationStatus::Pending, None);
            }
            Err(err) => return (AssociationStatus::Failed, Some(err.into())),
        };

        let expected = match self.expected_backend(&es).await {
            Ok(expected) => expected,
            Err(err) => return (dependency_status(&err), Some(err)),
        };

        let mut kibana = match self.store.get_kibana(kb_ref).await {
            Ok(kibana) => kibana,
            Err(err) => {
                let err = ReconcileError::from(err);
                return (dependency_status(&err), Some(err));
            }
        };

        if kibana.spec.elasticsearch == expected {
            return (AssociationStatus::Established, None);
        }

        info!(
            association = %assoc_key,
            kibana = %kb_ref,
            "Updating Kibana spec with Elasticsearch backend configuration"
        );
        kibana.spec.elasticsearch = expected;
        if let Err(err) = self.store.update_kibana(&kibana).await {
            return (AssociationStatus::Pending, Some(err.into()));
        }
        (AssociationStatus::Established, None)
    }

    /// Backend configuration Kibana should carry for `es`
    async fn expected_backend(
        &self,
        es: &Elasticsearch,
    ) -> Result<BackendElasticsearch, ReconcileError> {
        let users_key = internal_users_secret_key(es);
        let users = self.store.get_secret(&users_key).await?;
        let password = users
            .get_str(INTERNAL_KIBANA_USER)
            .ok_or_else(|| ReconcileError::MissingCredential {
                secret: users_key.clone(),
                entry: INTERNAL_KIBANA_USER.to_string(),
            })?
            .into_owned();

        let ca = self.store.get_secret(&public_ca_secret_key(es)).await?;

        Ok(BackendElasticsearch {
            url: external_service_url(es),
            auth: ElasticsearchAuth {
                inline: Some(ElasticsearchInlineAuth {
                    username: INTERNAL_KIBANA_USER.to_string(),
                    password,
                }),
            },
            ca_cert_secret: Some(ca.meta.name),
        })
    }
}

/// Missing dependencies are expected to show up; anything else is a failure
fn dependency_status(err: &ReconcileError) -> AssociationStatus {
    if err.is_not_found() {
        AssociationStatus::Pending
    } else {
        AssociationStatus::Failed
    }
}
