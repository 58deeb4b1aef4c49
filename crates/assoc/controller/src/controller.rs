//! Dispatch loop
//!
//! Turns store change notifications into association keys, feeds them to a
//! pool of reconcile workers and schedules retries from the returned
//! decisions.

use crate::config::ControllerConfig;
use crate::error::{ControllerResult, ReconcileError, StoreResult};
use crate::queue::WorkQueue;
use crate::reconciler::{AssociationReconciler, ReconcileOutcome};
use crate::requeue::ReconcileResult;
use crate::store::{DynStore, ResourceEvent};
use assoc_types::{NamespacedName, ResourceKind};
use assoc_watches::DynamicWatches;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Association controller
pub struct Controller {
    config: ControllerConfig,
    store: DynStore,
    reconciler: Arc<AssociationReconciler>,
    queue: Arc<WorkQueue>,
}

impl Controller {
    pub fn new(
        config: ControllerConfig,
        store: DynStore,
        watches: Arc<DynamicWatches>,
    ) -> Arc<Self> {
        let reconciler = Arc::new(AssociationReconciler::new(store.clone(), watches));
        let queue = WorkQueue::new(config.backoff());
        Arc::new(Self {
            config,
            store,
            reconciler,
            queue,
        })
    }

    pub fn reconciler(&self) -> &Arc<AssociationReconciler> {
        &self.reconciler
    }

    pub fn queue(&self) -> &Arc<WorkQueue> {
        &self.queue
    }

    /// Run until `shutdown` resolves
    pub async fn run<F>(self: Arc<Self>, shutdown: F) -> ControllerResult<()>
    where
        F: Future<Output = ()>,
    {
        // Subscribe before listing so no change falls in between
        let events = self.store.subscribe();
        self.enqueue_all().await?;

        let event_handle = {
            let controller = self.clone();
            tokio::spawn(async move { controller.watch_events(events).await })
        };

        let workers = self.config.max_concurrent_reconciles.max(1);
        let worker_handles: Vec<JoinHandle<()>> = (0..workers)
            .map(|id| {
                let controller = self.clone();
                tokio::spawn(async move { controller.worker(id).await })
            })
            .collect();

        tracing::info!(workers, "Association controller started");

        shutdown.await;

        tracing::info!("Association controller shutting down");
        event_handle.abort();
        self.queue.shut_down().await;
        for handle in worker_handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Reconcile worker panicked");
            }
        }

        tracing::info!("Association controller stopped");
        Ok(())
    }

    /// Queue every stored association
    pub async fn enqueue_all(&self) -> StoreResult<()> {
        let associations = self.store.list_associations().await?;
        tracing::debug!(count = associations.len(), "Enqueueing all associations");
        for association in associations {
            self.queue.add(association.meta.key()).await;
        }
        Ok(())
    }

    async fn watch_events(&self, mut events: broadcast::Receiver<ResourceEvent>) {
        loop {
            match events.recv().await {
                Ok(event) => self.handle_event(&event).await,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(lagged = n, "Event stream lagged, resyncing all associations");
                    if let Err(e) = self.enqueue_all().await {
                        tracing::error!(error = %e, "Resync failed");
                    }
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    /// Map a change notification to the association keys it affects
    pub async fn handle_event(&self, event: &ResourceEvent) {
        match event.kind {
            ResourceKind::Association => self.queue.add(event.key.clone()).await,
            ResourceKind::Elasticsearch | ResourceKind::Kibana => {
                let Some(registry) = self.reconciler.watches().for_kind(event.kind) else {
                    return;
                };
                for watcher in registry.watchers_for(&event.key) {
                    tracing::debug!(
                        kind = %event.kind,
                        watched = %event.key,
                        association = %watcher,
                        "Watched resource changed"
                    );
                    self.queue.add(watcher).await;
                }
            }
            ResourceKind::Secret => {}
        }
    }

    async fn worker(&self, id: usize) {
        tracing::debug!(worker = id, "Reconcile worker started");
        while self.process_next().await {}
        tracing::debug!(worker = id, "Reconcile worker stopped");
    }

    /// Reconcile the next queued key; returns false once the queue is shut down
    pub async fn process_next(&self) -> bool {
        let Some(key) = self.queue.get().await else {
            return false;
        };

        let outcome = self.reconcile_with_deadline(&key).await;
        self.schedule(&key, outcome).await;
        self.queue.done(&key).await;
        true
    }

    /// Reconcile `key`, dropping the in-flight work once the deadline passes
    pub async fn reconcile_with_deadline(&self, key: &NamespacedName) -> ReconcileOutcome {
        let timeout = self.config.reconcile_timeout();
        match tokio::time::timeout(timeout, self.reconciler.reconcile(key)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                ReconcileOutcome::failed(ReconcileResult::done(), ReconcileError::Timeout(timeout))
            }
        }
    }

    async fn schedule(&self, key: &NamespacedName, outcome: ReconcileOutcome) {
        if let Some(err) = outcome.error {
            tracing::warn!(
                association = %key,
                error = %err,
                "Reconcile failed, retrying with backoff"
            );
            self.queue.add_rate_limited(key.clone()).await;
            return;
        }

        self.queue.forget(key).await;
        match outcome.result {
            ReconcileResult {
                requeue_after: Some(delay),
                ..
            } => self.queue.add_after(key.clone(), delay),
            ReconcileResult { requeue: true, .. } => self.queue.add_rate_limited(key.clone()).await,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{EventAction, InMemoryStore, ResourceStore};
    use assoc_types::{Association, AssociationStatus, Elasticsearch, Kibana, Secret};

    fn association(name: &str) -> Association {
        Association::new(
            "ns",
            name,
            NamespacedName::new("ns", "es1"),
            NamespacedName::new("ns", "kb1"),
        )
    }

    fn controller(store: Arc<InMemoryStore>) -> Arc<Controller> {
        Controller::new(
            ControllerConfig::default(),
            store,
            Arc::new(DynamicWatches::new()),
        )
    }

    #[tokio::test]
    async fn test_enqueue_all() {
        let store = Arc::new(InMemoryStore::new());
        store.apply_association(association("a")).await;
        store.apply_association(association("b")).await;

        let controller = controller(store);
        controller.enqueue_all().await.unwrap();
        assert_eq!(controller.queue().len().await, 2);
    }

    #[tokio::test]
    async fn test_provider_event_requeues_watchers() {
        let store = Arc::new(InMemoryStore::new());
        store.apply_association(association("a")).await;
        let controller = controller(store.clone());

        controller.enqueue_all().await.unwrap();
        assert!(controller.process_next().await);
        assert!(controller.queue().is_empty().await);

        controller
            .handle_event(&ResourceEvent {
                kind: ResourceKind::Elasticsearch,
                key: NamespacedName::new("ns", "es1"),
                action: EventAction::Applied,
            })
            .await;
        assert_eq!(controller.queue().len().await, 1);

        controller
            .handle_event(&ResourceEvent {
                kind: ResourceKind::Kibana,
                key: NamespacedName::new("ns", "unrelated"),
                action: EventAction::Applied,
            })
            .await;
        assert_eq!(controller.queue().len().await, 1);
    }

    #[tokio::test]
    async fn test_secret_events_ignored() {
        let store = Arc::new(InMemoryStore::new());
        let controller = controller(store);
        controller
            .handle_event(&ResourceEvent {
                kind: ResourceKind::Secret,
                key: NamespacedName::new("ns", "es1"),
                action: EventAction::Applied,
            })
            .await;
        assert!(controller.queue().is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_is_requeued_after_interval() {
        let store = Arc::new(InMemoryStore::new());
        let key = store.apply_association(association("a")).await.meta.key();
        let controller = controller(store.clone());

        controller.queue().add(key.clone()).await;
        assert!(controller.process_next().await);
        assert_eq!(
            store.get_association(&key).await.unwrap().status,
            AssociationStatus::Pending
        );
        assert!(controller.queue().is_empty().await);

        tokio::time::sleep(std::time::Duration::from_secs(11)).await;
        assert_eq!(controller.queue().len().await, 1);
    }

    /// Store whose provider lookups outlast the reconcile deadline
    struct SlowStore {
        inner: Arc<InMemoryStore>,
        delay: std::time::Duration,
    }

    #[async_trait::async_trait]
    impl ResourceStore for SlowStore {
        async fn get_association(&self, key: &NamespacedName) -> StoreResult<Association> {
            self.inner.get_association(key).await
        }

        async fn list_associations(&self) -> StoreResult<Vec<Association>> {
            self.inner.list_associations().await
        }

        async fn update_association(&self, association: &Association) -> StoreResult<Association> {
            self.inner.update_association(association).await
        }

        async fn update_association_status(
            &self,
            association: &Association,
        ) -> StoreResult<Association> {
            self.inner.update_association_status(association).await
        }

        async fn get_elasticsearch(&self, key: &NamespacedName) -> StoreResult<Elasticsearch> {
            tokio::time::sleep(self.delay).await;
            self.inner.get_elasticsearch(key).await
        }

        async fn get_kibana(&self, key: &NamespacedName) -> StoreResult<Kibana> {
            self.inner.get_kibana(key).await
        }

        async fn update_kibana(&self, kibana: &Kibana) -> StoreResult<Kibana> {
            self.inner.update_kibana(kibana).await
        }

        async fn get_secret(&self, key: &NamespacedName) -> StoreResult<Secret> {
            self.inner.get_secret(key).await
        }

        fn subscribe(&self) -> broadcast::Receiver<ResourceEvent> {
            self.inner.subscribe()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_cancels_reconcile_and_backs_off() {
        let inner = Arc::new(InMemoryStore::new());
        let key = inner.apply_association(association("a")).await.meta.key();
        let config = ControllerConfig {
            reconcile_timeout_secs: 1,
            ..ControllerConfig::default()
        };
        let store = Arc::new(SlowStore {
            inner: inner.clone(),
            delay: std::time::Duration::from_secs(5),
        });
        let controller = Controller::new(config, store, Arc::new(DynamicWatches::new()));

        let outcome = controller.reconcile_with_deadline(&key).await;
        assert!(matches!(outcome.error, Some(ReconcileError::Timeout(d)) if d.as_secs() == 1));

        controller.queue().add(key.clone()).await;
        assert!(controller.process_next().await);
        assert_eq!(controller.queue().num_requeues(&key).await, 1);

        // Cancelled before a status was computed
        assert_eq!(inner.write_stats().status_updates, 0);
        assert_eq!(
            inner.get_association(&key).await.unwrap().status,
            AssociationStatus::Unknown
        );
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let store = Arc::new(InMemoryStore::new());
        store.apply_association(association("a")).await;
        let controller = controller(store.clone());

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(controller.clone().run(async {
            let _ = rx.await;
        }));

        for _ in 0..100 {
            if controller.reconciler().iterations() > 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
        assert!(controller.reconciler().iterations() > 0);
    }
}
