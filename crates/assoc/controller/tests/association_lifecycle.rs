use assoc_controller::config::ControllerConfig;
use assoc_controller::requeue::REQUEUE_INTERVAL;
use assoc_controller::store::ResourceStore;
use assoc_controller::{AssociationReconciler, Controller, InMemoryStore, ReconcileResult};
use assoc_types::naming::INTERNAL_KIBANA_USER;
use assoc_types::{
    Association, AssociationStatus, BackendElasticsearch, Elasticsearch, ElasticsearchAuth,
    ElasticsearchInlineAuth, Kibana, NamespacedName, Secret,
};
use assoc_watches::DynamicWatches;
use std::sync::Arc;
use std::time::Duration;

const ES_URL: &str = "https://es1-es-public.ns.svc.cluster.local:9200";

fn es1() -> NamespacedName {
    NamespacedName::new("ns", "es1")
}

fn kb1() -> NamespacedName {
    NamespacedName::new("ns", "kb1")
}

fn expected_backend() -> BackendElasticsearch {
    BackendElasticsearch {
        url: ES_URL.to_string(),
        auth: ElasticsearchAuth {
            inline: Some(ElasticsearchInlineAuth {
                username: INTERNAL_KIBANA_USER.to_string(),
                password: "p".to_string(),
            }),
        },
        ca_cert_secret: Some("es1".to_string()),
    }
}

async fn make_provider_available(store: &InMemoryStore) {
    store
        .apply_secret(
            Secret::new("ns", "es1-elastic-internal-users").with_entry(INTERNAL_KIBANA_USER, "p"),
        )
        .await;
    store.apply_secret(Secret::new("ns", "es1")).await;
    store.apply_elasticsearch(Elasticsearch::new("ns", "es1")).await;
}

async fn setup() -> (Arc<InMemoryStore>, AssociationReconciler, NamespacedName) {
    let store = Arc::new(InMemoryStore::new());
    let reconciler = AssociationReconciler::new(store.clone(), Arc::new(DynamicWatches::new()));
    let key = store
        .apply_association(Association::new("ns", "kb1-es1", es1(), kb1()))
        .await
        .meta
        .key();
    (store, reconciler, key)
}

#[tokio::test]
async fn provider_appears_and_configuration_converges() {
    let (store, reconciler, key) = setup().await;
    store.apply_kibana(Kibana::new("ns", "kb1")).await;

    // Provider missing: wait and retry
    let outcome = reconciler.reconcile(&key).await;
    assert!(outcome.error.is_none());
    assert_eq!(
        outcome.result,
        ReconcileResult {
            requeue: true,
            requeue_after: Some(Duration::from_secs(10)),
        }
    );
    assert_eq!(
        store.get_association(&key).await.unwrap().status,
        AssociationStatus::Pending
    );

    // Provider shows up with credentials
    make_provider_available(&store).await;
    let outcome = reconciler.reconcile(&key).await;
    assert!(outcome.error.is_none());
    assert!(outcome.result.is_done());
    assert_eq!(store.write_stats().kibana_updates, 1);
    assert_eq!(
        store.get_kibana(&kb1()).await.unwrap().spec.elasticsearch,
        expected_backend()
    );
    assert_eq!(
        store.get_association(&key).await.unwrap().status,
        AssociationStatus::Established
    );
}

#[tokio::test]
async fn reconcile_is_idempotent() {
    let (store, reconciler, key) = setup().await;
    make_provider_available(&store).await;
    store.apply_kibana(Kibana::new("ns", "kb1")).await;

    let first = reconciler.reconcile(&key).await.into_result().unwrap();
    let writes = store.write_stats();
    let second = reconciler.reconcile(&key).await.into_result().unwrap();

    assert_eq!(first, second);
    assert_eq!(store.write_stats(), writes);
}

#[tokio::test]
async fn matching_configuration_is_not_rewritten() {
    let (store, reconciler, key) = setup().await;
    make_provider_available(&store).await;
    let mut kibana = Kibana::new("ns", "kb1");
    kibana.spec.elasticsearch = expected_backend();
    store.apply_kibana(kibana).await;

    let outcome = reconciler.reconcile(&key).await;
    assert!(outcome.error.is_none());
    assert_eq!(store.write_stats().kibana_updates, 0);
    assert_eq!(
        store.get_association(&key).await.unwrap().status,
        AssociationStatus::Established
    );
}

#[tokio::test]
async fn stale_configuration_is_replaced_once() {
    let (store, reconciler, key) = setup().await;
    make_provider_available(&store).await;
    let mut kibana = Kibana::new("ns", "kb1");
    kibana.spec.elasticsearch = expected_backend();
    kibana.spec.elasticsearch.url = "https://old:9200".to_string();
    store.apply_kibana(kibana).await;

    reconciler.reconcile(&key).await;
    reconciler.reconcile(&key).await;

    assert_eq!(store.write_stats().kibana_updates, 1);
    assert_eq!(
        store.get_kibana(&kb1()).await.unwrap().spec.elasticsearch.url,
        ES_URL
    );
}

#[tokio::test]
async fn unchanged_status_is_not_persisted() {
    let (store, reconciler, key) = setup().await;

    reconciler.reconcile(&key).await;
    assert_eq!(store.write_stats().status_updates, 1);

    // Still pending: the transition runs again but nothing is written
    let outcome = reconciler.reconcile(&key).await;
    assert_eq!(outcome.result.requeue_after, Some(REQUEUE_INTERVAL));
    assert_eq!(store.write_stats().status_updates, 1);
}

#[tokio::test]
async fn watches_follow_association_lifecycle() {
    let (store, reconciler, key) = setup().await;
    let watches = reconciler.watches().clone();

    reconciler.reconcile(&key).await;
    assert_eq!(watches.elasticsearch.watchers_for(&es1()), vec![key.clone()]);
    assert_eq!(watches.kibana.watchers_for(&kb1()), vec![key.clone()]);
    assert_eq!(watches.len(), 2);

    store.delete_association(&key).await.unwrap();
    reconciler.reconcile(&key).await;
    assert!(watches.is_empty());

    let outcome = reconciler.reconcile(&key).await;
    assert!(outcome.error.is_none());
    assert!(outcome.result.is_done());
    assert!(watches.is_empty());
}

#[tokio::test]
async fn spec_edit_before_deletion_still_releases_watches() {
    let (store, reconciler, key) = setup().await;
    let watches = reconciler.watches().clone();
    reconciler.reconcile(&key).await;
    assert_eq!(watches.len(), 2);

    // An external edit of the association switches the consumer
    let edited = Association::new("ns", "kb1-es1", es1(), NamespacedName::new("ns", "kb2"));
    let stored = store.apply_association(edited).await;
    assert_eq!(stored.status, AssociationStatus::Pending);
    assert!(stored.meta.has_finalizer(assoc_controller::WATCH_FINALIZER));

    store.delete_association(&key).await.unwrap();
    assert!(store.get_association(&key).await.unwrap().meta.is_being_deleted());

    let outcome = reconciler.reconcile(&key).await;
    assert!(outcome.error.is_none());
    assert!(store.get_association(&key).await.unwrap_err().is_not_found());
    assert!(watches.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn controller_converges_from_watch_events() {
    let store = Arc::new(InMemoryStore::new());
    store.apply_kibana(Kibana::new("ns", "kb1")).await;
    let key = store
        .apply_association(Association::new("ns", "kb1-es1", es1(), kb1()))
        .await
        .meta
        .key();

    let config = ControllerConfig {
        max_concurrent_reconciles: 2,
        ..ControllerConfig::default()
    };
    let controller = Controller::new(config, store.clone(), Arc::new(DynamicWatches::new()));
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    let run = tokio::spawn(controller.clone().run(async {
        let _ = rx.await;
    }));

    wait_for_status(&store, &key, AssociationStatus::Pending).await;

    // The provider change reaches the association through its dynamic watch
    make_provider_available(&store).await;
    wait_for_status(&store, &key, AssociationStatus::Established).await;
    assert_eq!(
        store.get_kibana(&kb1()).await.unwrap().spec.elasticsearch,
        expected_backend()
    );

    // Deleting the association releases it once the finalizer ran
    store.delete_association(&key).await.unwrap();
    for _ in 0..200 {
        if store.get_association(&key).await.is_err() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(store.get_association(&key).await.unwrap_err().is_not_found());
    assert!(controller.reconciler().watches().is_empty());

    tx.send(()).unwrap();
    run.await.unwrap().unwrap();
    assert_eq!(store.write_stats().kibana_updates, 1);
}

async fn wait_for_status(store: &InMemoryStore, key: &NamespacedName, status: AssociationStatus) {
    for _ in 0..200 {
        if let Ok(association) = store.get_association(key).await {
            if association.status == status {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("association {} never reached {:?}", key, status);
}
