mod common;

use common::{website, FakeService};
use kbtrain_core::config::SyncConfig;
use kbtrain_core::{
    AcceptedUrls, EventBus, ImportSelection, KnowledgeEvent, KnowledgeSource, RemovalOutcome,
    ServiceError, SharedRegistry, SourceRegistry, SyncCoordinator, SyncError,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    service: Arc<FakeService>,
    registry: SharedRegistry,
    events: EventBus,
    sync: SyncCoordinator<FakeService>,
}

/// `local` seeds the registry, `remote` the fake server.
fn harness(local: Vec<KnowledgeSource>, remote: Vec<KnowledgeSource>) -> Harness {
    let service = Arc::new(FakeService::with_sources(remote));
    let registry = SourceRegistry::from_sources(local).into_shared();
    let events = EventBus::new(64);
    let sync = SyncCoordinator::new(
        Arc::clone(&service),
        Arc::clone(&registry),
        events.clone(),
        "agent-1",
        &SyncConfig::default(),
    );
    Harness {
        service,
        registry,
        events,
        sync,
    }
}

async fn ids(registry: &SharedRegistry) -> Vec<u64> {
    registry.lock().await.ids()
}

#[tokio::test(start_paused = true)]
async fn test_mutations_collapse_into_one_refresh() {
    let h = harness(vec![], vec![website(1), website(2)]);

    for _ in 0..5 {
        h.sync.notify_mutation();
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(h.service.list_calls(), 0);
    assert!(h.sync.refresh_pending());

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(h.service.list_calls(), 1);
    assert_eq!(ids(&h.registry).await, vec![1, 2]);
}

#[tokio::test(start_paused = true)]
async fn test_teardown_cancels_pending_refresh() {
    let h = harness(vec![website(1)], vec![]);

    h.sync.notify_mutation();
    h.sync.teardown();
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert_eq!(h.service.list_calls(), 0);
    assert_eq!(ids(&h.registry).await, vec![1]);

    h.sync.notify_mutation();
    assert!(!h.sync.refresh_pending());
}

#[tokio::test(start_paused = true)]
async fn test_refresh_emits_event() {
    let h = harness(vec![], vec![website(4)]);
    let mut rx = h.events.subscribe();

    assert_eq!(h.sync.refresh().await.unwrap(), 1);
    assert_eq!(
        rx.recv().await.unwrap(),
        KnowledgeEvent::RegistryRefreshed { count: 1 }
    );
}

#[tokio::test(start_paused = true)]
async fn test_optimistic_removal() {
    let sources = vec![website(1), website(2), website(3)];
    let h = harness(sources.clone(), sources);
    let mut rx = h.events.subscribe();

    let outcome = h.sync.remove_sources(&[1, 3]).await.unwrap();

    assert_eq!(outcome, RemovalOutcome::Removed { ids: vec![1, 3] });
    assert_eq!(ids(&h.registry).await, vec![2]);
    assert_eq!(
        rx.recv().await.unwrap(),
        KnowledgeEvent::SourcesRemoved { ids: vec![1, 3] }
    );

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(h.service.list_calls(), 1);
    assert_eq!(ids(&h.registry).await, vec![2]);
}

#[tokio::test(start_paused = true)]
async fn test_failed_removal_refetches() {
    let sources = vec![website(1), website(2)];
    let h = harness(sources.clone(), sources);
    h.service.fail_removal(ServiceError::Api {
        status: 500,
        message: "boom".to_string(),
    });

    let err = h.sync.remove_sources(&[1]).await.unwrap_err();

    assert!(matches!(err, SyncError::Service(ServiceError::Api { status: 500, .. })));
    assert_eq!(h.service.list_calls(), 1);
    assert_eq!(ids(&h.registry).await, vec![1, 2]);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_removal_is_noop() {
    let sources = vec![website(1), website(2)];
    let h = harness(sources.clone(), sources);

    let (first, second) = tokio::join!(h.sync.remove_sources(&[1]), h.sync.remove_sources(&[2]));

    assert_eq!(first.unwrap(), RemovalOutcome::Removed { ids: vec![1] });
    assert_eq!(second.unwrap(), RemovalOutcome::AlreadyInFlight);
    assert_eq!(h.service.remove_calls.load(Ordering::SeqCst), 1);
    assert_eq!(ids(&h.registry).await, vec![2]);
}

#[tokio::test(start_paused = true)]
async fn test_empty_removal_is_rejected() {
    let h = harness(vec![website(1)], vec![website(1)]);

    let err = h.sync.remove_sources(&[]).await.unwrap_err();

    assert_eq!(err, SyncError::NothingToRemove);
    assert!(err.is_validation());
    assert_eq!(h.service.remove_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_import_skips_existing_sources() {
    let h = harness(vec![website(1), website(2)], vec![website(1), website(2)]);
    let selection = ImportSelection {
        sources: vec![website(1), website(3)],
        accepted_urls: AcceptedUrls::new(),
    };

    let added = h.sync.import(selection).await.unwrap();

    assert_eq!(added, vec![3]);
    assert_eq!(ids(&h.registry).await, vec![1, 2, 3]);
    assert_eq!(h.service.sources.lock().unwrap().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_import_narrows_to_accepted_urls() {
    let h = harness(vec![], vec![]);
    let mut accepted = AcceptedUrls::new();
    accepted.insert(3, ["https://site3.io/c".to_string()].into_iter().collect());

    h.sync
        .import(ImportSelection {
            sources: vec![website(3)],
            accepted_urls: accepted,
        })
        .await
        .unwrap();

    let registry = h.registry.lock().await;
    let selected: Vec<u64> = registry
        .get(3)
        .unwrap()
        .leaves()
        .filter(|n| n.is_selected)
        .map(|n| n.id)
        .collect();
    assert_eq!(selected, vec![303]);
}

#[tokio::test(start_paused = true)]
async fn test_import_of_known_sources_is_rejected() {
    let h = harness(vec![website(1)], vec![website(1)]);

    let err = h
        .sync
        .import(ImportSelection {
            sources: vec![website(1)],
            accepted_urls: AcceptedUrls::new(),
        })
        .await
        .unwrap_err();

    assert_eq!(err, SyncError::NothingToImport);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_resolving_after_teardown_is_ignored() {
    let h = harness(vec![website(1)], vec![website(2), website(3)]);
    h.service.delay_listing(Duration::from_millis(200));
    let mut rx = h.events.subscribe();

    let (count, _) = tokio::join!(h.sync.refresh(), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        h.sync.teardown();
    });

    assert_eq!(count.unwrap(), 1);
    assert_eq!(h.service.list_calls(), 1);
    assert_eq!(ids(&h.registry).await, vec![1]);
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_import_resolving_after_teardown_is_ignored() {
    let h = harness(vec![website(1)], vec![website(1)]);
    h.service.delay_import(Duration::from_millis(200));
    let selection = ImportSelection {
        sources: vec![website(4)],
        accepted_urls: AcceptedUrls::new(),
    };

    let (added, _) = tokio::join!(h.sync.import(selection), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        h.sync.teardown();
    });

    assert!(added.unwrap().is_empty());
    assert_eq!(ids(&h.registry).await, vec![1]);
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(h.service.list_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_failed_removal_after_teardown_skips_refetch() {
    let sources = vec![website(1), website(2)];
    let h = harness(sources.clone(), sources);
    h.service.fail_removal(ServiceError::Timeout);
    let mut rx = h.events.subscribe();

    let (result, _) = tokio::join!(h.sync.remove_sources(&[1]), async {
        tokio::time::sleep(Duration::from_millis(5)).await;
        h.sync.teardown();
    });

    assert_eq!(result.unwrap_err(), SyncError::Service(ServiceError::Timeout));
    assert_eq!(h.service.list_calls(), 0);
    assert_eq!(ids(&h.registry).await, vec![2]);
    assert_eq!(
        rx.try_recv().unwrap(),
        KnowledgeEvent::SourcesRemoved { ids: vec![1] }
    );
    assert!(rx.try_recv().is_err());
}
