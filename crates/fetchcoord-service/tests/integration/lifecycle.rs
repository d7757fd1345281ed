use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use fetchcoord_service::caching::{ErrorKind, RequestKey, Status};
use fetchcoord_service::coordinator::FetchCoordinator;

use crate::{delayed, flaky, record, statuses, widgets};

#[tokio::test]
async fn test_disabled_never_creates_entries() {
    fetchcoord_test::setup();

    let coordinator = FetchCoordinator::default();
    let key = RequestKey::builder("items").segment("1").build();
    let (descriptor, calls) = delayed(key.clone(), widgets(), Duration::ZERO);
    let descriptor = descriptor.enabled(false);

    assert!(coordinator.get(&key).is_none());
    for _ in 0..3 {
        assert!(coordinator.ensure(&descriptor).is_none());
    }

    assert!(coordinator.get(&key).is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_ensure_while_loading_calls_executor_once() {
    fetchcoord_test::setup();

    let coordinator = FetchCoordinator::default();
    let key = RequestKey::new("items");
    let (descriptor, calls) = delayed(key.clone(), widgets(), Duration::from_millis(50));

    let (list, _list_subscription) = record(&coordinator, key.clone());
    let (detail, _detail_subscription) = record(&coordinator, key.clone());

    let first = coordinator.ensure(&descriptor).unwrap();
    assert_eq!(coordinator.status(&key), Status::Loading);
    let second = coordinator.ensure(&descriptor).unwrap();

    let (first, second) = futures::join!(first, second);
    assert!(Arc::ptr_eq(&first.unwrap(), &second.unwrap()));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let list = list.lock().unwrap();
    let detail = detail.lock().unwrap();
    assert_eq!(*list, *detail);

    let (Some(a), Some(b)) = (list.last(), detail.last()) else {
        panic!("observers should have been notified");
    };
    assert_eq!(a.status(), Status::Success);
    assert!(Arc::ptr_eq(a.value().unwrap(), b.value().unwrap()));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_ensures_from_many_tasks() {
    fetchcoord_test::setup();

    let coordinator = FetchCoordinator::default();
    let key = RequestKey::new("items");
    let (descriptor, calls) = delayed(key.clone(), widgets(), Duration::from_millis(20));

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let coordinator = coordinator.clone();
            let descriptor = descriptor.clone();
            tokio::spawn(async move {
                if let Some(handle) = coordinator.ensure(&descriptor) {
                    handle.await.unwrap();
                }
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(coordinator.status(&key), Status::Success);
}

#[tokio::test]
async fn test_invalidate_unknown_key() {
    fetchcoord_test::setup();

    let coordinator = FetchCoordinator::<Vec<crate::Item>>::default();
    let key = RequestKey::new("items");

    coordinator.invalidate(&key);
    coordinator.invalidate(&key);

    assert!(coordinator.get(&key).is_none());
    assert!(coordinator.store().is_empty());
}

#[tokio::test]
async fn test_error_then_retry_succeeds() {
    fetchcoord_test::setup();

    let coordinator = FetchCoordinator::default();
    let key = RequestKey::new("items");
    let (descriptor, calls) = flaky(key.clone(), widgets());
    let (recorded, _subscription) = record(&coordinator, key.clone());

    let error = coordinator.ensure(&descriptor).unwrap().await.unwrap_err();
    assert_eq!(error.kind, ErrorKind::Network);
    assert_eq!(coordinator.status(&key), Status::Error);

    let value = coordinator.ensure(&descriptor).unwrap().await.unwrap();
    assert_eq!(*value, widgets());
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    assert_eq!(
        statuses(&recorded),
        [
            Status::Idle,
            Status::Loading,
            Status::Error,
            Status::Loading,
            Status::Success,
        ]
    );
    // the error is gone once the retry succeeded
    let entry = coordinator.get(&key).unwrap();
    assert!(entry.error().is_none());
}

#[tokio::test]
async fn test_disable_mid_flight_still_updates_cache() {
    fetchcoord_test::setup();

    let coordinator = FetchCoordinator::default();
    let key = RequestKey::builder("items").segment("1").build();
    let (descriptor, calls) = delayed(key.clone(), widgets(), Duration::from_millis(20));

    let handle = coordinator.ensure(&descriptor).unwrap();
    // the screen went away, and its descriptor is now disabled
    let disabled = descriptor.clone().enabled(false);
    assert!(coordinator.ensure(&disabled).is_none());
    drop(handle);

    while coordinator.is_fetching(&key) {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let entry = coordinator.get(&key).unwrap();
    assert_eq!(entry.status(), Status::Success);
    assert_eq!(entry.value().map(|v| v.as_slice()), Some(widgets().as_slice()));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_invalidate_while_loading() {
    fetchcoord_test::setup();

    let coordinator = FetchCoordinator::default();
    let key = RequestKey::new("items");
    let (descriptor, _calls) = delayed(key.clone(), widgets(), Duration::from_millis(20));
    let (recorded, _subscription) = record(&coordinator, key.clone());

    let handle = coordinator.ensure(&descriptor).unwrap();
    coordinator.invalidate(&key);
    assert_eq!(coordinator.status(&key), Status::Idle);

    // the running fetch is not cancelled, and its outcome wins
    handle.await.unwrap();
    assert_eq!(coordinator.status(&key), Status::Success);
    assert_eq!(
        statuses(&recorded),
        [Status::Idle, Status::Loading, Status::Idle, Status::Success]
    );
}

#[tokio::test]
async fn test_ensure_after_invalidate_while_loading() {
    fetchcoord_test::setup();

    let coordinator = FetchCoordinator::default();
    let key = RequestKey::new("items");
    let (descriptor, calls) = delayed(key.clone(), widgets(), Duration::from_millis(20));
    let (recorded, _subscription) = record(&coordinator, key.clone());

    let first = coordinator.ensure(&descriptor).unwrap();
    coordinator.invalidate(&key);

    // joins the running fetch, and shows that it is loading again
    let second = coordinator.ensure(&descriptor).unwrap();
    assert_eq!(coordinator.status(&key), Status::Loading);
    assert!(coordinator.is_fetching(&key));

    let (first, second) = futures::join!(first, second);
    assert!(Arc::ptr_eq(&first.unwrap(), &second.unwrap()));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        statuses(&recorded),
        [
            Status::Idle,
            Status::Loading,
            Status::Idle,
            Status::Loading,
            Status::Success
        ]
    );
}

#[tokio::test]
async fn test_keys_are_independent() {
    fetchcoord_test::setup();

    let coordinator = FetchCoordinator::default();
    let first = RequestKey::builder("items").segment("1").build();
    let second = RequestKey::builder("items").segment("2").build();
    let (one, one_calls) = delayed(first.clone(), 1, Duration::from_millis(10));
    let (two, two_calls) = delayed(second.clone(), 2, Duration::from_millis(10));

    let (a, b) = futures::join!(
        coordinator.ensure(&one).unwrap(),
        coordinator.ensure(&two).unwrap()
    );

    assert_eq!((*a.unwrap(), *b.unwrap()), (1, 2));
    assert_eq!(one_calls.load(Ordering::SeqCst), 1);
    assert_eq!(two_calls.load(Ordering::SeqCst), 1);
    assert_eq!(coordinator.store().len(), 2);
}
