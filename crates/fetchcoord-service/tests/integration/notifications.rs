use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use fetchcoord_service::caching::{CacheEntry, RequestKey, Status};
use fetchcoord_service::coordinator::FetchCoordinator;

use crate::{Item, delayed, record, statuses, widgets};

#[tokio::test]
async fn test_list_fetch_notifies_lifecycle() {
    fetchcoord_test::setup();

    let coordinator = FetchCoordinator::default();
    let key = RequestKey::new("items");
    let (descriptor, calls) = delayed(key.clone(), widgets(), Duration::from_millis(10));

    let (first, first_subscription) = record(&coordinator, key.clone());
    coordinator.ensure(&descriptor).unwrap().await.unwrap();

    assert_eq!(
        statuses(&first),
        [Status::Idle, Status::Loading, Status::Success]
    );
    let resolved = first.lock().unwrap().last().cloned().unwrap();
    assert_eq!(resolved.value().map(|v| v.as_slice()), Some(widgets().as_slice()));

    // a late subscriber gets the cached value right away, and nothing is fetched again
    let (second, _second_subscription) = record(&coordinator, key.clone());
    assert!(coordinator.ensure(&descriptor).is_none());

    assert_eq!(statuses(&second), [Status::Success]);
    let late = second.lock().unwrap()[0].clone();
    assert!(Arc::ptr_eq(late.value().unwrap(), resolved.value().unwrap()));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    first_subscription.unsubscribe();
    first_subscription.unsubscribe();
}

#[tokio::test]
async fn test_subscribe_while_loading() {
    fetchcoord_test::setup();

    let coordinator = FetchCoordinator::default();
    let key = RequestKey::new("items");
    let (descriptor, _calls) = delayed(key.clone(), widgets(), Duration::from_millis(10));

    let handle = coordinator.ensure(&descriptor).unwrap();
    let (recorded, _subscription) = record(&coordinator, key.clone());
    assert_eq!(statuses(&recorded), [Status::Loading]);

    handle.await.unwrap();
    assert_eq!(statuses(&recorded), [Status::Loading, Status::Success]);
}

#[tokio::test]
async fn test_unsubscribed_observer_is_not_notified() {
    fetchcoord_test::setup();

    let coordinator = FetchCoordinator::default();
    let key = RequestKey::new("items");
    let (descriptor, _calls) = delayed(key.clone(), widgets(), Duration::ZERO);

    let (recorded, subscription) = record(&coordinator, key.clone());
    subscription.unsubscribe();

    coordinator.ensure(&descriptor).unwrap().await.unwrap();
    coordinator.invalidate(&key);

    assert_eq!(statuses(&recorded), [Status::Idle]);
    assert_eq!(coordinator.store().subscriber_count(&key), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_notifications_match_stored_state() {
    fetchcoord_test::setup();

    let coordinator = FetchCoordinator::<usize>::default();
    let keys: Vec<_> = (0..8)
        .map(|id| RequestKey::builder("items").segment(id.to_string()).build())
        .collect();

    let consistent = Arc::new(AtomicBool::new(true));
    let seen = Arc::new(Mutex::new(0usize));
    let mut subscriptions = Vec::new();
    for key in &keys {
        let observer = {
            let coordinator = coordinator.clone();
            let consistent = Arc::clone(&consistent);
            let seen = Arc::clone(&seen);
            move |entry: &CacheEntry<usize>| {
                let stored = coordinator.status(entry.key());
                if stored != entry.status() {
                    consistent.store(false, Ordering::SeqCst);
                }
                *seen.lock().unwrap() += 1;
            }
        };
        subscriptions.push(coordinator.subscribe(key.clone(), observer));
    }

    let tasks: Vec<_> = keys
        .iter()
        .enumerate()
        .map(|(id, key)| {
            let coordinator = coordinator.clone();
            let (descriptor, _calls) = delayed(key.clone(), id, Duration::from_millis(5));
            tokio::spawn(async move {
                for _ in 0..5 {
                    coordinator.refetch(&descriptor).unwrap().await.unwrap();
                }
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    assert!(consistent.load(Ordering::SeqCst));
    // the initial snapshot, loading and success for the first fetch, then idle, loading and
    // success for every refetch of an existing entry
    assert_eq!(*seen.lock().unwrap(), keys.len() * (1 + 2 + 4 * 3));

    for subscription in subscriptions {
        subscription.unsubscribe();
    }
}

#[tokio::test]
async fn test_observer_can_start_dependent_fetch() {
    fetchcoord_test::setup();

    let items = FetchCoordinator::<Vec<Item>>::default();
    let details = FetchCoordinator::<Item>::default();
    let list_key = RequestKey::new("items");
    let detail_key = RequestKey::builder("items").segment("1").build();

    let (list, _) = delayed(list_key.clone(), widgets(), Duration::ZERO);
    let (detail, detail_calls) =
        delayed(detail_key.clone(), widgets().remove(0), Duration::ZERO);

    // fetch the details of the first item once the list is there
    let _subscription = {
        let details = details.clone();
        items.subscribe(list_key.clone(), move |entry| {
            if entry.status() == Status::Success {
                details.ensure(&detail);
            }
        })
    };

    items.ensure(&list).unwrap().await.unwrap();
    while details.status(&detail_key) != Status::Success {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    assert_eq!(detail_calls.load(Ordering::SeqCst), 1);
}
