use std::sync::{Arc, Mutex};

use fetchcoord_api::keys;
use fetchcoord_api::types::NewUser;
use fetchcoord_service::caching::{ErrorKind, Status};

use crate::resources_for;

#[tokio::test]
async fn test_concurrent_ensures_hit_once() {
    fetchcoord_test::setup();
    let api = fetchcoord_test::sample_api();
    let resources = resources_for(&api);
    let descriptor = resources.items_descriptor();

    let first = resources.items.ensure(&descriptor).unwrap();
    let second = resources.items.ensure(&descriptor).unwrap();
    let (first, second) = futures::join!(first, second);

    assert!(Arc::ptr_eq(&first.unwrap(), &second.unwrap()));
    assert!(resources.items.ensure(&descriptor).is_none());
    assert_eq!(api.hits("/example/items"), 1);
}

#[tokio::test]
async fn test_item_details_wait_for_id() {
    fetchcoord_test::setup();
    let api = fetchcoord_test::sample_api();
    let resources = resources_for(&api);

    let pending = resources.item_descriptor(None);
    assert!(!pending.is_enabled());
    assert!(resources.item.ensure(&pending).is_none());
    assert!(resources.item.get(pending.key()).is_none());

    let descriptor = resources.item_descriptor(Some("1"));
    assert_eq!(descriptor.key(), &keys::item("1"));
    let item = resources.item.ensure(&descriptor).unwrap().await.unwrap();
    assert_eq!(item.name, "Widget");

    assert_eq!(api.accesses(), 1);
}

#[tokio::test]
async fn test_error_is_retried_on_next_ensure() {
    fetchcoord_test::setup();
    let api = fetchcoord_test::sample_api();
    let resources = resources_for(&api);
    let descriptor = resources.item_descriptor(Some("42"));

    let error = resources
        .item
        .ensure(&descriptor)
        .unwrap()
        .await
        .unwrap_err();
    assert_eq!(error.kind, ErrorKind::NotFound);
    assert_eq!(resources.item.status(descriptor.key()), Status::Error);

    // errors are not sticky, the next ensure fetches again
    let handle = resources.item.ensure(&descriptor).unwrap();
    assert_eq!(resources.item.status(descriptor.key()), Status::Loading);
    handle.await.unwrap_err();

    assert_eq!(api.hits("/example/items/42"), 2);
}

#[tokio::test]
async fn test_observer_sees_fetch_lifecycle() {
    fetchcoord_test::setup();
    let api = fetchcoord_test::sample_api();
    let resources = resources_for(&api);
    let descriptor = resources.health_descriptor();

    let log = Arc::new(Mutex::new(Vec::new()));
    let subscription = {
        let log = Arc::clone(&log);
        resources
            .health
            .subscribe(keys::health(), move |entry| {
                log.lock().unwrap().push(entry.status())
            })
    };

    resources.health.ensure(&descriptor).unwrap().await.unwrap();
    subscription.unsubscribe();

    assert_eq!(
        *log.lock().unwrap(),
        [Status::Idle, Status::Loading, Status::Success]
    );
}

#[tokio::test]
async fn test_create_user_invalidates_list() {
    fetchcoord_test::setup();
    let api = fetchcoord_test::sample_api();
    let resources = resources_for(&api);
    let descriptor = resources.users_descriptor();

    resources.users.ensure(&descriptor).unwrap().await.unwrap();
    assert_eq!(resources.users.status(&keys::users()), Status::Success);

    let new_user = NewUser {
        name: "Ada".into(),
        email: "ada@example.com".into(),
    };
    resources.create_user(&new_user).await.unwrap();
    assert_eq!(resources.users.status(&keys::users()), Status::Idle);

    resources.users.ensure(&descriptor).unwrap().await.unwrap();
    assert_eq!(api.hits("/users"), 3);
}
