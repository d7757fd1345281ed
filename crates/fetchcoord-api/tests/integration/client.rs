use fetchcoord_api::types::NewUser;
use fetchcoord_service::caching::ErrorKind;
use fetchcoord_service::config::ApiConfig;

use crate::client_for;

#[tokio::test]
async fn test_health() {
    fetchcoord_test::setup();
    let api = fetchcoord_test::sample_api();
    let client = client_for(&api);

    let health = client.health().await.unwrap();
    assert_eq!(health.status, "ok");
    assert_eq!(health.environment, "test");
    assert_eq!(health.version, "1.0.0");
    assert_eq!(health.uptime, 42.5);
    assert_eq!(api.hits("/health"), 1);
}

#[tokio::test]
async fn test_items() {
    fetchcoord_test::setup();
    let api = fetchcoord_test::sample_api();
    let client = client_for(&api);

    let items = client.items().await.unwrap();
    assert_eq!(items.len(), 3);
    assert_eq!(items[0].id, "1");
    assert_eq!(items[0].name, "Widget");
    assert_eq!(items[0].price, 9.99);

    let item = client.item("2").await.unwrap();
    assert_eq!(item.name, "Gadget");
}

#[tokio::test]
async fn test_item_errors() {
    fetchcoord_test::setup();
    let api = fetchcoord_test::sample_api();
    let client = client_for(&api);

    let error = client.item("404").await.unwrap_err();
    assert_eq!(error.kind, ErrorKind::NotFound);
    assert_eq!(error.message, "404 Not Found");

    let error = client.item("secret").await.unwrap_err();
    assert_eq!(error.kind, ErrorKind::Permission);

    let error = client.item("broken").await.unwrap_err();
    assert_eq!(error.kind, ErrorKind::Network);

    assert_eq!(api.accesses(), 3);
}

#[tokio::test]
async fn test_users() {
    fetchcoord_test::setup();
    let api = fetchcoord_test::sample_api();
    let client = client_for(&api);

    let users = client.users().await.unwrap();
    insta::assert_yaml_snapshot!(users, @r###"
    - id: 1
      name: John Doe
      email: john@example.com
    - id: 2
      name: Jane Smith
      email: jane@example.com
    "###);

    let user = client.user(7).await.unwrap();
    assert_eq!(user.id, 7);
    assert_eq!(user.name, "Sample User");

    let error = client.user(0).await.unwrap_err();
    assert_eq!(error.kind, ErrorKind::Permission);
}

#[tokio::test]
async fn test_create_user() {
    fetchcoord_test::setup();
    let api = fetchcoord_test::sample_api();
    let client = client_for(&api);

    let new_user = NewUser {
        name: "Ada".into(),
        email: "ada@example.com".into(),
    };
    let created = client.create_user(&new_user).await.unwrap();

    assert_eq!(created.name, "Ada");
    assert_eq!(created.email, "ada@example.com");
    assert_eq!(created.created_at, "2024-01-01T00:00:00.000Z");
}

#[tokio::test]
async fn test_app_config() {
    fetchcoord_test::setup();
    let api = fetchcoord_test::sample_api();
    let client = client_for(&api);

    let config = client.app_config().await.unwrap();
    assert_eq!(config.app_name, "Mobile App Template");
    assert!(config.features.authentication);
    assert!(!config.features.push_notifications);
    assert!(config.features.analytics);
    assert_eq!(config.api.version, "v1");
}

#[tokio::test]
async fn test_connection_refused() {
    fetchcoord_test::setup();

    // bind and drop a listener, so nothing listens on its port anymore
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let url: url::Url = format!("http://127.0.0.1:{port}/").parse().unwrap();

    let config = ApiConfig {
        base_url: url.clone(),
        example_base_url: url,
        ..Default::default()
    };
    let client = fetchcoord_api::ApiClient::new(&config).unwrap();

    let error = client.health().await.unwrap_err();
    assert_eq!(error.kind, ErrorKind::Network);
    assert!(error.cause.is_some());
}
