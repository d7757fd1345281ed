use anyhow::Result;
use fetchcoord_service::caching::{ErrorInfo, RequestKey};
use fetchcoord_service::config::Config;
use fetchcoord_service::coordinator::{FetchCoordinator, FetchDescriptor, RetryPolicy};

use crate::client::ApiClient;
use crate::types::{AppConfig, CreatedUser, HealthStatus, Item, NewUser, User};

/// The [`RequestKey`]s of the sample API resources.
pub mod keys {
    use super::RequestKey;

    pub fn health() -> RequestKey {
        RequestKey::new("health")
    }

    pub fn items() -> RequestKey {
        RequestKey::new("items")
    }

    pub fn item(id: &str) -> RequestKey {
        RequestKey::builder("items").segment(id).build()
    }

    pub fn users() -> RequestKey {
        RequestKey::new("users")
    }

    pub fn user(id: u64) -> RequestKey {
        RequestKey::builder("users").segment(id.to_string()).build()
    }

    pub fn app_config() -> RequestKey {
        RequestKey::new("app-config")
    }
}

/// One [`FetchCoordinator`] per resource of the sample API, all sharing one client.
///
/// This is meant to be created once at startup.
#[derive(Clone, Debug)]
pub struct Resources {
    pub client: ApiClient,
    pub health: FetchCoordinator<HealthStatus>,
    pub items: FetchCoordinator<Vec<Item>>,
    pub item: FetchCoordinator<Item>,
    pub users: FetchCoordinator<Vec<User>>,
    pub user: FetchCoordinator<User>,
    pub app_config: FetchCoordinator<AppConfig>,
}

impl Resources {
    pub fn new(client: ApiClient, retry: RetryPolicy) -> Self {
        Self {
            client,
            health: FetchCoordinator::new(retry),
            items: FetchCoordinator::new(retry),
            item: FetchCoordinator::new(retry),
            users: FetchCoordinator::new(retry),
            user: FetchCoordinator::new(retry),
            app_config: FetchCoordinator::new(retry),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let client = ApiClient::new(&config.api)?;
        Ok(Self::new(client, config.fetch.into()))
    }

    pub fn health_descriptor(&self) -> FetchDescriptor<HealthStatus> {
        let client = self.client.clone();
        FetchDescriptor::new(keys::health(), move || {
            let client = client.clone();
            async move { client.health().await }
        })
    }

    pub fn items_descriptor(&self) -> FetchDescriptor<Vec<Item>> {
        let client = self.client.clone();
        FetchDescriptor::new(keys::items(), move || {
            let client = client.clone();
            async move { client.items().await }
        })
    }

    /// The details of one item, only enabled once the id is known.
    pub fn item_descriptor(&self, id: Option<&str>) -> FetchDescriptor<Item> {
        let client = self.client.clone();
        let id = id.map(str::to_owned);
        let enabled = id.is_some();
        let id = id.unwrap_or_default();

        FetchDescriptor::new(keys::item(&id), move || {
            let client = client.clone();
            let id = id.clone();
            async move { client.item(&id).await }
        })
        .enabled(enabled)
    }

    pub fn users_descriptor(&self) -> FetchDescriptor<Vec<User>> {
        let client = self.client.clone();
        FetchDescriptor::new(keys::users(), move || {
            let client = client.clone();
            async move { client.users().await }
        })
    }

    pub fn user_descriptor(&self, id: u64) -> FetchDescriptor<User> {
        let client = self.client.clone();
        FetchDescriptor::new(keys::user(id), move || {
            let client = client.clone();
            async move { client.user(id).await }
        })
    }

    pub fn app_config_descriptor(&self) -> FetchDescriptor<AppConfig> {
        let client = self.client.clone();
        FetchDescriptor::new(keys::app_config(), move || {
            let client = client.clone();
            async move { client.app_config().await }
        })
    }

    /// Creates a user, and invalidates the cached user list if that succeeded.
    pub async fn create_user(&self, user: &NewUser) -> Result<CreatedUser, ErrorInfo> {
        let created = self.client.create_user(user).await?;
        tracing::debug!(id = created.id, "Created user, invalidating user list");
        self.users.invalidate(&keys::users());
        Ok(created)
    }
}
