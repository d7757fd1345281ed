use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use fetchcoord_service::caching::ErrorInfo;
use fetchcoord_service::config::ApiConfig;
use fetchcoord_service::metric;
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::{status_error, transport_error};
use crate::types::{AppConfig, CreatedUser, Envelope, HealthStatus, Item, NewUser, User};

/// Creates a [`reqwest::Client`] with the configured timeouts.
pub fn create_client(config: &ApiConfig) -> Result<reqwest::Client> {
    reqwest::ClientBuilder::new()
        .gzip(true)
        .connect_timeout(config.connect_timeout)
        .timeout(config.timeout)
        .pool_idle_timeout(Duration::from_secs(30))
        .build()
        .context("failed to create HTTP client")
}

/// A typed client for the sample REST API.
///
/// Every call resolves to the payload or an [`ErrorInfo`], so the calls can be used as fetch
/// executors as they are.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: Url,
    example_base_url: Url,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        Ok(Self::with_client(
            create_client(config)?,
            config.base_url.clone(),
            config.example_base_url.clone(),
        ))
    }

    pub fn with_client(client: reqwest::Client, base_url: Url, example_base_url: Url) -> Self {
        Self {
            client,
            base_url,
            example_base_url,
        }
    }

    /// `GET /health`
    pub async fn health(&self) -> Result<HealthStatus, ErrorInfo> {
        let url = endpoint(&self.base_url, &["health"])?;
        self.get("health", url).await
    }

    /// `GET /example/items`
    pub async fn items(&self) -> Result<Vec<Item>, ErrorInfo> {
        let url = endpoint(&self.example_base_url, &["example", "items"])?;
        self.get("items", url).await
    }

    /// `GET /example/items/{id}`
    pub async fn item(&self, id: &str) -> Result<Item, ErrorInfo> {
        let url = endpoint(&self.example_base_url, &["example", "items", id])?;
        self.get("item", url).await
    }

    /// `GET /users`
    pub async fn users(&self) -> Result<Vec<User>, ErrorInfo> {
        let url = endpoint(&self.base_url, &["users"])?;
        let envelope = self.get("users", url).await?;
        unwrap_envelope(envelope)
    }

    /// `GET /users/:id`
    pub async fn user(&self, id: u64) -> Result<User, ErrorInfo> {
        let url = endpoint(&self.base_url, &["users", &id.to_string()])?;
        let envelope = self.get("user", url).await?;
        unwrap_envelope(envelope)
    }

    /// `POST /users`
    pub async fn create_user(&self, user: &NewUser) -> Result<CreatedUser, ErrorInfo> {
        let url = endpoint(&self.base_url, &["users"])?;
        let request = self.client.post(url.clone()).json(user);
        let envelope = self.send("create_user", url, request).await?;
        unwrap_envelope(envelope)
    }

    /// `GET /app-config`
    pub async fn app_config(&self) -> Result<AppConfig, ErrorInfo> {
        let url = endpoint(&self.base_url, &["app-config"])?;
        let envelope = self.get("app_config", url).await?;
        unwrap_envelope(envelope)
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &str, url: Url) -> Result<T, ErrorInfo> {
        let request = self.client.get(url.clone());
        self.send(endpoint, url, request).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        url: Url,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ErrorInfo> {
        tracing::debug!(url = %url, "Sending request");
        let start = Instant::now();

        let result = async {
            let response = request.send().await.map_err(transport_error)?;
            let status = response.status();
            if !status.is_success() {
                return Err(status_error(&url, status));
            }
            response.json::<T>().await.map_err(transport_error)
        }
        .await;

        let status = match &result {
            Ok(_) => "success",
            Err(error) => error.kind.as_str(),
        };
        metric!(
            timer("api.request.duration") = start.elapsed(),
            "endpoint" => endpoint,
            "status" => status,
        );

        if let Err(error) = &result {
            tracing::debug!(
                error = error as &dyn std::error::Error,
                url = %url,
                "Request failed"
            );
        }
        result
    }
}

/// Appends `segments` to the path of `base`, percent-encoding each of them.
fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, ErrorInfo> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| ErrorInfo::unknown(format!("`{base}` cannot be a base URL")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn unwrap_envelope<T>(envelope: Envelope<T>) -> Result<T, ErrorInfo> {
    match envelope {
        Envelope {
            success: true,
            data: Some(data),
            ..
        } => Ok(data),
        Envelope { message, .. } if message.is_empty() => {
            Err(ErrorInfo::unknown("request was not successful"))
        }
        Envelope { message, .. } => Err(ErrorInfo::unknown(message)),
    }
}
