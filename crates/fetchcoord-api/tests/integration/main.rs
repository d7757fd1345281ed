use fetchcoord_api::{ApiClient, Resources};
use fetchcoord_service::config::ApiConfig;
use fetchcoord_service::coordinator::RetryPolicy;
use fetchcoord_test::SampleApi;

mod client;
mod resources;

/// Creates a client that talks to the given mock for both base URLs.
pub fn client_for(api: &SampleApi) -> ApiClient {
    let config = ApiConfig {
        base_url: api.url("/"),
        example_base_url: api.url("/"),
        ..Default::default()
    };
    ApiClient::new(&config).unwrap()
}

pub fn resources_for(api: &SampleApi) -> Resources {
    Resources::new(client_for(api), RetryPolicy::default())
}
