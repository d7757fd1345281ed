//! Rendering of the example app screens.
//!
//! A screen subscribes to the key it shows, makes sure it is fetched, and renders every state it
//! is notified with. Rendered frames go to an [`Output`].

use std::sync::Arc;

use fetchcoord_api::Resources;
use fetchcoord_api::types::{HealthStatus, Item};
use fetchcoord_service::caching::{CacheEntry, Status};
use fetchcoord_service::coordinator::{FetchCoordinator, FetchDescriptor};

use crate::navigation::{Navigator, Screen};

/// Receives every rendered frame.
pub type Output = Arc<dyn Fn(&Screen, &str) + Send + Sync>;

fn render<T>(entry: &CacheEntry<T>, success: impl FnOnce(&T) -> String) -> String {
    match entry.status() {
        Status::Idle => String::new(),
        Status::Loading => "Loading...".to_owned(),
        Status::Success => entry.value().map(|v| success(v)).unwrap_or_default(),
        Status::Error => entry
            .error()
            .map(|e| format!("Error: {e}"))
            .unwrap_or_default(),
    }
}

pub fn render_items(entry: &CacheEntry<Vec<Item>>) -> String {
    render(entry, |items| {
        items
            .iter()
            .map(|item| format!("- {} ({})", item.name, item.id))
            .collect::<Vec<_>>()
            .join("\n")
    })
}

pub fn render_item_details(entry: &CacheEntry<Item>) -> String {
    let details = render(entry, |item| {
        format!("ID: {}\nName: {}\nPrice: {}", item.id, item.name, item.price)
    });
    format!("{details}\n\nBack to Items List").trim_start().to_owned()
}

pub fn render_health(entry: &CacheEntry<HealthStatus>) -> String {
    render(entry, |health| {
        let json = serde_json::to_string_pretty(health)
            .unwrap_or_else(|e| format!("unserializable health status: {e}"));
        format!("API Health Status\n{json}")
    })
}

/// Shows `screen` until its fetch resolved.
async fn show<T>(
    screen: &Screen,
    coordinator: &FetchCoordinator<T>,
    descriptor: FetchDescriptor<T>,
    view: fn(&CacheEntry<T>) -> String,
    output: &Output,
) where
    T: Send + Sync + 'static,
{
    tracing::info!(%screen, key = %descriptor.key(), "Showing screen");

    let subscription = {
        let screen = screen.clone();
        let output = Arc::clone(output);
        coordinator.subscribe(descriptor.key().clone(), move |entry| {
            tracing::debug!(%screen, status = %entry.status(), "Rendering");
            let frame = view(entry);
            if !frame.is_empty() {
                output(&screen, &frame);
            }
        })
    };

    if let Some(handle) = coordinator.ensure(&descriptor) {
        // a failed fetch is rendered like any other state
        handle.await.ok();
    }
    subscription.unsubscribe();
}

/// Shows the current screen of `navigator`.
pub async fn visit(resources: &Resources, navigator: &Navigator, output: &Output) {
    let screen = navigator.current();
    match screen {
        Screen::Items => {
            let descriptor = resources.items_descriptor();
            show(screen, &resources.items, descriptor, render_items, output).await;
        }
        Screen::ItemDetails { id } => {
            let descriptor = resources.item_descriptor(id.as_deref());
            show(screen, &resources.item, descriptor, render_item_details, output).await;
        }
        Screen::ApiHealth => {
            let descriptor = resources.health_descriptor();
            show(screen, &resources.health, descriptor, render_health, output).await;
        }
    }
}

/// Walks through the example app: the item list, the details of the first item, back to the
/// list, and finally the API health.
pub async fn browse(resources: &Resources, output: &Output) {
    let mut navigator = Navigator::new(Screen::Items);
    visit(resources, &navigator, output).await;

    let first_id = resources
        .items
        .get(&fetchcoord_api::keys::items())
        .and_then(|entry| Some(entry.value()?.first()?.id.clone()));

    navigator.navigate(Screen::ItemDetails { id: first_id });
    visit(resources, &navigator, output).await;

    navigator.back();
    visit(resources, &navigator, output).await;

    navigator.navigate(Screen::ApiHealth);
    visit(resources, &navigator, output).await;
}
