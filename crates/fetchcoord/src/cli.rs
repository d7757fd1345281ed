//! Exposes the command line application.
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fetchcoord_api::Resources;
use fetchcoord_api::types::NewUser;
use fetchcoord_service::config::Config;
use fetchcoord_service::coordinator::{FetchCoordinator, FetchDescriptor};
use fetchcoord_service::metrics;
use serde::Serialize;

use crate::logging;
use crate::navigation::Screen;
use crate::screens::{self, Output};

/// fetchcoord commands.
#[derive(Subcommand)]
enum Command {
    /// Show the health status of the API.
    Health,

    /// List all items.
    Items,

    /// Show a single item.
    Item {
        /// The id of the item.
        id: String,
    },

    /// List all users.
    Users,

    /// Show a single user.
    User {
        /// The id of the user.
        id: u64,
    },

    /// Create a new user.
    CreateUser {
        /// The name of the user.
        name: String,
        /// The email address of the user.
        email: String,
    },

    /// Show the configuration of the mobile app.
    AppConfig,

    /// Walk through the screens of the example app.
    Browse,
}

/// Command line interface parser.
#[derive(Parser)]
#[command(bin_name = "fetchcoord", version)]
struct Cli {
    /// Path to your configuration file.
    #[arg(long, short, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    /// Returns the path to the configuration file.
    fn config(&self) -> Option<&Path> {
        self.config.as_deref()
    }
}

/// Runs the main application.
pub fn execute() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::get(cli.config()).context("failed loading config")?;

    let _sentry = sentry::init(sentry::ClientOptions {
        dsn: config.sentry_dsn.clone(),
        release: sentry::release_name!(),
        ..Default::default()
    });

    // SAFETY: We are still single-threaded, the runtime is only created below.
    unsafe { logging::init_logging(&config) };

    if let Some(ref statsd) = config.metrics.statsd {
        let mut tags = config.metrics.custom_tags.clone();
        if let Some(hostname_tag) = config.metrics.hostname_tag.clone() {
            if let Some(hostname) = hostname::get().ok().and_then(|s| s.into_string().ok()) {
                tags.insert(hostname_tag, hostname);
            }
        }
        metrics::configure_statsd(&config.metrics.prefix, statsd, tags)
            .context("failed to configure statsd")?;
    }

    let resources = Resources::from_config(&config)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("fetchcoord-worker")
        .enable_all()
        .build()
        .context("failed to create runtime")?;

    runtime.block_on(run(cli.command, resources))
}

async fn run(command: Command, resources: Resources) -> Result<()> {
    match command {
        Command::Health => fetch(&resources.health, resources.health_descriptor()).await,
        Command::Items => fetch(&resources.items, resources.items_descriptor()).await,
        Command::Item { id } => fetch(&resources.item, resources.item_descriptor(Some(&id))).await,
        Command::Users => fetch(&resources.users, resources.users_descriptor()).await,
        Command::User { id } => fetch(&resources.user, resources.user_descriptor(id)).await,
        Command::CreateUser { name, email } => {
            let created = resources
                .create_user(&NewUser { name, email })
                .await
                .context("failed to create user")?;
            print_json(&created)
        }
        Command::AppConfig => {
            fetch(&resources.app_config, resources.app_config_descriptor()).await
        }
        Command::Browse => {
            let output: Output = Arc::new(|screen: &Screen, frame: &str| {
                println!("[{screen}]\n{frame}\n");
            });
            screens::browse(&resources, &output).await;
            Ok(())
        }
    }
}

/// Fetches the resource of `descriptor` through `coordinator` and prints it.
async fn fetch<T>(coordinator: &FetchCoordinator<T>, descriptor: FetchDescriptor<T>) -> Result<()>
where
    T: Serialize + Send + Sync + 'static,
{
    let key = descriptor.key();
    let value = match coordinator.ensure(&descriptor) {
        Some(handle) => handle
            .await
            .with_context(|| format!("failed to fetch `{key}`"))?,
        None => coordinator
            .get(key)
            .and_then(|entry| entry.value().cloned())
            .with_context(|| format!("`{key}` has no value"))?,
    };
    print_json(&*value)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize response")?;
    println!("{json}");
    Ok(())
}
