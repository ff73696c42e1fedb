//! `sfrest` - admin server for connecting a site to Salesforce.
//!
//! Usage: `sfrest [config.json]`

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod config;
mod server;

use std::path::PathBuf;

use anyhow::Context;
use sfrest_core::OptionStore;
use sfrest_oauth::{ConfigKey, Overrides};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::ServerConfig;
use server::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sfrest=debug,sfrest_core=debug,sfrest_oauth=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::args()
        .nth(1)
        .map_or_else(ServerConfig::default_path, PathBuf::from);
    let config = ServerConfig::load(&config_path).await?;
    info!("Loaded config from {}", config_path.display());

    if let Some(dir) = config.database_path.parent() {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("creating {}", dir.display()))?;
    }
    let database = config.database_path.to_string_lossy().into_owned();
    let options = OptionStore::new(&database)
        .await
        .with_context(|| format!("opening {database}"))?;

    let overrides = Overrides::from_env();
    for key in ConfigKey::ALL {
        if overrides.contains(key) {
            info!("{} is set by {}", key.label(), key.override_name());
        }
    }

    info!(
        "Token backend: {:?}, redirect mode: {:?}",
        config.token_backend, config.redirect_mode
    );

    server::start_server(AppState::new(config, options, overrides)?).await
}
