//! Process configuration.
//!
//! Read from `<config dir>/sfrest/config.json` (or the path given on the
//! command line), then overridden by `SFREST_*` environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use sfrest_core::TokenBackendKind;
use sfrest_oauth::{DEMO_CONTACT_QUERY, FlowOptions, RedirectMode};

/// Server settings that persist across restarts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address.
    pub bind: String,
    /// `SQLite` database file.
    pub database_path: PathBuf,
    /// Where the token record is kept.
    pub token_backend: TokenBackendKind,
    /// Link or HTTP redirect to the Salesforce login page.
    pub redirect_mode: RedirectMode,
    /// Drop the stored token when the demo query fails.
    pub invalidate_on_query_failure: bool,
    /// Timeout for provider calls, in seconds.
    pub http_timeout_secs: u64,
    /// Open the admin page in a browser at startup.
    pub open_browser: bool,
    /// SOQL run on the authorize tab.
    pub query: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8089".to_string(),
            database_path: data_dir().join("sfrest.db"),
            token_backend: TokenBackendKind::Sqlite,
            redirect_mode: RedirectMode::Link,
            invalidate_on_query_failure: false,
            http_timeout_secs: 30,
            open_browser: false,
            query: DEMO_CONTACT_QUERY.to_string(),
        }
    }
}

impl ServerConfig {
    /// Default config file location.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sfrest")
            .join("config.json")
    }

    /// Loads the config file (defaults when absent) and applies the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or an
    /// environment variable has an invalid value.
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if tokio::fs::try_exists(path).await.unwrap_or(false) {
            let contents = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&contents).with_context(|| format!("parsing {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Applies `SFREST_*` overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if a value cannot be parsed.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<()> {
        if let Some(bind) = lookup("SFREST_BIND") {
            self.bind = bind;
        }
        if let Some(path) = lookup("SFREST_DATABASE") {
            self.database_path = PathBuf::from(path);
        }
        if let Some(backend) = lookup("SFREST_TOKEN_BACKEND") {
            self.token_backend = match backend.as_str() {
                "sqlite" => TokenBackendKind::Sqlite,
                "keyring" => TokenBackendKind::Keyring,
                other => bail!("SFREST_TOKEN_BACKEND: unknown backend '{other}'"),
            };
        }
        if let Some(mode) = lookup("SFREST_REDIRECT_MODE") {
            self.redirect_mode = match mode.as_str() {
                "link" => RedirectMode::Link,
                "http" => RedirectMode::Http,
                other => bail!("SFREST_REDIRECT_MODE: unknown mode '{other}'"),
            };
        }
        if let Some(flag) = lookup("SFREST_INVALIDATE_ON_QUERY_FAILURE") {
            self.invalidate_on_query_failure =
                parse_bool("SFREST_INVALIDATE_ON_QUERY_FAILURE", &flag)?;
        }
        if let Some(secs) = lookup("SFREST_HTTP_TIMEOUT_SECS") {
            self.http_timeout_secs = secs
                .parse()
                .with_context(|| format!("SFREST_HTTP_TIMEOUT_SECS: '{secs}' is not a number"))?;
        }
        if let Some(flag) = lookup("SFREST_OPEN_BROWSER") {
            self.open_browser = parse_bool("SFREST_OPEN_BROWSER", &flag)?;
        }
        Ok(())
    }

    /// Provider call timeout.
    #[must_use]
    pub const fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Authorization flow options derived from this config.
    #[must_use]
    pub const fn flow_options(&self) -> FlowOptions {
        FlowOptions {
            redirect_mode: self.redirect_mode,
            invalidate_on_query_failure: self.invalidate_on_query_failure,
            http_timeout: self.http_timeout(),
        }
    }
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sfrest")
}

fn parse_bool(name: &str, value: &str) -> anyhow::Result<bool> {
    match value {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        other => bail!("{name}: expected true/false, got '{other}'"),
    }
}
