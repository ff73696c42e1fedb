//! Admin HTTP server.
//!
//! Serves the two-tab admin page and its form posts:
//! - GET  /              - Settings tab, or `?tab=authorize` for the authorize tab
//! - POST /settings      - Save the connection settings
//! - POST /token/clear   - Disconnect (drop session flag and stored token)

pub mod handlers;
mod render;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use sfrest_core::{OptionStore, SettingsRepository, TokenBackend};
use sfrest_oauth::{
    AuthorizationFlow, AuthorizedHttpClient, ConfigResolver, ExchangeGuard, LayeredConfig,
    MemorySession, Overrides, http_client,
};
use tokio::net::TcpListener;
use tracing::info;

use crate::config::ServerConfig;

/// Flow type used by the handlers.
pub type AdminFlow = AuthorizationFlow<LayeredConfig, TokenBackend, Arc<MemorySession>>;

/// State shared across handlers.
#[derive(Debug)]
pub struct AppState {
    /// Process configuration.
    pub config: ServerConfig,
    /// Environment overrides, snapshotted at startup.
    pub overrides: Overrides,
    /// Settings record storage.
    pub settings: SettingsRepository,
    /// Token record storage.
    pub tokens: TokenBackend,
    /// Admin session. One operator per process.
    pub session: Arc<MemorySession>,
    /// Serializes exchanges of the same code across requests.
    pub guard: Arc<ExchangeGuard>,
    /// Client for Data API queries.
    pub client: AuthorizedHttpClient<Arc<MemorySession>>,
    http: reqwest::Client,
}

impl AppState {
    /// Builds the state from open storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        config: ServerConfig,
        options: OptionStore,
        overrides: Overrides,
    ) -> anyhow::Result<Self> {
        let http = http_client(config.http_timeout())?;
        let session = Arc::new(MemorySession::new());
        let client = AuthorizedHttpClient::with_http_client(http.clone(), Arc::clone(&session));

        Ok(Self {
            tokens: TokenBackend::new(config.token_backend, options.clone()),
            settings: SettingsRepository::new(options),
            guard: Arc::new(ExchangeGuard::default()),
            config,
            overrides,
            session,
            client,
            http,
        })
    }

    /// Builds an authorization flow over the current settings.
    ///
    /// Settings are reloaded on every request so a save takes effect at once.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings cannot be loaded.
    pub async fn flow(&self) -> sfrest_core::Result<AdminFlow> {
        let settings = self.settings.load().await?;
        let resolver = ConfigResolver::new(LayeredConfig::new(self.overrides.clone(), settings));

        Ok(AuthorizationFlow::from_shared(
            resolver,
            self.tokens.clone(),
            Arc::clone(&self.session),
            self.http.clone(),
            Arc::clone(&self.guard),
            self.config.flow_options(),
        ))
    }
}

/// Builds the router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::admin_page))
        .route("/settings", post(handlers::save_settings))
        .route("/token/clear", post(handlers::clear_token))
        .with_state(state)
}

/// Starts the admin server and serves until shutdown.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn start_server(state: AppState) -> anyhow::Result<()> {
    let addr = state.config.bind.clone();
    let open_browser = state.config.open_browser;
    let app = router(Arc::new(state));

    let listener = TcpListener::bind(&addr).await?;
    let local = listener.local_addr()?;
    info!("Admin server listening on http://{local}");

    if open_browser {
        let url = format!("http://{local}/");
        if let Err(e) = opener::open(&url) {
            tracing::warn!("Could not open browser at {url}: {e}");
        }
    }

    axum::serve(listener, app).await?;
    Ok(())
}
