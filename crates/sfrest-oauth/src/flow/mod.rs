//! Salesforce authorization-code flow.
//!
//! [`AuthorizationFlow::run`] is the entry point for one inbound admin
//! request. It decides the [`AuthorizationState`], and either hands back the
//! stored token, a link to the provider's login page, or performs the
//! code-for-token exchange.
//!
//! ```text
//! Unauthorized --(link shown, user logs in)--> HasPendingCode
//! HasPendingCode --(exchange succeeds)--> Authorized
//! HasPendingCode --(exchange fails)--> Fatal
//! ```

mod code;
mod guard;

pub use code::build_authorize_url;
pub use guard::{ExchangeGuard, ExchangePermit};

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{ConfigResolver, ConfigStore, ProviderConfig};
use crate::error::{AuthError, Result};
use crate::session::{AUTHORIZED_FLAG, Session};
use crate::store::TokenStore;
use crate::token::{ExchangeResult, TokenRecord};
use crate::transport::{DEFAULT_TIMEOUT, http_client};

/// Parameters of the inbound request the flow reacts to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct InboundRequest {
    /// Authorization code from the provider redirect.
    #[serde(default)]
    pub code: Option<String>,
}

impl InboundRequest {
    /// Request carrying an authorization code.
    #[must_use]
    pub fn with_code(code: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
        }
    }

    /// The authorization code, if present and non-empty.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref().filter(|code| !code.is_empty())
    }
}

/// Authorization state derived on every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationState {
    /// No token and no code.
    Unauthorized,
    /// No token, but the provider redirected back with a code.
    HasPendingCode,
    /// A token is stored or the session is marked authorized.
    Authorized,
}

/// How the caller presents [`FlowOutcome::RedirectToProvider`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RedirectMode {
    /// Render a "Log in with Salesforce" link.
    #[default]
    Link,
    /// Answer with an HTTP redirect.
    Http,
}

/// Flow behavior switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowOptions {
    /// Presentation of the authorize URL.
    pub redirect_mode: RedirectMode,
    /// Also clear the stored token when a data query fails.
    ///
    /// Off by default: a failed query only clears the session flag.
    pub invalidate_on_query_failure: bool,
    /// Timeout for provider calls.
    pub http_timeout: Duration,
}

impl Default for FlowOptions {
    fn default() -> Self {
        Self {
            redirect_mode: RedirectMode::Link,
            invalidate_on_query_failure: false,
            http_timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Result of [`AuthorizationFlow::run`].
#[derive(Debug)]
pub enum FlowOutcome {
    /// Authorized; use the token for API calls.
    Proceed(TokenRecord),
    /// Not authorized; send the user to this URL.
    RedirectToProvider(Url),
    /// Stop handling this request.
    Fatal(AuthError),
}

/// Drives the `OAuth2` authorization-code grant.
#[derive(Debug)]
pub struct AuthorizationFlow<C, T, S> {
    config: ConfigResolver<C>,
    tokens: T,
    session: S,
    http: Client,
    guard: Arc<ExchangeGuard>,
    options: FlowOptions,
}

impl<C, T, S> AuthorizationFlow<C, T, S>
where
    C: ConfigStore,
    T: TokenStore,
    S: Session,
{
    /// Creates a flow with default options and a private exchange guard.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: ConfigResolver<C>, tokens: T, session: S) -> Result<Self> {
        Ok(Self::from_shared(
            config,
            tokens,
            session,
            http_client(DEFAULT_TIMEOUT)?,
            Arc::new(ExchangeGuard::new()),
            FlowOptions::default(),
        ))
    }

    /// Creates a flow over process-wide parts, building no client of its own.
    ///
    /// `http` should already carry `options.http_timeout`; the guard is shared
    /// with every other flow of the process.
    #[must_use]
    pub const fn from_shared(
        config: ConfigResolver<C>,
        tokens: T,
        session: S,
        http: Client,
        guard: Arc<ExchangeGuard>,
        options: FlowOptions,
    ) -> Self {
        Self {
            config,
            tokens,
            session,
            http,
            guard,
            options,
        }
    }

    /// Sets the flow options.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client for a changed timeout cannot be built.
    pub fn with_options(mut self, options: FlowOptions) -> Result<Self> {
        if options.http_timeout != self.options.http_timeout {
            self.http = http_client(options.http_timeout)?;
        }
        self.options = options;
        Ok(self)
    }

    /// Current options.
    #[must_use]
    pub const fn options(&self) -> &FlowOptions {
        &self.options
    }

    /// The configuration resolver.
    #[must_use]
    pub const fn config(&self) -> &ConfigResolver<C> {
        &self.config
    }

    /// Derives the authorization state. Reads only; never writes.
    ///
    /// # Errors
    ///
    /// Returns an error if the token store cannot be read.
    pub async fn evaluate_state(&self, request: &InboundRequest) -> Result<AuthorizationState> {
        if self.session.get_flag(AUTHORIZED_FLAG) || self.current_token().await?.is_some() {
            return Ok(AuthorizationState::Authorized);
        }
        if request.code().is_some() {
            return Ok(AuthorizationState::HasPendingCode);
        }
        Ok(AuthorizationState::Unauthorized)
    }

    /// Builds the authorize URL for `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL does not parse.
    #[allow(clippy::unused_self)]
    pub fn build_authorize_url(&self, config: &ProviderConfig) -> Result<Url> {
        build_authorize_url(config)
    }

    /// Exchanges an authorization code for a token and persists it.
    ///
    /// On success the token is written to the store and the session is marked
    /// authorized. On failure nothing is written. Never call this twice with
    /// the same code: codes are single-use at the provider.
    ///
    /// # Errors
    ///
    /// - [`AuthError::ExchangeInProgress`] if another request holds this code
    /// - [`AuthError::TransportFailure`] if the request cannot complete
    /// - [`AuthError::BadStatus`] on a non-2xx answer
    /// - [`AuthError::MalformedBody`] if the body is empty or not JSON
    /// - [`AuthError::MissingFields`] if `access_token` or `instance_url` is absent
    pub async fn exchange_code(
        &self,
        code: &str,
        config: &ProviderConfig,
    ) -> Result<ExchangeResult> {
        let _permit = self.guard.acquire(code)?;

        let result = code::request_token(&self.http, code, config).await?;
        self.tokens.put(&result.to_record()).await?;
        self.session.set_flag(AUTHORIZED_FLAG);

        info!("Salesforce authorized, instance {}", result.instance_url);
        Ok(result)
    }

    /// Handles one inbound request.
    ///
    /// Provider configuration is only resolved when the request is not yet
    /// authorized.
    pub async fn run(&self, request: &InboundRequest) -> FlowOutcome {
        match self.try_run(request).await {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!("Authorization flow stopped: {error}");
                FlowOutcome::Fatal(error)
            }
        }
    }

    async fn try_run(&self, request: &InboundRequest) -> Result<FlowOutcome> {
        let mut state = self.evaluate_state(request).await?;
        debug!("Authorization state: {state:?}");

        if state == AuthorizationState::Authorized {
            if let Some(token) = self.current_token().await? {
                return Ok(FlowOutcome::Proceed(token));
            }
            debug!("Session marked authorized without a stored token, clearing flag");
            self.session.clear_flag(AUTHORIZED_FLAG);
            state = self.evaluate_state(request).await?;
        }

        match (state, request.code()) {
            (AuthorizationState::HasPendingCode, Some(code)) => {
                let config = self.config.provider_config()?;
                let result = self.exchange_code(code, &config).await?;
                Ok(FlowOutcome::Proceed(result.to_record()))
            }
            (AuthorizationState::Authorized, _) => match self.current_token().await? {
                Some(token) => Ok(FlowOutcome::Proceed(token)),
                None => self.redirect(),
            },
            _ => self.redirect(),
        }
    }

    fn redirect(&self) -> Result<FlowOutcome> {
        let config = self.config.provider_config()?;
        Ok(FlowOutcome::RedirectToProvider(
            self.build_authorize_url(&config)?,
        ))
    }

    /// The stored token, if it carries a non-empty access token.
    ///
    /// # Errors
    ///
    /// Returns an error if the token store cannot be read.
    pub async fn current_token(&self) -> Result<Option<TokenRecord>> {
        Ok(self.tokens.get().await?.filter(TokenRecord::is_present))
    }

    /// Reacts to a failed data query.
    ///
    /// The session flag is cleared by the query client itself; when
    /// [`FlowOptions::invalidate_on_query_failure`] is set the stored token is
    /// dropped as well.
    ///
    /// # Errors
    ///
    /// Returns an error if the token store cannot be cleared.
    pub async fn handle_query_failure(&self, error: &AuthError) -> Result<()> {
        if error.requires_reauth() && self.options.invalidate_on_query_failure {
            warn!("Dropping stored token after failed query");
            self.invalidate().await?;
        }
        Ok(())
    }

    /// Forgets the authorization: clears the session flag and the stored token.
    ///
    /// # Errors
    ///
    /// Returns an error if the token store cannot be cleared.
    pub async fn invalidate(&self) -> Result<()> {
        self.session.clear_flag(AUTHORIZED_FLAG);
        self.tokens.clear().await?;
        info!("Salesforce authorization cleared");
        Ok(())
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use crate::config::{ConfigKey, LayeredConfig, Overrides, SettingsRecord};
    use crate::session::MemorySession;
    use crate::store::MemoryTokenStore;

    type TestFlow = AuthorizationFlow<LayeredConfig, Arc<MemoryTokenStore>, Arc<MemorySession>>;

    fn settings(base: &str) -> SettingsRecord {
        SettingsRecord::new()
            .with(ConfigKey::ConsumerKey, "client")
            .with(ConfigKey::ConsumerSecret, "secret")
            .with(ConfigKey::CallbackUrl, "https://example.org/callback")
            .with(ConfigKey::LoginBaseUrl, base)
    }

    fn resolver(settings: SettingsRecord) -> ConfigResolver<LayeredConfig> {
        ConfigResolver::new(LayeredConfig::new(Overrides::none(), settings))
    }

    fn flow(
        store: Arc<MemoryTokenStore>,
        session: Arc<MemorySession>,
        settings: SettingsRecord,
    ) -> TestFlow {
        AuthorizationFlow::new(resolver(settings), store, session).unwrap()
    }

    #[tokio::test]
    async fn test_state_unauthorized() {
        let flow = flow(Arc::default(), Arc::default(), settings("https://login.salesforce.com"));
        let state = flow.evaluate_state(&InboundRequest::default()).await.unwrap();
        assert_eq!(state, AuthorizationState::Unauthorized);
    }

    #[tokio::test]
    async fn test_state_empty_code_is_unauthorized() {
        let flow = flow(Arc::default(), Arc::default(), settings("https://login.salesforce.com"));
        let state = flow.evaluate_state(&InboundRequest::with_code("")).await.unwrap();
        assert_eq!(state, AuthorizationState::Unauthorized);
    }

    #[tokio::test]
    async fn test_state_pending_code() {
        let flow = flow(Arc::default(), Arc::default(), settings("https://login.salesforce.com"));
        let state = flow.evaluate_state(&InboundRequest::with_code("ABC123")).await.unwrap();
        assert_eq!(state, AuthorizationState::HasPendingCode);
    }

    #[tokio::test]
    async fn test_state_authorized_by_store_regardless_of_session() {
        let store = Arc::new(MemoryTokenStore::with_record(TokenRecord::new("tok1", "https://x")));
        let session = Arc::new(MemorySession::new());
        let flow = flow(store, Arc::clone(&session), settings("https://login.salesforce.com"));

        assert!(!session.get_flag(AUTHORIZED_FLAG));
        let state = flow.evaluate_state(&InboundRequest::with_code("ABC123")).await.unwrap();
        assert_eq!(state, AuthorizationState::Authorized);
    }

    #[tokio::test]
    async fn test_state_empty_stored_token_is_not_authorized() {
        let store = Arc::new(MemoryTokenStore::with_record(TokenRecord::new("", "https://x")));
        let flow = flow(store, Arc::default(), settings("https://login.salesforce.com"));
        let state = flow.evaluate_state(&InboundRequest::default()).await.unwrap();
        assert_eq!(state, AuthorizationState::Unauthorized);
    }

    #[tokio::test]
    async fn test_state_authorized_by_session_flag() {
        let session = Arc::new(MemorySession::new());
        session.set_flag(AUTHORIZED_FLAG);
        let flow = flow(Arc::default(), session, settings("https://login.salesforce.com"));
        let state = flow.evaluate_state(&InboundRequest::default()).await.unwrap();
        assert_eq!(state, AuthorizationState::Authorized);
    }

    #[tokio::test]
    async fn test_run_stale_session_flag_falls_back_to_redirect() {
        let session = Arc::new(MemorySession::new());
        session.set_flag(AUTHORIZED_FLAG);
        let flow = flow(
            Arc::default(),
            Arc::clone(&session),
            settings("https://login.salesforce.com"),
        );

        let outcome = flow.run(&InboundRequest::default()).await;
        assert!(matches!(outcome, FlowOutcome::RedirectToProvider(_)));
        assert!(!session.get_flag(AUTHORIZED_FLAG));
    }

    #[tokio::test]
    async fn test_run_authorized_skips_config() {
        let store = Arc::new(MemoryTokenStore::with_record(TokenRecord::new("tok1", "https://x")));
        let flow = flow(store, Arc::default(), SettingsRecord::new());

        match flow.run(&InboundRequest::default()).await {
            FlowOutcome::Proceed(token) => assert_eq!(token.access_token, "tok1"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_run_missing_config_is_fatal() {
        let flow = flow(Arc::default(), Arc::default(), SettingsRecord::new());
        let outcome = flow.run(&InboundRequest::default()).await;
        assert!(matches!(outcome, FlowOutcome::Fatal(AuthError::Config(_))));
    }

    #[tokio::test]
    async fn test_invalidate_clears_session_and_store() {
        let store = Arc::new(MemoryTokenStore::with_record(TokenRecord::new("tok1", "https://x")));
        let session = Arc::new(MemorySession::new());
        session.set_flag(AUTHORIZED_FLAG);
        let flow = flow(
            Arc::clone(&store),
            Arc::clone(&session),
            settings("https://login.salesforce.com"),
        );

        flow.invalidate().await.unwrap();
        assert!(!session.get_flag(AUTHORIZED_FLAG));
        assert!(store.get().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_query_failure_keeps_token_by_default() {
        let store = Arc::new(MemoryTokenStore::with_record(TokenRecord::new("tok1", "https://x")));
        let flow = flow(
            Arc::clone(&store),
            Arc::default(),
            settings("https://login.salesforce.com"),
        );
        let error = AuthError::QueryFailed {
            status: Some(401),
            url: "https://x".into(),
            body: String::new(),
        };

        flow.handle_query_failure(&error).await.unwrap();
        assert!(store.get().await.unwrap().is_some());

        let flow = flow
            .with_options(FlowOptions {
                invalidate_on_query_failure: true,
                ..FlowOptions::default()
            })
            .unwrap();
        flow.handle_query_failure(&error).await.unwrap();
        assert!(store.get().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_shared_guard_rejects_exchange_without_request() {
        let guard = Arc::new(ExchangeGuard::new());
        let store = Arc::new(MemoryTokenStore::new());
        let options = FlowOptions {
            redirect_mode: RedirectMode::Http,
            ..FlowOptions::default()
        };
        let flow = AuthorizationFlow::from_shared(
            resolver(settings("https://login.salesforce.com")),
            Arc::clone(&store),
            Arc::new(MemorySession::new()),
            http_client(options.http_timeout).unwrap(),
            Arc::clone(&guard),
            options,
        );
        assert_eq!(flow.options().redirect_mode, RedirectMode::Http);
        let config = flow.config().provider_config().unwrap();

        let _held = guard.acquire("ABC123").unwrap();
        let err = flow.exchange_code("ABC123", &config).await.unwrap_err();
        assert!(matches!(err, AuthError::ExchangeInProgress));
        assert_eq!(store.writes(), 0);
    }
}
