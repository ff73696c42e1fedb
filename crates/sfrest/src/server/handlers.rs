//! Admin page handlers.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Form, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Redirect, Response};
use serde::Deserialize;
use sfrest_core::{
    AuthorizePage, Error, SettingsError, authorize_page, connection_status, disconnect,
    settings_fields,
};
use sfrest_oauth::{AuthError, InboundRequest, RedirectMode, SettingsRecord};
use tracing::{error, info, warn};

use super::{AppState, render};

type HandlerResult = Result<Response, (StatusCode, String)>;

/// Admin page tabs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    /// Connection settings form.
    Settings,
    /// Connect and demo query.
    Authorize,
}

impl Tab {
    /// Picks the tab from the `tab` query parameter. Anything but `authorize`
    /// shows the settings tab.
    #[must_use]
    pub fn from_query(tab: Option<&str>) -> Self {
        match tab {
            Some("authorize") => Self::Authorize,
            _ => Self::Settings,
        }
    }

    /// Query parameter value.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Settings => "salesforce_settings",
            Self::Authorize => "authorize",
        }
    }

    /// Navigation caption.
    #[must_use]
    pub const fn caption(self) -> &'static str {
        match self {
            Self::Settings => "Settings",
            Self::Authorize => "Authorize",
        }
    }
}

/// Query parameters of the admin page.
#[derive(Debug, Default, Deserialize)]
pub struct AdminQuery {
    /// Selected tab.
    pub tab: Option<String>,
    /// Authorization code appended by Salesforce on the callback.
    pub code: Option<String>,
}

/// `GET /`
pub async fn admin_page(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AdminQuery>,
) -> HandlerResult {
    match Tab::from_query(query.tab.as_deref()) {
        Tab::Settings => settings_tab(&state, &[], StatusCode::OK).await,
        Tab::Authorize => authorize_tab(&state, InboundRequest { code: query.code }).await,
    }
}

/// `POST /settings`
pub async fn save_settings(
    State(state): State<Arc<AppState>>,
    Form(form): Form<HashMap<String, String>>,
) -> HandlerResult {
    let record = SettingsRecord::sanitized(form);

    match state.settings.save(&record, &state.overrides).await {
        Ok(()) => {
            info!("Salesforce settings saved");
            Ok(Redirect::to(&format!("/?tab={}", Tab::Settings.key())).into_response())
        }
        Err(Error::Validation(errors)) => {
            warn!("Rejected settings: {} invalid field(s)", errors.len());
            settings_tab(&state, &errors, StatusCode::UNPROCESSABLE_ENTITY).await
        }
        Err(e) => Err(internal_error(&e)),
    }
}

/// `POST /token/clear`
pub async fn clear_token(State(state): State<Arc<AppState>>) -> HandlerResult {
    let flow = state.flow().await.map_err(|e| internal_error(&e))?;
    disconnect(&flow).await.map_err(|e| internal_error(&e))?;
    info!("Disconnected from Salesforce");
    Ok(Redirect::to(&format!("/?tab={}", Tab::Settings.key())).into_response())
}

async fn settings_tab(
    state: &AppState,
    errors: &[SettingsError],
    status: StatusCode,
) -> HandlerResult {
    let record = state.settings.load().await.map_err(|e| internal_error(&e))?;
    let flow = state.flow().await.map_err(|e| internal_error(&e))?;
    let since = state.tokens.authorized_at().await.map_err(|e| internal_error(&e))?;
    let connection = connection_status(&flow)
        .await
        .map_err(|e| internal_error(&e))?
        .with_since(since);

    let fields = settings_fields(&record, &state.overrides);
    Ok((status, Html(render::settings(&fields, errors, &connection))).into_response())
}

async fn authorize_tab(state: &AppState, request: InboundRequest) -> HandlerResult {
    let flow = state.flow().await.map_err(|e| internal_error(&e))?;

    match authorize_page(&flow, &state.client, &request, &state.config.query).await {
        AuthorizePage::Redirect { url, mode: RedirectMode::Http } => {
            Ok((StatusCode::FOUND, [(header::LOCATION, url.to_string())]).into_response())
        }
        AuthorizePage::Redirect { url, mode: RedirectMode::Link } => {
            Ok(Html(render::authorize_link(&url)).into_response())
        }
        AuthorizePage::JustAuthorized { instance_url } => {
            Ok(Html(render::authorized(&instance_url)).into_response())
        }
        AuthorizePage::Connected { instance_url, result } => {
            Ok(Html(render::connected(&instance_url, &result)).into_response())
        }
        AuthorizePage::Failed { error } => {
            error!("Authorize request failed: {error}");
            Err((status_for(&error), error.diagnostic()))
        }
    }
}

/// Status code for a flow failure.
const fn status_for(error: &AuthError) -> StatusCode {
    match error {
        AuthError::Config(_) | AuthError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        AuthError::ExchangeInProgress => StatusCode::CONFLICT,
        AuthError::TransportFailure { .. }
        | AuthError::BadStatus { .. }
        | AuthError::MalformedBody { .. }
        | AuthError::MissingFields { .. }
        | AuthError::QueryFailed { .. } => StatusCode::BAD_GATEWAY,
    }
}

fn internal_error(e: &Error) -> (StatusCode, String) {
    error!("Admin request failed: {e}");
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::similar_names)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use sfrest_core::OptionStore;
    use sfrest_oauth::{AUTHORIZED_FLAG, ConfigKey, Overrides, Session, TokenRecord, TokenStore};
    use tower::ServiceExt;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::config::ServerConfig;
    use crate::server::router;

    async fn state(config: ServerConfig, overrides: Overrides) -> Arc<AppState> {
        let options = OptionStore::in_memory().await.unwrap();
        Arc::new(AppState::new(config, options, overrides).unwrap())
    }

    async fn save_valid_settings(state: &AppState, base: &str) {
        let record = SettingsRecord::new()
            .with(ConfigKey::ConsumerKey, "key")
            .with(ConfigKey::ConsumerSecret, "secret")
            .with(ConfigKey::CallbackUrl, "http://127.0.0.1:8089/?tab=authorize")
            .with(ConfigKey::LoginBaseUrl, base);
        state.settings.save(&record, &Overrides::none()).await.unwrap();
    }

    async fn get(state: &Arc<AppState>, uri: &str) -> (StatusCode, Option<String>, String) {
        let response = router(Arc::clone(state))
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .map(|v| v.to_str().unwrap().to_string());
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, location, String::from_utf8(body.to_vec()).unwrap())
    }

    #[test]
    fn test_tab_selection() {
        assert_eq!(Tab::from_query(Some("authorize")), Tab::Authorize);
        assert_eq!(Tab::from_query(Some("salesforce_settings")), Tab::Settings);
        assert_eq!(Tab::from_query(Some("fieldmaps")), Tab::Settings);
        assert_eq!(Tab::from_query(None), Tab::Settings);
    }

    #[tokio::test]
    async fn test_settings_tab_renders_form() {
        let state = state(ServerConfig::default(), Overrides::none()).await;
        let (status, _, body) = get(&state, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(r#"name="salesforce_consumer_key""#));
        assert!(body.contains("Not connected."));
    }

    #[tokio::test]
    async fn test_settings_tab_shows_connected_since() {
        let state = state(ServerConfig::default(), Overrides::none()).await;
        state
            .tokens
            .put(&TokenRecord::new("tok1", "https://na1.salesforce.com"))
            .await
            .unwrap();

        let (status, _, body) = get(&state, "/?tab=salesforce_settings").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Connected to https://na1.salesforce.com since "));
        assert!(!body.contains("tok1"));
    }

    #[tokio::test]
    async fn test_save_settings_rejects_invalid() {
        let state = state(ServerConfig::default(), Overrides::none()).await;
        let response = router(Arc::clone(&state))
            .oneshot(
                Request::post("/settings")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from(concat!(
                        "salesforce_consumer_key=key&salesforce_consumer_secret=",
                        "&salesforce_callback_url=nope",
                        "&salesforce_base_url=https%3A%2F%2Flogin.salesforce.com",
                    )))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(state.settings.load().await.unwrap(), SettingsRecord::new());
    }

    #[tokio::test]
    async fn test_save_settings_persists() {
        let state = state(ServerConfig::default(), Overrides::none()).await;
        let response = router(Arc::clone(&state))
            .oneshot(
                Request::post("/settings")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from(concat!(
                        "salesforce_consumer_key=+key+&salesforce_consumer_secret=secret",
                        "&salesforce_callback_url=https%3A%2F%2Fexample.org%2Fcb",
                        "&salesforce_base_url=https%3A%2F%2Flogin.salesforce.com",
                    )))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.status().is_redirection());
        let saved = state.settings.load().await.unwrap();
        assert_eq!(saved.value(ConfigKey::ConsumerKey), "key");
    }

    #[tokio::test]
    async fn test_authorize_tab_link_mode() {
        let state = state(ServerConfig::default(), Overrides::none()).await;
        save_valid_settings(&state, "https://login.salesforce.com").await;

        let (status, location, body) = get(&state, "/?tab=authorize").await;
        assert_eq!(status, StatusCode::OK);
        assert!(location.is_none());
        assert!(body.contains(concat!(
            "https://login.salesforce.com/services/oauth2/authorize",
            "?response_type=code&amp;client_id=key"
        )));
    }

    #[tokio::test]
    async fn test_authorize_tab_http_mode() {
        let config = ServerConfig {
            redirect_mode: RedirectMode::Http,
            ..ServerConfig::default()
        };
        let state = state(config, Overrides::none()).await;
        save_valid_settings(&state, "https://login.salesforce.com").await;

        let (status, location, _) = get(&state, "/?tab=authorize").await;
        assert_eq!(status, StatusCode::FOUND);
        assert!(
            location
                .unwrap()
                .starts_with("https://login.salesforce.com/services/oauth2/authorize?")
        );
    }

    #[tokio::test]
    async fn test_authorize_tab_missing_settings_is_fatal() {
        let state = state(ServerConfig::default(), Overrides::none()).await;
        let (status, _, body) = get(&state, "/?tab=authorize").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.contains("is not set"));
    }

    #[tokio::test]
    async fn test_callback_exchanges_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/services/oauth2/token"))
            .and(body_string_contains("code=ABC123"))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                r#"{{"access_token":"tok1","instance_url":"{}"}}"#,
                server.uri()
            )))
            .expect(1)
            .mount(&server)
            .await;

        let state = state(ServerConfig::default(), Overrides::none()).await;
        save_valid_settings(&state, &server.uri()).await;

        let (status, _, body) = get(&state, "/?tab=authorize&code=ABC123").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Salesforce is already authorized."));
        assert!(state.session.get_flag(AUTHORIZED_FLAG));
        assert_eq!(
            state.tokens.get().await.unwrap(),
            Some(TokenRecord::new("tok1", server.uri()))
        );
    }

    #[tokio::test]
    async fn test_code_held_by_another_request_is_conflict() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/services/oauth2/token"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let state = state(ServerConfig::default(), Overrides::none()).await;
        save_valid_settings(&state, &server.uri()).await;
        let _held = state.guard.acquire("ABC123").unwrap();

        let (status, _, body) = get(&state, "/?tab=authorize&code=ABC123").await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body.contains("already in progress"));
        assert!(state.tokens.get().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_query_failure_reports_bad_gateway() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/services/data/v35.0/query"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Session expired or invalid"))
            .mount(&server)
            .await;

        let state = state(ServerConfig::default(), Overrides::none()).await;
        save_valid_settings(&state, &server.uri()).await;
        state.tokens.put(&TokenRecord::new("tok1", server.uri())).await.unwrap();
        state.session.set_flag(AUTHORIZED_FLAG);

        let (status, _, body) = get(&state, "/?tab=authorize").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body.contains("Session expired or invalid"));
        assert!(!state.session.get_flag(AUTHORIZED_FLAG));
        assert!(state.tokens.get().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_clear_token_disconnects() {
        let state = state(ServerConfig::default(), Overrides::none()).await;
        state
            .tokens
            .put(&TokenRecord::new("tok1", "https://na1.salesforce.com"))
            .await
            .unwrap();
        state.session.set_flag(AUTHORIZED_FLAG);

        let response = router(Arc::clone(&state))
            .oneshot(Request::post("/token/clear").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(response.status().is_redirection());
        assert!(state.tokens.get().await.unwrap().is_none());
        assert!(!state.session.get_flag(AUTHORIZED_FLAG));
    }
}
