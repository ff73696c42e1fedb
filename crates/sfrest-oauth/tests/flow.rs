//! End-to-end tests for the authorization flow and authorized queries.
//!
//! A `wiremock` server stands in for both the Salesforce login host and the
//! tenant instance.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::similar_names)]

use std::sync::Arc;

use sfrest_oauth::{
    AUTHORIZED_FLAG, AuthError, AuthorizationFlow, AuthorizationState, AuthorizedHttpClient,
    ConfigKey, ConfigResolver, FlowOutcome, InboundRequest, LayeredConfig, MemorySession,
    MemoryTokenStore, Overrides, Session, SettingsRecord, TokenRecord, TokenStore,
};
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CALLBACK_URL: &str =
    "https://example.org/wp-admin/options-general.php?page=sfrest&tab=authorize";

type Flow = AuthorizationFlow<LayeredConfig, Arc<MemoryTokenStore>, Arc<MemorySession>>;

struct Harness {
    server: MockServer,
    store: Arc<MemoryTokenStore>,
    session: Arc<MemorySession>,
    flow: Flow,
}

async fn harness_with_store(store: MemoryTokenStore) -> Harness {
    let server = MockServer::start().await;
    let store = Arc::new(store);
    let session = Arc::new(MemorySession::new());

    let settings = SettingsRecord::new()
        .with(ConfigKey::ConsumerKey, "settings-key")
        .with(ConfigKey::ConsumerSecret, "settings-secret")
        .with(ConfigKey::CallbackUrl, CALLBACK_URL)
        .with(ConfigKey::LoginBaseUrl, server.uri());
    let overrides = Overrides::none().with(ConfigKey::ConsumerKey, "env-key");

    let flow = AuthorizationFlow::new(
        ConfigResolver::new(LayeredConfig::new(overrides, settings)),
        Arc::clone(&store),
        Arc::clone(&session),
    )
    .unwrap();

    Harness {
        server,
        store,
        session,
        flow,
    }
}

async fn harness() -> Harness {
    harness_with_store(MemoryTokenStore::new()).await
}

#[tokio::test]
async fn test_no_code_redirects_to_provider() {
    let h = harness().await;

    match h.flow.run(&InboundRequest::default()).await {
        FlowOutcome::RedirectToProvider(url) => {
            assert!(url.as_str().starts_with(&h.server.uri()));
            assert!(url.as_str().contains("response_type=code"));
            assert!(url.as_str().contains("client_id=env-key"));
            let redirect = url
                .query_pairs()
                .find(|(k, _)| k == "redirect_uri")
                .map(|(_, v)| v.into_owned());
            assert_eq!(redirect.as_deref(), Some(CALLBACK_URL));
        }
        other => panic!("expected redirect, got {other:?}"),
    }
    assert_eq!(h.store.writes(), 0);
}

#[tokio::test]
async fn test_code_exchange_persists_token() {
    let h = harness().await;

    Mock::given(method("POST"))
        .and(path("/services/oauth2/token"))
        .and(body_string_contains("code=ABC123"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("client_id=env-key"))
        .and(body_string_contains("client_secret=settings-secret"))
        .and(body_string_contains("redirect_uri=https%3A%2F%2Fexample.org"))
        .respond_with(ResponseTemplate::new(200).set_body_string(concat!(
            r#"{"access_token":"tok1","instance_url":"https://x.my.salesforce.com","#,
            r#""token_type":"Bearer"}"#,
        )))
        .expect(1)
        .mount(&h.server)
        .await;

    let outcome = h.flow.run(&InboundRequest::with_code("ABC123")).await;
    let expected = TokenRecord::new("tok1", "https://x.my.salesforce.com");

    match outcome {
        FlowOutcome::Proceed(token) => assert_eq!(token, expected),
        other => panic!("expected proceed, got {other:?}"),
    }
    assert_eq!(h.store.get().await.unwrap(), Some(expected));
    assert!(h.session.get_flag(AUTHORIZED_FLAG));

    // Authorized now, so the same code is never exchanged again.
    let again = h.flow.run(&InboundRequest::with_code("ABC123")).await;
    assert!(matches!(again, FlowOutcome::Proceed(_)));
}

#[tokio::test]
async fn test_missing_access_token_writes_nothing() {
    let h = harness().await;

    Mock::given(method("POST"))
        .and(path("/services/oauth2/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"instance_url":"https://x.my.salesforce.com"}"#),
        )
        .mount(&h.server)
        .await;

    let outcome = h.flow.run(&InboundRequest::with_code("ABC123")).await;
    match outcome {
        FlowOutcome::Fatal(AuthError::MissingFields { missing, .. }) => {
            assert_eq!(missing, vec!["access_token"]);
        }
        other => panic!("expected missing fields, got {other:?}"),
    }
    assert_eq!(h.store.writes(), 0);
    assert!(!h.session.get_flag(AUTHORIZED_FLAG));
}

#[tokio::test]
async fn test_empty_token_fields_write_nothing() {
    let h = harness().await;

    Mock::given(method("POST"))
        .and(path("/services/oauth2/token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(r#"{"access_token":"","instance_url":""}"#),
        )
        .mount(&h.server)
        .await;

    let outcome = h.flow.run(&InboundRequest::with_code("ABC123")).await;
    match outcome {
        FlowOutcome::Fatal(AuthError::MissingFields { missing, .. }) => {
            assert_eq!(missing, vec!["access_token", "instance_url"]);
        }
        other => panic!("expected missing fields, got {other:?}"),
    }
    assert_eq!(h.store.writes(), 0);
    assert!(!h.session.get_flag(AUTHORIZED_FLAG));
}

#[tokio::test]
async fn test_bad_status_writes_nothing_and_redacts_secret() {
    let h = harness().await;

    Mock::given(method("POST"))
        .and(path("/services/oauth2/token"))
        .respond_with(ResponseTemplate::new(400).set_body_string(
            r#"{"error":"invalid_grant","error_description":"expired authorization code"}"#,
        ))
        .mount(&h.server)
        .await;

    let outcome = h.flow.run(&InboundRequest::with_code("ABC123")).await;
    let FlowOutcome::Fatal(error) = outcome else {
        panic!("expected fatal outcome");
    };
    assert!(matches!(error, AuthError::BadStatus { status: 400, .. }));

    let diagnostic = error.diagnostic();
    assert!(diagnostic.contains("/services/oauth2/token"));
    assert!(diagnostic.contains("invalid_grant"));
    assert!(!diagnostic.contains("settings-secret"));
    assert!(!diagnostic.contains("ABC123"));
    assert_eq!(h.store.writes(), 0);
}

#[tokio::test]
async fn test_empty_body_is_malformed() {
    let h = harness().await;

    Mock::given(method("POST"))
        .and(path("/services/oauth2/token"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&h.server)
        .await;

    let outcome = h.flow.run(&InboundRequest::with_code("ABC123")).await;
    assert!(matches!(
        outcome,
        FlowOutcome::Fatal(AuthError::MalformedBody { .. })
    ));
    assert_eq!(h.store.writes(), 0);
}

#[tokio::test]
async fn test_transport_failure() {
    let h = harness().await;
    let config = h.flow.config().provider_config().unwrap();
    drop(h.server);

    let err = h.flow.exchange_code("ABC123", &config).await.unwrap_err();
    assert!(matches!(err, AuthError::TransportFailure { .. }));
    assert_eq!(h.store.writes(), 0);
}

#[tokio::test]
async fn test_query_empty_result() {
    let h = harness().await;
    let token = TokenRecord::new("tok1", h.server.uri());

    Mock::given(method("GET"))
        .and(path("/services/data/v35.0/query"))
        .and(query_param("q", "SELECT Name, Id from Contact LIMIT 100"))
        .and(header("Authorization", "OAuth tok1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"totalSize":0,"done":true,"records":[]}"#),
        )
        .expect(1)
        .mount(&h.server)
        .await;

    let client = AuthorizedHttpClient::new(Arc::clone(&h.session)).unwrap();
    let result = client
        .query(sfrest_oauth::DEMO_CONTACT_QUERY, &token)
        .await
        .unwrap();
    assert_eq!(result.total_size, 0);
    assert!(result.records.is_empty());
}

#[tokio::test]
async fn test_query_records() {
    let h = harness().await;
    let token = TokenRecord::new("tok1", h.server.uri());

    Mock::given(method("GET"))
        .and(path("/services/data/v35.0/query"))
        .respond_with(ResponseTemplate::new(200).set_body_string(concat!(
            r#"{"totalSize":1,"done":true,"records":["#,
            r#"{"attributes":{"type":"Contact"},"Name":"Ada","Id":"003"}]}"#,
        )))
        .mount(&h.server)
        .await;

    let client = AuthorizedHttpClient::new(Arc::clone(&h.session)).unwrap();
    let result = client.query("SELECT Name, Id from Contact", &token).await.unwrap();
    assert_eq!(result.total_size, 1);
    assert_eq!(result.records[0]["Name"], "Ada");
}

#[tokio::test]
async fn test_query_unauthorized_clears_session_but_keeps_token() {
    let stored = TokenRecord::new("stale", "https://placeholder.invalid");
    let h = harness_with_store(MemoryTokenStore::with_record(stored)).await;
    h.session.set_flag(AUTHORIZED_FLAG);
    let token = TokenRecord::new("stale", h.server.uri());

    Mock::given(method("GET"))
        .and(path("/services/data/v35.0/query"))
        .respond_with(ResponseTemplate::new(401).set_body_string(
            r#"[{"message":"Session expired or invalid","errorCode":"INVALID_SESSION_ID"}]"#,
        ))
        .mount(&h.server)
        .await;

    let client = AuthorizedHttpClient::new(Arc::clone(&h.session)).unwrap();
    let err = client.query("SELECT Id FROM Contact", &token).await.unwrap_err();
    assert!(matches!(err, AuthError::QueryFailed { status: Some(401), .. }));
    assert!(err.requires_reauth());
    assert!(!h.session.get_flag(AUTHORIZED_FLAG));

    h.flow.handle_query_failure(&err).await.unwrap();
    let persisted = h.store.get().await.unwrap().expect("token kept");
    assert_eq!(persisted.access_token, "stale");
    let state = h.flow.evaluate_state(&InboundRequest::default()).await.unwrap();
    assert_eq!(state, AuthorizationState::Authorized);
}

#[tokio::test]
async fn test_query_forbidden_is_query_failed() {
    let h = harness().await;
    let token = TokenRecord::new("tok1", h.server.uri());

    Mock::given(method("GET"))
        .and(path("/services/data/v35.0/query"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&h.server)
        .await;

    let client = AuthorizedHttpClient::new(Arc::clone(&h.session)).unwrap();
    let err = client.query("SELECT Id FROM Contact", &token).await.unwrap_err();
    assert!(matches!(err, AuthError::QueryFailed { status: Some(403), .. }));
}

#[tokio::test]
async fn test_query_missing_total_size() {
    let h = harness().await;
    h.session.set_flag(AUTHORIZED_FLAG);
    let token = TokenRecord::new("tok1", h.server.uri());

    Mock::given(method("GET"))
        .and(path("/services/data/v35.0/query"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"records":[]}"#))
        .mount(&h.server)
        .await;

    let client = AuthorizedHttpClient::new(Arc::clone(&h.session)).unwrap();
    let err = client.query("SELECT Id FROM Contact", &token).await.unwrap_err();
    assert!(matches!(err, AuthError::MissingFields { .. }));
    // Only transport/status failures drop the session flag.
    assert!(h.session.get_flag(AUTHORIZED_FLAG));
}

#[tokio::test]
async fn test_query_empty_body_clears_session() {
    let h = harness().await;
    h.session.set_flag(AUTHORIZED_FLAG);
    let token = TokenRecord::new("tok1", h.server.uri());

    Mock::given(method("GET"))
        .and(path("/services/data/v35.0/query"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&h.server)
        .await;

    let client = AuthorizedHttpClient::new(Arc::clone(&h.session)).unwrap();
    let err = client.query("SELECT Id FROM Contact", &token).await.unwrap_err();
    assert!(matches!(err, AuthError::QueryFailed { status: Some(200), .. }));
    assert!(!h.session.get_flag(AUTHORIZED_FLAG));
}

#[tokio::test]
async fn test_query_transport_failure_is_query_failed() {
    let h = harness().await;
    h.session.set_flag(AUTHORIZED_FLAG);
    let token = TokenRecord::new("tok1", h.server.uri());
    drop(h.server);

    let client = AuthorizedHttpClient::new(Arc::clone(&h.session)).unwrap();
    let err = client.query("SELECT Id FROM Contact", &token).await.unwrap_err();
    assert!(matches!(err, AuthError::QueryFailed { status: None, .. }));
    assert!(!h.session.get_flag(AUTHORIZED_FLAG));
}
