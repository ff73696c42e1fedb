//! Authorization-code grant requests.

use reqwest::Client;
use tracing::{debug, warn};
use url::Url;
use url::form_urlencoded::byte_serialize;

use crate::config::ProviderConfig;
use crate::error::{AuthError, Result, redact_form};
use crate::token::ExchangeResult;

/// Form fields never echoed into diagnostics.
const SECRET_FIELDS: &[&str] = &["code", "client_secret"];

/// Builds the link that sends the user to the Salesforce login page.
///
/// `redirect_uri` is percent-encoded; `client_id` is inserted as-is, since
/// consumer keys are URL-safe.
///
/// # Errors
///
/// Returns [`AuthError::Config`] if the assembled URL does not parse.
pub fn build_authorize_url(config: &ProviderConfig) -> Result<Url> {
    let redirect_uri: String = byte_serialize(config.callback_url.as_bytes()).collect();
    let raw = format!(
        "{}?response_type=code&client_id={}&redirect_uri={redirect_uri}",
        config.authorize_endpoint(),
        config.client_id,
    );
    Url::parse(&raw).map_err(|e| AuthError::Config(format!("authorize URL: {e}")))
}

/// Posts the authorization code to the token endpoint and parses the reply.
///
/// Performs exactly one request; no retry.
pub(crate) async fn request_token(
    http: &Client,
    code: &str,
    config: &ProviderConfig,
) -> Result<ExchangeResult> {
    let token_url = config.token_endpoint();
    let fields = [
        ("code", code),
        ("grant_type", "authorization_code"),
        ("client_id", config.client_id.as_str()),
        ("client_secret", config.client_secret.as_str()),
        ("redirect_uri", config.callback_url.as_str()),
    ];

    debug!("Exchanging authorization code at {token_url}");
    let response = http
        .post(&token_url)
        .form(&fields)
        .send()
        .await
        .map_err(|source| AuthError::TransportFailure {
            url: token_url.clone(),
            source,
        })?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|source| AuthError::TransportFailure {
            url: token_url.clone(),
            source,
        })?;

    if !status.is_success() {
        warn!("Token exchange failed with {status}");
        return Err(AuthError::BadStatus {
            status: status.as_u16(),
            url: token_url,
            request: redact_form(&fields, SECRET_FIELDS),
            body,
        });
    }

    ExchangeResult::from_body(&token_url, &body)
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
    use proptest::prelude::*;

    fn config(callback_url: &str) -> ProviderConfig {
        ProviderConfig {
            client_id: "3MVG9.consumer_key".to_string(),
            client_secret: "s3cr3t".to_string(),
            callback_url: callback_url.to_string(),
            authorize_base_url: "https://login.salesforce.com".to_string(),
        }
    }

    fn query_value(url: &Url, name: &str) -> Option<String> {
        url.query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    #[test]
    fn test_authorize_url_exact() {
        let url = build_authorize_url(&config("http://localhost:8080/callback")).unwrap();
        assert_eq!(
            url.as_str(),
            "https://login.salesforce.com/services/oauth2/authorize?response_type=code\
             &client_id=3MVG9.consumer_key\
             &redirect_uri=http%3A%2F%2Flocalhost%3A8080%2Fcallback"
        );
    }

    #[test]
    fn test_authorize_url_encodes_query_in_callback() {
        let callback = "https://example.org/wp-admin/options-general.php?page=sfrest&tab=authorize";
        let url = build_authorize_url(&config(callback)).unwrap();
        assert!(!url.as_str().contains("&tab=authorize"));
        assert_eq!(query_value(&url, "redirect_uri").as_deref(), Some(callback));
        assert_eq!(query_value(&url, "response_type").as_deref(), Some("code"));
    }

    #[test]
    fn test_authorize_url_client_id_verbatim() {
        let url = build_authorize_url(&config("https://example.org/cb")).unwrap();
        assert!(url.as_str().contains("client_id=3MVG9.consumer_key&"));
    }

    proptest! {
        #[test]
        fn prop_redirect_uri_round_trips(path in "[a-zA-Z0-9 /?&=%+._~-]{0,40}") {
            let callback = format!("https://example.org/{path}");
            let url = build_authorize_url(&config(&callback)).unwrap();
            prop_assert_eq!(query_value(&url, "redirect_uri"), Some(callback));
        }
    }
}
