//! Error types for the authorization flow and authorized calls.

/// Result type alias for `OAuth2` operations.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Placeholder written in place of secrets in diagnostics.
pub(crate) const REDACTED: &str = "[redacted]";

/// Authorization error types.
///
/// Every variant stops the current request. Query-path failures additionally
/// mean re-authentication may be required, see [`AuthError::requires_reauth`].
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The request could not complete (connect, TLS, timeout).
    #[error("Call to '{url}' failed: {source}")]
    TransportFailure {
        /// Endpoint that was called.
        url: String,
        /// Underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The provider answered with a status outside `[200, 300)`.
    #[error("Call to get token from code failed with {status}: '{url}' - {request} - '{body}'")]
    BadStatus {
        /// HTTP status code.
        status: u16,
        /// Endpoint that was called.
        url: String,
        /// Posted form fields with secrets redacted.
        request: String,
        /// Raw response body.
        body: String,
    },

    /// The body was empty or not a JSON object.
    #[error("Couldn't decode '{body}' from '{url}' as a JSON object")]
    MalformedBody {
        /// Endpoint that was called.
        url: String,
        /// Raw response body.
        body: String,
    },

    /// The body parsed but lacks required keys.
    #[error("Missing expected data ({}) from '{body}'", .missing.join(", "))]
    MissingFields {
        /// Names of the absent keys.
        missing: Vec<&'static str>,
        /// Response body with token values redacted.
        body: String,
    },

    /// A data query failed at the transport or HTTP level, or returned nothing.
    #[error(
        "Query API call failed{}: '{url}' - '{body}'",
        .status.map(|s| format!(" with {s}")).unwrap_or_default()
    )]
    QueryFailed {
        /// HTTP status code, if a response arrived.
        status: Option<u16>,
        /// Query URL.
        url: String,
        /// Raw response body (or transport error text).
        body: String,
    },

    /// Another request is already exchanging the same authorization code.
    #[error("Authorization code exchange already in progress")]
    ExchangeInProgress,

    /// Provider configuration is missing or invalid.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Token store failure.
    #[error("Token store error: {0}")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl AuthError {
    /// Wraps a token store backend error.
    #[must_use]
    pub fn store(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Store(Box::new(error))
    }

    /// Whether the failure should stop the current request.
    ///
    /// Always true: this core has no locally recoverable error category.
    #[must_use]
    #[allow(clippy::unused_self)]
    pub const fn is_fatal(&self) -> bool {
        true
    }

    /// Whether the caller should re-evaluate authorization on the next request.
    #[must_use]
    pub const fn requires_reauth(&self) -> bool {
        matches!(self, Self::QueryFailed { .. })
    }

    /// Human-readable diagnostic suitable for an error page.
    ///
    /// Contains the failing URL and raw response body, never secrets.
    #[must_use]
    pub fn diagnostic(&self) -> String {
        self.to_string()
    }
}

/// Renders form fields for a diagnostic, hiding secret values.
pub(crate) fn redact_form(fields: &[(&str, &str)], secret_keys: &[&str]) -> String {
    fields
        .iter()
        .map(|(key, value)| {
            if secret_keys.contains(key) {
                format!("{key}={REDACTED}")
            } else {
                format!("{key}={value}")
            }
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Renders a JSON body for a diagnostic, hiding the access token.
pub(crate) fn redact_json(value: &serde_json::Value) -> String {
    let mut value = value.clone();
    if let Some(token) = value.get_mut("access_token") {
        *token = serde_json::Value::String(REDACTED.to_string());
    }
    value.to_string()
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

    #[test]
    fn test_redact_form_hides_secrets() {
        let rendered = redact_form(
            &[
                ("code", "abc"),
                ("grant_type", "authorization_code"),
                ("client_secret", "s3cr3t"),
            ],
            &["code", "client_secret"],
        );
        assert_eq!(
            rendered,
            "code=[redacted]&grant_type=authorization_code&client_secret=[redacted]"
        );
    }

    #[test]
    fn test_redact_json_hides_token() {
        let value = serde_json::json!({"access_token": "tok1", "id": "x"});
        let rendered = redact_json(&value);
        assert!(!rendered.contains("tok1"));
        assert!(rendered.contains("[redacted]"));
        assert!(rendered.contains("\"id\":\"x\""));
    }

    #[test]
    fn test_only_query_failures_require_reauth() {
        let query = AuthError::QueryFailed {
            status: Some(401),
            url: "https://x.my.salesforce.com".into(),
            body: String::new(),
        };
        assert!(query.requires_reauth());
        assert!(query.is_fatal());
        assert!(query.diagnostic().contains("with 401"));

        assert!(!AuthError::ExchangeInProgress.requires_reauth());
        assert!(!AuthError::Config("x".into()).requires_reauth());
    }

    #[test]
    fn test_missing_fields_message() {
        let err = AuthError::MissingFields {
            missing: vec!["access_token", "instance_url"],
            body: "{}".into(),
        };
        assert_eq!(
            err.to_string(),
            "Missing expected data (access_token, instance_url) from '{}'"
        );
    }
}
