//! Token and query response types.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AuthError, REDACTED, Result, redact_json};

/// Persisted outcome of a successful code exchange.
///
/// Both fields are always written together.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    /// Access token presented as `Authorization: OAuth <token>`.
    #[serde(rename = "salesforce_token")]
    pub access_token: String,
    /// Tenant-specific API base URL.
    #[serde(rename = "salesforce_instance_url")]
    pub instance_url: String,
}

impl TokenRecord {
    /// Creates a token record.
    #[must_use]
    pub fn new(access_token: impl Into<String>, instance_url: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            instance_url: instance_url.into(),
        }
    }

    /// Whether the record holds a usable access token.
    #[must_use]
    pub fn is_present(&self) -> bool {
        !self.access_token.is_empty()
    }
}

impl fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRecord")
            .field("access_token", &REDACTED)
            .field("instance_url", &self.instance_url)
            .finish()
    }
}

/// Token endpoint response.
#[derive(Clone, Deserialize, Serialize)]
pub struct ExchangeResult {
    /// Access token.
    pub access_token: String,
    /// Tenant-specific API base URL.
    pub instance_url: String,
    /// Identity URL of the authorizing user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Issue time in epoch milliseconds, as a string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<String>,
    /// Signature over `id` and `issued_at`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    /// Token type (usually "Bearer").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// Scope granted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl ExchangeResult {
    /// Parses a token endpoint body.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MalformedBody`] if the body is empty or not a JSON
    /// object, and [`AuthError::MissingFields`] if `access_token` or
    /// `instance_url` is absent.
    pub fn from_body(url: &str, body: &str) -> Result<Self> {
        let value = parse_object(url, body)?;
        require_fields(&value, &["access_token", "instance_url"])?;
        serde_json::from_value(value).map_err(|_| AuthError::MalformedBody {
            url: url.to_string(),
            body: String::from("<token response with unexpected field types>"),
        })
    }

    /// The part of the response that gets persisted.
    #[must_use]
    pub fn to_record(&self) -> TokenRecord {
        TokenRecord::new(self.access_token.clone(), self.instance_url.clone())
    }
}

impl fmt::Debug for ExchangeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExchangeResult")
            .field("access_token", &REDACTED)
            .field("instance_url", &self.instance_url)
            .field("id", &self.id)
            .field("issued_at", &self.issued_at)
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

/// Data API query response.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    /// Number of matching records.
    pub total_size: u64,
    /// Records as returned by the API.
    pub records: Vec<Value>,
    /// Whether all records are in this batch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done: Option<bool>,
    /// Locator for the next batch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_records_url: Option<String>,
}

impl QueryResult {
    /// Parses a query body.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MalformedBody`] if the body is not a JSON object, and
    /// [`AuthError::MissingFields`] if `totalSize` or `records` is absent.
    pub fn from_body(url: &str, body: &str) -> Result<Self> {
        let value = parse_object(url, body)?;
        require_fields(&value, &["totalSize", "records"])?;
        serde_json::from_value(value).map_err(|_| AuthError::MalformedBody {
            url: url.to_string(),
            body: body.to_string(),
        })
    }
}

/// Parses `body` as a non-empty JSON object.
fn parse_object(url: &str, body: &str) -> Result<Value> {
    let malformed = || AuthError::MalformedBody {
        url: url.to_string(),
        body: body.to_string(),
    };

    let value: Value = serde_json::from_str(body).map_err(|_| malformed())?;
    match &value {
        Value::Object(map) if !map.is_empty() => Ok(value),
        _ => Err(malformed()),
    }
}

/// A null or empty-string value counts as absent.
fn is_blank(value: &Value) -> bool {
    value.is_null() || value.as_str() == Some("")
}

/// Checks that every key is present, not null and not an empty string.
fn require_fields(value: &Value, keys: &[&'static str]) -> Result<()> {
    let missing: Vec<&'static str> = keys
        .iter()
        .copied()
        .filter(|key| value.get(key).is_none_or(is_blank))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(AuthError::MissingFields {
            missing,
            body: redact_json(value),
        })
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

    const TOKEN_URL: &str = "https://login.salesforce.com/services/oauth2/token";

    #[test]
    fn test_exchange_result_from_body() {
        let body = r#"{
            "access_token": "tok1",
            "instance_url": "https://x.my.salesforce.com",
            "id": "https://login.salesforce.com/id/00D/005",
            "token_type": "Bearer",
            "issued_at": "1700000000000",
            "signature": "sig"
        }"#;
        let result = ExchangeResult::from_body(TOKEN_URL, body).unwrap();
        assert_eq!(
            result.to_record(),
            TokenRecord::new("tok1", "https://x.my.salesforce.com")
        );
        assert_eq!(result.token_type.as_deref(), Some("Bearer"));
        assert!(result.scope.is_none());
    }

    #[test]
    fn test_exchange_result_empty_body() {
        let err = ExchangeResult::from_body(TOKEN_URL, "").unwrap_err();
        assert!(matches!(err, AuthError::MalformedBody { .. }));
    }

    #[test]
    fn test_exchange_result_not_json() {
        let err = ExchangeResult::from_body(TOKEN_URL, "<html>oops</html>").unwrap_err();
        assert!(matches!(err, AuthError::MalformedBody { .. }));
    }

    #[test]
    fn test_exchange_result_empty_object() {
        let err = ExchangeResult::from_body(TOKEN_URL, "{}").unwrap_err();
        assert!(matches!(err, AuthError::MalformedBody { .. }));
    }

    #[test]
    fn test_exchange_result_missing_instance_url_redacts_token() {
        let err = ExchangeResult::from_body(TOKEN_URL, r#"{"access_token":"tok1"}"#).unwrap_err();
        match err {
            AuthError::MissingFields { missing, body } => {
                assert_eq!(missing, vec!["instance_url"]);
                assert!(!body.contains("tok1"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_exchange_result_null_field_is_missing() {
        let err = ExchangeResult::from_body(
            TOKEN_URL,
            r#"{"access_token":null,"instance_url":"https://x.my.salesforce.com"}"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            AuthError::MissingFields { ref missing, .. } if missing == &vec!["access_token"]
        ));
    }

    #[test]
    fn test_exchange_result_empty_strings_are_missing() {
        let err = ExchangeResult::from_body(TOKEN_URL, r#"{"access_token":"","instance_url":""}"#)
            .unwrap_err();
        match err {
            AuthError::MissingFields { missing, .. } => {
                assert_eq!(missing, vec!["access_token", "instance_url"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_query_result_empty() {
        let result =
            QueryResult::from_body("q", r#"{"totalSize":0,"done":true,"records":[]}"#).unwrap();
        assert_eq!(result.total_size, 0);
        assert!(result.records.is_empty());
        assert_eq!(result.done, Some(true));
    }

    #[test]
    fn test_query_result_missing_records() {
        let err = QueryResult::from_body("q", r#"{"totalSize":3}"#).unwrap_err();
        assert!(matches!(
            err,
            AuthError::MissingFields { ref missing, .. } if missing == &vec!["records"]
        ));
    }

    #[test]
    fn test_token_record_debug_redacts() {
        let record = TokenRecord::new("tok1", "https://x.my.salesforce.com");
        let rendered = format!("{record:?}");
        assert!(!rendered.contains("tok1"));
        assert!(rendered.contains("x.my.salesforce.com"));
    }

    #[test]
    fn test_token_record_json_keys() {
        let record = TokenRecord::new("tok1", "https://x.my.salesforce.com");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["salesforce_token"], "tok1");
        assert_eq!(json["salesforce_instance_url"], "https://x.my.salesforce.com");
    }

    #[test]
    fn test_token_record_presence() {
        assert!(TokenRecord::new("tok1", "https://x").is_present());
        assert!(!TokenRecord::new("", "https://x").is_present());
    }
}
