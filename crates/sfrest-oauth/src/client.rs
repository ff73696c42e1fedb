//! Authenticated calls against the Salesforce data API.

use reqwest::Client;
use reqwest::header::AUTHORIZATION;
use tracing::{debug, warn};
use url::form_urlencoded::byte_serialize;

use crate::error::{AuthError, Result};
use crate::session::{AUTHORIZED_FLAG, Session};
use crate::token::{QueryResult, TokenRecord};
use crate::transport::{DEFAULT_TIMEOUT, http_client};

/// Data API version used for queries.
pub const DEFAULT_API_VERSION: &str = "v35.0";

/// Query run on the authorize tab once Salesforce is connected.
pub const DEMO_CONTACT_QUERY: &str = "SELECT Name, Id from Contact LIMIT 100";

/// Performs GET requests carrying `Authorization: OAuth <token>`.
#[derive(Debug, Clone)]
pub struct AuthorizedHttpClient<S> {
    http: Client,
    session: S,
    api_version: String,
}

impl<S: Session> AuthorizedHttpClient<S> {
    /// Creates a client that clears `session`'s authorization flag on failure.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(session: S) -> Result<Self> {
        Ok(Self::with_http_client(http_client(DEFAULT_TIMEOUT)?, session))
    }

    /// Creates a client around an existing HTTP client.
    #[must_use]
    pub fn with_http_client(http: Client, session: S) -> Self {
        Self {
            http,
            session,
            api_version: DEFAULT_API_VERSION.to_string(),
        }
    }

    /// Overrides the data API version (e.g. `v59.0`).
    #[must_use]
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    /// Builds the query URL for `soql`.
    #[must_use]
    pub fn query_url(&self, soql: &str, token: &TokenRecord) -> String {
        let q: String = byte_serialize(soql.as_bytes()).collect();
        format!(
            "{}/services/data/{}/query?q={q}",
            token.instance_url.trim_end_matches('/'),
            self.api_version
        )
    }

    /// Runs a SOQL query.
    ///
    /// On [`AuthError::QueryFailed`] the session authorization flag is cleared
    /// so the next request re-evaluates state. The stored token is not touched.
    ///
    /// # Errors
    ///
    /// - [`AuthError::QueryFailed`] on transport failure, non-2xx status or empty body
    /// - [`AuthError::MalformedBody`] if the body is not a JSON object
    /// - [`AuthError::MissingFields`] if `totalSize` or `records` is absent
    pub async fn query(&self, soql: &str, token: &TokenRecord) -> Result<QueryResult> {
        let url = self.query_url(soql, token);
        debug!("Running query against {}", token.instance_url);

        let result = self.fetch(&url, token).await;
        if let Err(error @ AuthError::QueryFailed { .. }) = &result {
            warn!("{error}");
            self.session.clear_flag(AUTHORIZED_FLAG);
        }
        QueryResult::from_body(&url, &result?)
    }

    async fn fetch(&self, url: &str, token: &TokenRecord) -> Result<String> {
        let failed = |status: Option<u16>, body: String| AuthError::QueryFailed {
            status,
            url: url.to_string(),
            body,
        };

        let response = self
            .http
            .get(url)
            .header(AUTHORIZATION, format!("OAuth {}", token.access_token))
            .send()
            .await
            .map_err(|e| failed(None, e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| failed(Some(status.as_u16()), e.to_string()))?;

        if !status.is_success() || body.trim().is_empty() {
            return Err(failed(Some(status.as_u16()), body));
        }
        Ok(body)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::session::MemorySession;

    #[test]
    fn test_query_url_encodes_soql() {
        let client = AuthorizedHttpClient::new(MemorySession::new()).unwrap();
        let token = TokenRecord::new("tok1", "https://x.my.salesforce.com/");
        assert_eq!(
            client.query_url(DEMO_CONTACT_QUERY, &token),
            "https://x.my.salesforce.com/services/data/v35.0/query\
             ?q=SELECT+Name%2C+Id+from+Contact+LIMIT+100"
        );
    }

    #[test]
    fn test_query_url_custom_version() {
        let client = AuthorizedHttpClient::new(MemorySession::new())
            .unwrap()
            .with_api_version("v59.0");
        let token = TokenRecord::new("tok1", "https://x.my.salesforce.com");
        let url = client.query_url("SELECT Id FROM Account", &token);
        assert!(url.contains("/services/data/v59.0/query?q="));
    }
}
