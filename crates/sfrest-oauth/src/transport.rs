//! Shared HTTP client construction.

use std::time::Duration;

use reqwest::Client;

use crate::error::{AuthError, Result};

/// Timeout applied to every provider call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds the HTTP client used for provider calls.
///
/// # Errors
///
/// Returns [`AuthError::Config`] if the TLS backend cannot be initialized.
pub fn http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("sfrest/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| AuthError::Config(format!("HTTP client: {e}")))
}
