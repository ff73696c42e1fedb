//! Secure token storage using the system keyring.
//!
//! Stores the token record in the platform's native credential storage:
//! - Linux: Secret Service (GNOME Keyring, `KWallet`)
//! - macOS: Keychain
//! - Windows: Credential Manager

use keyring::Entry;
use sfrest_oauth::{AuthError, TokenRecord, TokenStore};
use tokio::task::spawn_blocking;
use tracing::{debug, warn};

/// Service name used for keyring entries.
const SERVICE_NAME: &str = "sfrest";

/// Keyring user under which the token record is stored.
const TOKEN_ENTRY: &str = "salesforce_tokens";

/// Error type for credential operations.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// Failed to access keyring.
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    /// Stored value is not a token record.
    #[error("Stored token is unreadable: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Result type for credential operations.
pub type CredentialResult<T> = std::result::Result<T, CredentialError>;

/// Token store backed by the system keyring.
///
/// The record is serialized as one JSON value, so both fields are always
/// replaced together.
#[derive(Debug, Clone)]
pub struct KeyringTokenStore {
    service: String,
}

impl Default for KeyringTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyringTokenStore {
    /// Store under the default service name.
    #[must_use]
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    /// Store under a custom service name (one per site, or for tests).
    #[must_use]
    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self) -> CredentialResult<Entry> {
        Ok(Entry::new(&self.service, TOKEN_ENTRY)?)
    }

    /// Retrieves the token record from the keyring.
    ///
    /// # Errors
    ///
    /// Returns an error if the keyring operation fails or deserialization fails.
    pub fn load(&self) -> CredentialResult<Option<TokenRecord>> {
        match self.entry()?.get_password() {
            Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
            Err(keyring::Error::NoEntry) => {
                debug!("No token found in keyring service {}", self.service);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Stores the token record in the keyring.
    ///
    /// # Errors
    ///
    /// Returns an error if the keyring operation fails or serialization fails.
    pub fn store(&self, record: &TokenRecord) -> CredentialResult<()> {
        let json = serde_json::to_string(record)?;
        self.entry()?.set_password(&json)?;
        debug!("Stored token in keyring service {}", self.service);
        Ok(())
    }

    /// Deletes the token record from the keyring.
    ///
    /// # Errors
    ///
    /// Returns an error if the keyring operation fails (except for missing entries).
    pub fn delete(&self) -> CredentialResult<()> {
        match self.entry()?.delete_credential() {
            Ok(()) => {
                debug!("Deleted token from keyring service {}", self.service);
                Ok(())
            }
            Err(keyring::Error::NoEntry) => {
                debug!("No token to delete in keyring service {}", self.service);
                Ok(())
            }
            Err(e) => {
                warn!("Failed to delete token from keyring: {e}");
                Err(e.into())
            }
        }
    }
}

// Keyring calls block on D-Bus or platform APIs, so they run off the runtime.
impl TokenStore for KeyringTokenStore {
    async fn get(&self) -> sfrest_oauth::Result<Option<TokenRecord>> {
        let store = self.clone();
        spawn_blocking(move || store.load())
            .await
            .map_err(AuthError::store)?
            .map_err(AuthError::store)
    }

    async fn put(&self, record: &TokenRecord) -> sfrest_oauth::Result<()> {
        let store = self.clone();
        let record = record.clone();
        spawn_blocking(move || store.store(&record))
            .await
            .map_err(AuthError::store)?
            .map_err(AuthError::store)
    }

    async fn clear(&self) -> sfrest_oauth::Result<()> {
        let store = self.clone();
        spawn_blocking(move || store.delete())
            .await
            .map_err(AuthError::store)?
            .map_err(AuthError::store)
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
    // Note: These tests interact with the actual system keyring.
    // They are marked as ignored by default to avoid polluting the keyring
    // during automated testing. Run manually with `cargo test -- --ignored`

    use super::*;

    #[tokio::test]
    #[ignore = "Interacts with system keyring"]
    async fn test_store_and_retrieve_token() {
        let store = KeyringTokenStore::with_service("sfrest-test-99999");
        let record = TokenRecord::new("test_token_12345", "https://x.my.salesforce.com");

        store.put(&record).await.unwrap();
        assert_eq!(store.get().await.unwrap(), Some(record));

        store.clear().await.unwrap();
        assert_eq!(store.get().await.unwrap(), None);
    }

    #[test]
    #[ignore = "Interacts with system keyring"]
    fn test_delete_missing_is_ok() {
        let store = KeyringTokenStore::with_service("sfrest-test-99998");
        store.delete().unwrap();
    }
}
