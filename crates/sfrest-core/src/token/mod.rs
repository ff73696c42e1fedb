//! Persistent token storage.
//!
//! Two backends are available: the SQLite option table (default) and the
//! system keyring. [`TokenBackend`] selects one at startup.

pub mod credentials;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sfrest_oauth::{AuthError, TokenRecord, TokenStore};
use tracing::debug;

use crate::options::OptionStore;
pub use credentials::KeyringTokenStore;

/// Option name holding the token record.
pub const TOKENS_OPTION: &str = "salesforce_tokens";

/// Token store backed by the option table.
#[derive(Debug, Clone)]
pub struct TokenRepository {
    options: OptionStore,
}

impl TokenRepository {
    /// Creates a repository over an option store.
    #[must_use]
    pub const fn new(options: OptionStore) -> Self {
        Self { options }
    }

    /// When the current token was stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn authorized_at(&self) -> crate::Result<Option<DateTime<Utc>>> {
        self.options.updated_at(TOKENS_OPTION).await
    }
}

impl TokenStore for TokenRepository {
    async fn get(&self) -> sfrest_oauth::Result<Option<TokenRecord>> {
        let record = self
            .options
            .get::<TokenRecord>(TOKENS_OPTION)
            .await
            .map_err(AuthError::store)?;
        debug!("Loaded token record: present={}", record.is_some());
        Ok(record)
    }

    async fn put(&self, record: &TokenRecord) -> sfrest_oauth::Result<()> {
        self.options
            .update(TOKENS_OPTION, record)
            .await
            .map_err(AuthError::store)
    }

    async fn clear(&self) -> sfrest_oauth::Result<()> {
        self.options
            .delete(TOKENS_OPTION)
            .await
            .map_err(AuthError::store)
    }
}

/// Which token store the process uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenBackendKind {
    /// SQLite option table.
    #[default]
    Sqlite,
    /// System keyring (Secret Service, Keychain, Credential Manager).
    Keyring,
}

/// Token store selected at runtime.
#[derive(Debug, Clone)]
pub enum TokenBackend {
    /// SQLite option table.
    Sqlite(TokenRepository),
    /// System keyring.
    Keyring(KeyringTokenStore),
}

impl TokenBackend {
    /// Builds the backend of the requested kind.
    #[must_use]
    pub fn new(kind: TokenBackendKind, options: OptionStore) -> Self {
        match kind {
            TokenBackendKind::Sqlite => Self::Sqlite(TokenRepository::new(options)),
            TokenBackendKind::Keyring => Self::Keyring(KeyringTokenStore::new()),
        }
    }

    /// When the current token was stored. The keyring keeps no timestamp.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn authorized_at(&self) -> crate::Result<Option<DateTime<Utc>>> {
        match self {
            Self::Sqlite(repo) => repo.authorized_at().await,
            Self::Keyring(_) => Ok(None),
        }
    }
}

impl TokenStore for TokenBackend {
    async fn get(&self) -> sfrest_oauth::Result<Option<TokenRecord>> {
        match self {
            Self::Sqlite(store) => store.get().await,
            Self::Keyring(store) => store.get().await,
        }
    }

    async fn put(&self, record: &TokenRecord) -> sfrest_oauth::Result<()> {
        match self {
            Self::Sqlite(store) => store.put(record).await,
            Self::Keyring(store) => store.put(record).await,
        }
    }

    async fn clear(&self) -> sfrest_oauth::Result<()> {
        match self {
            Self::Sqlite(store) => store.clear().await,
            Self::Keyring(store) => store.clear().await,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip_through_options() {
        let repo = TokenRepository::new(OptionStore::in_memory().await.unwrap());
        assert!(repo.get().await.unwrap().is_none());
        assert!(repo.authorized_at().await.unwrap().is_none());

        let record = TokenRecord::new("tok1", "https://x.my.salesforce.com");
        repo.put(&record).await.unwrap();
        assert_eq!(repo.get().await.unwrap(), Some(record));
        assert!(repo.authorized_at().await.unwrap().is_some());

        repo.clear().await.unwrap();
        assert!(repo.get().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stored_as_single_record() {
        let options = OptionStore::in_memory().await.unwrap();
        let repo = TokenRepository::new(options.clone());
        repo.put(&TokenRecord::new("tok1", "https://x.my.salesforce.com"))
            .await
            .unwrap();

        let raw: serde_json::Value = options.get(TOKENS_OPTION).await.unwrap().unwrap();
        assert_eq!(raw["salesforce_token"], "tok1");
        assert_eq!(raw["salesforce_instance_url"], "https://x.my.salesforce.com");
    }

    #[tokio::test]
    async fn test_backend_dispatches_to_sqlite() {
        let backend = TokenBackend::new(
            TokenBackendKind::Sqlite,
            OptionStore::in_memory().await.unwrap(),
        );
        backend
            .put(&TokenRecord::new("tok1", "https://x"))
            .await
            .unwrap();
        assert!(backend.get().await.unwrap().is_some());
        assert!(backend.authorized_at().await.unwrap().is_some());
    }

    #[test]
    fn test_backend_kind_serde() {
        let kind: TokenBackendKind = serde_json::from_str("\"keyring\"").unwrap();
        assert_eq!(kind, TokenBackendKind::Keyring);
    }
}
