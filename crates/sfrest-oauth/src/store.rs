//! Token persistence.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::Result;
use crate::token::TokenRecord;

/// Persistent storage for the current [`TokenRecord`].
///
/// Implementations must write a record as a whole: readers never observe an
/// access token without its instance URL.
pub trait TokenStore: Send + Sync {
    /// Returns the stored record, if any.
    fn get(&self) -> impl Future<Output = Result<Option<TokenRecord>>> + Send;

    /// Replaces the stored record.
    fn put(&self, record: &TokenRecord) -> impl Future<Output = Result<()>> + Send;

    /// Removes the stored record.
    fn clear(&self) -> impl Future<Output = Result<()>> + Send;
}

impl<T: TokenStore> TokenStore for Arc<T> {
    fn get(&self) -> impl Future<Output = Result<Option<TokenRecord>>> + Send {
        (**self).get()
    }

    fn put(&self, record: &TokenRecord) -> impl Future<Output = Result<()>> + Send {
        (**self).put(record)
    }

    fn clear(&self) -> impl Future<Output = Result<()>> + Send {
        (**self).clear()
    }
}

/// In-memory token store.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    record: Mutex<Option<TokenRecord>>,
    writes: Mutex<usize>,
}

impl MemoryTokenStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `record`.
    #[must_use]
    pub fn with_record(record: TokenRecord) -> Self {
        Self {
            record: Mutex::new(Some(record)),
            writes: Mutex::new(0),
        }
    }

    /// Number of `put` calls so far.
    #[must_use]
    pub fn writes(&self) -> usize {
        *self.writes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TokenStore for MemoryTokenStore {
    async fn get(&self) -> Result<Option<TokenRecord>> {
        Ok(self
            .record
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    async fn put(&self, record: &TokenRecord) -> Result<()> {
        *self.record.lock().unwrap_or_else(PoisonError::into_inner) = Some(record.clone());
        *self.writes.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.record.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_clear() {
        let store = MemoryTokenStore::new();
        assert!(store.get().await.unwrap().is_none());

        let record = TokenRecord::new("tok1", "https://x.my.salesforce.com");
        store.put(&record).await.unwrap();
        assert_eq!(store.get().await.unwrap(), Some(record));
        assert_eq!(store.writes(), 1);

        store.clear().await.unwrap();
        assert!(store.get().await.unwrap().is_none());
    }
}
