//! At-most-once guard for authorization code exchanges.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use crate::error::{AuthError, Result};

/// Tracks authorization codes whose exchange is in flight.
///
/// Authorization codes are single-use at the provider, so two concurrent
/// requests carrying the same code must not both reach the token endpoint.
/// Share one guard (behind an `Arc`) across all flows of a process.
#[derive(Debug, Default)]
pub struct ExchangeGuard {
    in_flight: Mutex<HashSet<String>>,
}

impl ExchangeGuard {
    /// Creates an empty guard.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `code` until the returned permit is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::ExchangeInProgress`] if `code` is already claimed.
    pub fn acquire(&self, code: &str) -> Result<ExchangePermit<'_>> {
        let inserted = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(code.to_string());

        if inserted {
            Ok(ExchangePermit {
                guard: self,
                code: code.to_string(),
            })
        } else {
            Err(AuthError::ExchangeInProgress)
        }
    }
}

/// Releases its code on drop.
#[derive(Debug)]
pub struct ExchangePermit<'a> {
    guard: &'a ExchangeGuard,
    code: String,
}

impl Drop for ExchangePermit<'_> {
    fn drop(&mut self) {
        self.guard
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.code);
    }
}
