//! Per-session authorization flags.
//!
//! The session is an injected capability rather than ambient process state.
//! It only records whether the current session has been authorized; the
//! token itself always lives in the [`TokenStore`](crate::TokenStore).

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

/// Flag set after a successful exchange, cleared after a failed query.
pub const AUTHORIZED_FLAG: &str = "access_token";

/// Session flag storage.
pub trait Session: Send + Sync {
    /// Whether `key` is set.
    fn get_flag(&self, key: &str) -> bool;

    /// Sets `key`.
    fn set_flag(&self, key: &str);

    /// Clears `key`.
    fn clear_flag(&self, key: &str);
}

impl<S: Session + ?Sized> Session for Arc<S> {
    fn get_flag(&self, key: &str) -> bool {
        (**self).get_flag(key)
    }

    fn set_flag(&self, key: &str) {
        (**self).set_flag(key);
    }

    fn clear_flag(&self, key: &str) {
        (**self).clear_flag(key);
    }
}

/// In-process session.
#[derive(Debug, Default)]
pub struct MemorySession {
    flags: Mutex<HashSet<String>>,
}

impl MemorySession {
    /// Creates an empty session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Session for MemorySession {
    fn get_flag(&self, key: &str) -> bool {
        self.flags
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }

    fn set_flag(&self, key: &str) {
        self.flags
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string());
    }

    fn clear_flag(&self, key: &str) {
        self.flags
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_lifecycle() {
        let session = MemorySession::new();
        assert!(!session.get_flag(AUTHORIZED_FLAG));

        session.set_flag(AUTHORIZED_FLAG);
        assert!(session.get_flag(AUTHORIZED_FLAG));

        session.clear_flag(AUTHORIZED_FLAG);
        assert!(!session.get_flag(AUTHORIZED_FLAG));
    }

    #[test]
    fn test_shared_through_arc() {
        let session = Arc::new(MemorySession::new());
        let other = Arc::clone(&session);
        other.set_flag("x");
        assert!(session.get_flag("x"));
    }
}
