//! Admin services composed from the authorization flow and the stores.

mod authorize;

pub use authorize::{AuthorizePage, authorize_page};

use chrono::{DateTime, Utc};
use sfrest_oauth::{AuthorizationFlow, ConfigStore, Session, TokenStore};

use crate::Result;

/// Connection summary for the settings tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatus {
    /// Instance URL of the stored token, if any.
    pub instance_url: Option<String>,
    /// When the token was stored, if the backend records it.
    pub since: Option<DateTime<Utc>>,
}

impl ConnectionStatus {
    /// Whether a token is stored.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.instance_url.is_some()
    }

    /// Attaches the storage timestamp; ignored when not connected.
    #[must_use]
    pub fn with_since(mut self, since: Option<DateTime<Utc>>) -> Self {
        self.since = since.filter(|_| self.is_connected());
        self
    }
}

/// Reads the connection summary.
///
/// # Errors
///
/// Returns an error if the token store cannot be read.
pub async fn connection_status<C, T, S>(
    flow: &AuthorizationFlow<C, T, S>,
) -> Result<ConnectionStatus>
where
    C: ConfigStore,
    T: TokenStore,
    S: Session,
{
    let token = flow.current_token().await?;
    Ok(ConnectionStatus {
        instance_url: token.map(|t| t.instance_url),
        since: None,
    })
}

/// Disconnects: clears the session flag and the stored token.
///
/// # Errors
///
/// Returns an error if the token store cannot be cleared.
pub async fn disconnect<C, T, S>(flow: &AuthorizationFlow<C, T, S>) -> Result<()>
where
    C: ConfigStore,
    T: TokenStore,
    S: Session,
{
    flow.invalidate().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_since_dropped_when_not_connected() {
        let now = Utc::now();
        let disconnected = ConnectionStatus {
            instance_url: None,
            since: None,
        }
        .with_since(Some(now));
        assert_eq!(disconnected.since, None);

        let connected = ConnectionStatus {
            instance_url: Some("https://na1.salesforce.com".to_string()),
            since: None,
        }
        .with_since(Some(now));
        assert_eq!(connected.since, Some(now));
    }
}
