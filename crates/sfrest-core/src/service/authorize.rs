//! Authorize tab: run the flow, then prove the token with a query.

use sfrest_oauth::{
    AuthError, AuthorizationFlow, AuthorizationState, AuthorizedHttpClient, ConfigStore,
    FlowOutcome, InboundRequest, QueryResult, RedirectMode, Session, TokenStore,
};
use tracing::{info, warn};
use url::Url;

/// What the authorize tab shows for one request.
#[derive(Debug)]
pub enum AuthorizePage {
    /// Not connected: link or redirect to the Salesforce login page.
    Redirect {
        /// Authorize URL.
        url: Url,
        /// Render a link or answer with a redirect.
        mode: RedirectMode,
    },
    /// This request completed the code exchange.
    JustAuthorized {
        /// Instance URL returned by the exchange.
        instance_url: String,
    },
    /// Connected; the demo query ran.
    Connected {
        /// Instance the query ran against.
        instance_url: String,
        /// Query result.
        result: QueryResult,
    },
    /// Request stopped with a diagnostic.
    Failed {
        /// Cause.
        error: AuthError,
    },
}

/// Handles the authorize tab.
///
/// A request that performs the code exchange only reports success; the query
/// runs on the next visit.
pub async fn authorize_page<C, T, S, Q>(
    flow: &AuthorizationFlow<C, T, S>,
    client: &AuthorizedHttpClient<Q>,
    request: &InboundRequest,
    soql: &str,
) -> AuthorizePage
where
    C: ConfigStore,
    T: TokenStore,
    S: Session,
    Q: Session,
{
    let exchanging = matches!(
        flow.evaluate_state(request).await,
        Ok(AuthorizationState::HasPendingCode)
    );

    let token = match flow.run(request).await {
        FlowOutcome::Proceed(token) => token,
        FlowOutcome::RedirectToProvider(url) => {
            return AuthorizePage::Redirect {
                url,
                mode: flow.options().redirect_mode,
            };
        }
        FlowOutcome::Fatal(error) => return AuthorizePage::Failed { error },
    };

    if exchanging {
        return AuthorizePage::JustAuthorized {
            instance_url: token.instance_url,
        };
    }

    match client.query(soql, &token).await {
        Ok(result) => {
            info!("Query returned {} records", result.total_size);
            AuthorizePage::Connected {
                instance_url: token.instance_url,
                result,
            }
        }
        Err(error) => {
            if let Err(e) = flow.handle_query_failure(&error).await {
                warn!("Could not drop stored token: {e}");
            }
            AuthorizePage::Failed { error }
        }
    }
}
