//! # sfrest-oauth
//!
//! Salesforce `OAuth2` authorization-code flow and token lifecycle.
//!
//! ## Features
//!
//! - **Provider configuration**: each field resolved from an immutable override
//!   source first, then from the mutable settings record
//! - **Authorization flow**: decides whether the caller is authorized, builds the
//!   authorize link, and exchanges an authorization code for an access token
//! - **Token persistence**: pluggable [`TokenStore`] and [`Session`] capabilities
//! - **Authorized calls**: [`AuthorizedHttpClient`] attaches the `OAuth` header to
//!   data API queries
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use sfrest_oauth::{
//!     AuthorizationFlow, AuthorizedHttpClient, ConfigResolver, FlowOutcome, InboundRequest,
//!     LayeredConfig, MemorySession, MemoryTokenStore, Overrides, SettingsRecord,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = LayeredConfig::new(Overrides::from_env(), SettingsRecord::default());
//!     let session = Arc::new(MemorySession::new());
//!     let flow = AuthorizationFlow::new(
//!         ConfigResolver::new(config),
//!         MemoryTokenStore::new(),
//!         Arc::clone(&session),
//!     )?;
//!
//!     match flow.run(&InboundRequest::default()).await {
//!         FlowOutcome::RedirectToProvider(url) => println!("Log in with Salesforce: {url}"),
//!         FlowOutcome::Proceed(token) => {
//!             let client = AuthorizedHttpClient::new(session)?;
//!             let result = client.query("SELECT Name, Id from Contact LIMIT 100", &token).await?;
//!             println!("{} records", result.total_size);
//!         }
//!         FlowOutcome::Fatal(error) => eprintln!("{}", error.diagnostic()),
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod client;
pub mod config;
mod error;
pub mod flow;
pub mod session;
pub mod store;
pub mod token;
mod transport;

pub use client::{AuthorizedHttpClient, DEFAULT_API_VERSION, DEMO_CONTACT_QUERY};
pub use config::{
    ConfigKey, ConfigResolver, ConfigStore, LayeredConfig, Overrides, ProviderConfig,
    SettingsRecord,
};
pub use error::{AuthError, Result};
pub use flow::{
    AuthorizationFlow, AuthorizationState, ExchangeGuard, FlowOptions, FlowOutcome, InboundRequest,
    RedirectMode, build_authorize_url,
};
pub use session::{AUTHORIZED_FLAG, MemorySession, Session};
pub use store::{MemoryTokenStore, TokenStore};
pub use token::{ExchangeResult, QueryResult, TokenRecord};
pub use transport::{DEFAULT_TIMEOUT, http_client};
