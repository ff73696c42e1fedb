//! # sfrest-core
//!
//! Persistence and admin services for `sfrest`.
//!
//! This crate provides:
//! - Option storage (`SQLite`) for the settings record and token record
//! - Settings validation and the settings form view
//! - Token storage backends (`SQLite` or system keyring)
//! - The authorize tab service: flow, exchange, demo query

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod error;
pub mod options;
pub mod service;
pub mod settings;
pub mod token;

pub use error::{Error, Result};
pub use options::OptionStore;
pub use service::{
    AuthorizePage, ConnectionStatus, authorize_page, connection_status, disconnect,
};
pub use settings::{
    SettingsError, SettingsField, SettingsRepository, settings_fields, validate_settings,
};
pub use token::credentials::{CredentialError, CredentialResult};
pub use token::{KeyringTokenStore, TokenBackend, TokenBackendKind, TokenRepository};
