//! Error types for the core library.

use thiserror::Error;

use crate::settings::SettingsError;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Authorization flow or query failed.
    #[error(transparent)]
    Auth(#[from] sfrest_oauth::AuthError),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Submitted settings failed validation.
    #[error(
        "Invalid settings: {}",
        .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
    )]
    Validation(Vec<SettingsError>),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
