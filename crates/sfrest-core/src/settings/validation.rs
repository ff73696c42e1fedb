//! Settings validation.

use sfrest_oauth::{ConfigKey, Overrides, SettingsRecord};
use url::Url;

/// Validation error for a settings field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsError {
    /// Required field is empty.
    Empty(ConfigKey),
    /// Field must be an absolute `http(s)` URL.
    InvalidUrl(ConfigKey),
}

impl SettingsError {
    /// Get human-readable error message.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::Empty(ConfigKey::ConsumerKey) => "Consumer Key is required",
            Self::Empty(ConfigKey::ConsumerSecret) => "Consumer Secret is required",
            Self::Empty(ConfigKey::CallbackUrl) => "Callback URL is required",
            Self::Empty(ConfigKey::LoginBaseUrl) => "Login Base URL is required",
            Self::InvalidUrl(ConfigKey::CallbackUrl) => "Callback URL must be an http(s) URL",
            Self::InvalidUrl(ConfigKey::LoginBaseUrl) => "Login Base URL must be an http(s) URL",
            Self::InvalidUrl(_) => "Invalid URL",
        }
    }

    /// Get the field name this error relates to.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::Empty(key) | Self::InvalidUrl(key) => key.setting_name(),
        }
    }
}

impl std::fmt::Display for SettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for SettingsError {}

/// Validate a settings record. Fields defined by `overrides` are skipped.
///
/// # Errors
///
/// Returns every failing field.
pub fn validate_settings(
    record: &SettingsRecord,
    overrides: &Overrides,
) -> Result<(), Vec<SettingsError>> {
    let mut errors = Vec::new();

    for key in ConfigKey::ALL {
        if overrides.contains(key) {
            continue;
        }

        let value = record.value(key);
        if value.is_empty() {
            errors.push(SettingsError::Empty(key));
        } else if key.is_url() && !is_http_url(value) {
            errors.push(SettingsError::InvalidUrl(key));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_http_url(value: &str) -> bool {
    Url::parse(value).is_ok_and(|url| matches!(url.scheme(), "http" | "https") && url.has_host())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn valid() -> SettingsRecord {
        SettingsRecord::new()
            .with(ConfigKey::ConsumerKey, "key")
            .with(ConfigKey::ConsumerSecret, "secret")
            .with(ConfigKey::CallbackUrl, "https://example.org/callback")
            .with(ConfigKey::LoginBaseUrl, "https://test.salesforce.com")
    }

    #[test]
    fn test_valid_settings() {
        assert!(validate_settings(&valid(), &Overrides::none()).is_ok());
    }

    #[test]
    fn test_all_empty() {
        let errors = validate_settings(&SettingsRecord::new(), &Overrides::none()).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert_eq!(errors[0], SettingsError::Empty(ConfigKey::ConsumerKey));
        assert_eq!(errors[0].field(), "salesforce_consumer_key");
    }

    #[test]
    fn test_invalid_urls() {
        let record = valid()
            .with(ConfigKey::CallbackUrl, "example.org/callback")
            .with(ConfigKey::LoginBaseUrl, "ftp://login.salesforce.com");
        let errors = validate_settings(&record, &Overrides::none()).unwrap_err();
        assert_eq!(
            errors,
            vec![
                SettingsError::InvalidUrl(ConfigKey::CallbackUrl),
                SettingsError::InvalidUrl(ConfigKey::LoginBaseUrl),
            ]
        );
        assert_eq!(errors[1].to_string(), "Login Base URL must be an http(s) URL");
    }

    #[test]
    fn test_overridden_fields_skipped() {
        let overrides = Overrides::none()
            .with(ConfigKey::ConsumerKey, "k")
            .with(ConfigKey::ConsumerSecret, "s")
            .with(ConfigKey::CallbackUrl, "https://example.org/cb")
            .with(ConfigKey::LoginBaseUrl, "https://login.salesforce.com");
        assert!(validate_settings(&SettingsRecord::new(), &overrides).is_ok());
    }
}
