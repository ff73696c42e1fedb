//! Salesforce provider configuration.
//!
//! Every field is read from an immutable override source first (environment
//! variables in production) and falls back to the mutable settings record.
//! A [`ConfigResolver`] resolves each field once, on first use, and keeps the
//! value fixed for its own lifetime.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::{AuthError, Result};

/// Provider configuration keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConfigKey {
    /// Connected app consumer key (`OAuth2` client id).
    ConsumerKey,
    /// Connected app consumer secret.
    ConsumerSecret,
    /// Redirect URI registered on the connected app.
    CallbackUrl,
    /// Login host, e.g. `https://login.salesforce.com`.
    LoginBaseUrl,
}

impl ConfigKey {
    /// All keys in settings-form order.
    pub const ALL: [Self; 4] = [
        Self::ConsumerKey,
        Self::ConsumerSecret,
        Self::CallbackUrl,
        Self::LoginBaseUrl,
    ];

    /// Key inside the mutable settings record.
    #[must_use]
    pub const fn setting_name(self) -> &'static str {
        match self {
            Self::ConsumerKey => "salesforce_consumer_key",
            Self::ConsumerSecret => "salesforce_consumer_secret",
            Self::CallbackUrl => "salesforce_callback_url",
            Self::LoginBaseUrl => "salesforce_base_url",
        }
    }

    /// Environment variable that overrides the setting.
    #[must_use]
    pub const fn override_name(self) -> &'static str {
        match self {
            Self::ConsumerKey => "SALESFORCE_CONSUMER_KEY",
            Self::ConsumerSecret => "SALESFORCE_CONSUMER_SECRET",
            Self::CallbackUrl => "SALESFORCE_CALLBACK_URL",
            Self::LoginBaseUrl => "SALESFORCE_LOGIN_BASE_URL",
        }
    }

    /// Label shown next to the settings field.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::ConsumerKey => "Consumer Key",
            Self::ConsumerSecret => "Consumer Secret",
            Self::CallbackUrl => "Callback URL",
            Self::LoginBaseUrl => "Login Base URL",
        }
    }

    /// Whether the value must be an absolute URL.
    #[must_use]
    pub const fn is_url(self) -> bool {
        matches!(self, Self::CallbackUrl | Self::LoginBaseUrl)
    }

    /// Looks a key up by its settings record name.
    #[must_use]
    pub fn from_setting_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.setting_name() == name)
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.setting_name())
    }
}

/// Source of provider configuration values.
pub trait ConfigStore {
    /// Value from the mutable settings record.
    fn get(&self, key: ConfigKey) -> Option<String>;

    /// Whether the immutable override source defines `key`.
    fn is_overridden(&self, key: ConfigKey) -> bool;

    /// Value from the immutable override source.
    fn get_override(&self, key: ConfigKey) -> Option<String>;
}

impl<C: ConfigStore + ?Sized> ConfigStore for &C {
    fn get(&self, key: ConfigKey) -> Option<String> {
        (**self).get(key)
    }

    fn is_overridden(&self, key: ConfigKey) -> bool {
        (**self).is_overridden(key)
    }

    fn get_override(&self, key: ConfigKey) -> Option<String> {
        (**self).get_override(key)
    }
}

/// The mutable settings record, keyed by [`ConfigKey::setting_name`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SettingsRecord(BTreeMap<String, String>);

impl SettingsRecord {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a record from form input, trimming values and dropping unknown keys.
    #[must_use]
    pub fn sanitized<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut record = Self::new();
        for (name, value) in pairs {
            if let Some(key) = ConfigKey::from_setting_name(name.as_ref()) {
                record.set(key, value.as_ref());
            }
        }
        record
    }

    /// Sets a value (trimmed).
    pub fn set(&mut self, key: ConfigKey, value: impl AsRef<str>) {
        self.0
            .insert(key.setting_name().to_string(), value.as_ref().trim().to_string());
    }

    /// Sets a value, builder style.
    #[must_use]
    pub fn with(mut self, key: ConfigKey, value: impl AsRef<str>) -> Self {
        self.set(key, value);
        self
    }

    /// Returns the stored value, or an empty string when absent.
    #[must_use]
    pub fn value(&self, key: ConfigKey) -> &str {
        self.0.get(key.setting_name()).map_or("", String::as_str)
    }
}

/// Immutable override values.
#[derive(Debug, Clone, Default)]
pub struct Overrides(HashMap<ConfigKey, String>);

impl Overrides {
    /// No overrides.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Snapshots the `SALESFORCE_*` environment variables that are set.
    #[must_use]
    pub fn from_env() -> Self {
        let values = ConfigKey::ALL
            .into_iter()
            .filter_map(|key| {
                std::env::var(key.override_name())
                    .ok()
                    .map(|value| (key, value))
            })
            .collect();
        Self(values)
    }

    /// Whether `key` is overridden.
    #[must_use]
    pub fn contains(&self, key: ConfigKey) -> bool {
        self.0.contains_key(&key)
    }

    /// Adds an override, builder style.
    #[must_use]
    pub fn with(mut self, key: ConfigKey, value: impl Into<String>) -> Self {
        self.0.insert(key, value.into());
        self
    }
}

/// Overrides layered on top of the settings record.
#[derive(Debug, Clone, Default)]
pub struct LayeredConfig {
    overrides: Overrides,
    settings: SettingsRecord,
}

impl LayeredConfig {
    /// Creates a layered configuration.
    #[must_use]
    pub const fn new(overrides: Overrides, settings: SettingsRecord) -> Self {
        Self { overrides, settings }
    }

    /// The mutable settings layer.
    #[must_use]
    pub const fn settings(&self) -> &SettingsRecord {
        &self.settings
    }
}

impl ConfigStore for LayeredConfig {
    fn get(&self, key: ConfigKey) -> Option<String> {
        let value = self.settings.value(key);
        (!value.is_empty()).then(|| value.to_string())
    }

    fn is_overridden(&self, key: ConfigKey) -> bool {
        self.overrides.contains(key)
    }

    fn get_override(&self, key: ConfigKey) -> Option<String> {
        self.overrides.0.get(&key).cloned()
    }
}

/// Resolves provider configuration once per field and keeps it fixed.
pub struct ConfigResolver<C> {
    store: C,
    consumer_key: OnceLock<String>,
    consumer_secret: OnceLock<String>,
    callback_url: OnceLock<String>,
    login_base_url: OnceLock<String>,
}

impl<C: ConfigStore> ConfigResolver<C> {
    /// Creates a resolver over `store`. Nothing is read until first use.
    #[must_use]
    pub const fn new(store: C) -> Self {
        Self {
            store,
            consumer_key: OnceLock::new(),
            consumer_secret: OnceLock::new(),
            callback_url: OnceLock::new(),
            login_base_url: OnceLock::new(),
        }
    }

    const fn cell(&self, key: ConfigKey) -> &OnceLock<String> {
        match key {
            ConfigKey::ConsumerKey => &self.consumer_key,
            ConfigKey::ConsumerSecret => &self.consumer_secret,
            ConfigKey::CallbackUrl => &self.callback_url,
            ConfigKey::LoginBaseUrl => &self.login_base_url,
        }
    }

    /// Resolves one field: the override when defined, else the settings value.
    ///
    /// The first answer is cached; later changes to the store are not observed.
    pub fn resolve(&self, key: ConfigKey) -> &str {
        self.cell(key).get_or_init(|| {
            let value = if self.store.is_overridden(key) {
                debug!("{key} resolved from override");
                self.store.get_override(key)
            } else {
                self.store.get(key)
            };
            value.unwrap_or_default().trim().to_string()
        })
    }

    /// Whether `key` comes from the immutable override source.
    pub fn is_overridden(&self, key: ConfigKey) -> bool {
        self.store.is_overridden(key)
    }

    /// Resolves and validates the complete provider configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] if a field is empty or a URL field is not
    /// an absolute URL.
    pub fn provider_config(&self) -> Result<ProviderConfig> {
        for key in ConfigKey::ALL {
            if self.resolve(key).is_empty() {
                return Err(AuthError::Config(format!("{} is not set", key.label())));
            }
        }

        let callback_url = self.resolve(ConfigKey::CallbackUrl);
        Url::parse(callback_url).map_err(|e| {
            let label = ConfigKey::CallbackUrl.label();
            AuthError::Config(format!("{label} '{callback_url}' is invalid: {e}"))
        })?;

        let base = self.resolve(ConfigKey::LoginBaseUrl);
        Url::parse(base).map_err(|e| {
            let label = ConfigKey::LoginBaseUrl.label();
            AuthError::Config(format!("{label} '{base}' is invalid: {e}"))
        })?;

        Ok(ProviderConfig {
            client_id: self.resolve(ConfigKey::ConsumerKey).to_string(),
            client_secret: self.resolve(ConfigKey::ConsumerSecret).to_string(),
            callback_url: callback_url.to_string(),
            authorize_base_url: base.trim_end_matches('/').to_string(),
        })
    }
}

impl<C> fmt::Debug for ConfigResolver<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigResolver")
            .field("callback_url", &self.callback_url.get())
            .field("login_base_url", &self.login_base_url.get())
            .finish_non_exhaustive()
    }
}

/// Resolved Salesforce connected-app configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Consumer key.
    pub client_id: String,
    /// Consumer secret.
    pub client_secret: String,
    /// Redirect URI, sent verbatim in the token exchange.
    pub callback_url: String,
    /// Login base URL without a trailing slash.
    pub authorize_base_url: String,
}

impl ProviderConfig {
    /// Authorization endpoint.
    #[must_use]
    pub fn authorize_endpoint(&self) -> String {
        format!("{}/services/oauth2/authorize", self.authorize_base_url)
    }

    /// Token endpoint.
    #[must_use]
    pub fn token_endpoint(&self) -> String {
        format!("{}/services/oauth2/token", self.authorize_base_url)
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("client_id", &crate::error::REDACTED)
            .field("client_secret", &crate::error::REDACTED)
            .field("callback_url", &self.callback_url)
            .field("authorize_base_url", &self.authorize_base_url)
            .finish()
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::cell::Cell;

    fn complete_settings() -> SettingsRecord {
        SettingsRecord::new()
            .with(ConfigKey::ConsumerKey, "key-from-settings")
            .with(ConfigKey::ConsumerSecret, "secret-from-settings")
            .with(
                ConfigKey::CallbackUrl,
                "https://example.org/wp-admin/options-general.php?page=sfrest&tab=authorize",
            )
            .with(ConfigKey::LoginBaseUrl, "https://login.salesforce.com/")
    }

    /// Counts reads so resolve-once can be observed.
    struct CountingStore {
        reads: Cell<u32>,
    }

    impl ConfigStore for CountingStore {
        fn get(&self, _key: ConfigKey) -> Option<String> {
            self.reads.set(self.reads.get() + 1);
            Some(format!("value-{}", self.reads.get()))
        }

        fn is_overridden(&self, _key: ConfigKey) -> bool {
            false
        }

        fn get_override(&self, _key: ConfigKey) -> Option<String> {
            None
        }
    }

    #[test]
    fn test_settings_used_without_override() {
        let resolver =
            ConfigResolver::new(LayeredConfig::new(Overrides::none(), complete_settings()));
        assert_eq!(resolver.resolve(ConfigKey::ConsumerKey), "key-from-settings");
        assert!(!resolver.is_overridden(ConfigKey::ConsumerKey));
    }

    #[test]
    fn test_override_wins_over_settings() {
        let overrides = Overrides::none().with(ConfigKey::ConsumerSecret, "secret-from-env");
        let resolver = ConfigResolver::new(LayeredConfig::new(overrides, complete_settings()));
        assert_eq!(resolver.resolve(ConfigKey::ConsumerSecret), "secret-from-env");
        assert!(resolver.is_overridden(ConfigKey::ConsumerSecret));
    }

    #[test]
    fn test_empty_override_still_wins() {
        let overrides = Overrides::none().with(ConfigKey::ConsumerKey, "");
        let resolver = ConfigResolver::new(LayeredConfig::new(overrides, complete_settings()));
        assert_eq!(resolver.resolve(ConfigKey::ConsumerKey), "");
        assert!(matches!(resolver.provider_config(), Err(AuthError::Config(_))));
    }

    #[test]
    fn test_resolves_each_field_once() {
        let resolver = ConfigResolver::new(CountingStore { reads: Cell::new(0) });
        assert_eq!(resolver.resolve(ConfigKey::ConsumerKey), "value-1");
        assert_eq!(resolver.resolve(ConfigKey::ConsumerKey), "value-1");
        assert_eq!(resolver.resolve(ConfigKey::CallbackUrl), "value-2");
        assert_eq!(resolver.store.reads.get(), 2);
    }

    #[test]
    fn test_provider_config_trims_base_url() {
        let resolver =
            ConfigResolver::new(LayeredConfig::new(Overrides::none(), complete_settings()));
        let config = resolver.provider_config().unwrap();
        assert_eq!(config.authorize_base_url, "https://login.salesforce.com");
        assert_eq!(
            config.token_endpoint(),
            "https://login.salesforce.com/services/oauth2/token"
        );
    }

    #[test]
    fn test_provider_config_missing_field() {
        let settings = complete_settings().with(ConfigKey::CallbackUrl, "   ");
        let resolver = ConfigResolver::new(LayeredConfig::new(Overrides::none(), settings));
        let err = resolver.provider_config().unwrap_err();
        assert!(err.to_string().contains("Callback URL is not set"));
    }

    #[test]
    fn test_provider_config_invalid_url() {
        let settings = complete_settings().with(ConfigKey::LoginBaseUrl, "login.salesforce.com");
        let resolver = ConfigResolver::new(LayeredConfig::new(Overrides::none(), settings));
        assert!(matches!(resolver.provider_config(), Err(AuthError::Config(_))));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let resolver =
            ConfigResolver::new(LayeredConfig::new(Overrides::none(), complete_settings()));
        let rendered = format!("{:?}", resolver.provider_config().unwrap());
        assert!(!rendered.contains("secret-from-settings"));
        assert!(!rendered.contains("key-from-settings"));
    }

    #[test]
    fn test_sanitized_drops_unknown_keys() {
        let record = SettingsRecord::sanitized([
            ("salesforce_consumer_key", "  abc  "),
            ("advanced_option", "ignored"),
        ]);
        assert_eq!(record.value(ConfigKey::ConsumerKey), "abc");
        assert_eq!(record, SettingsRecord::new().with(ConfigKey::ConsumerKey, "abc"));
    }

    #[test]
    fn test_settings_record_json_shape() {
        let record =
            SettingsRecord::new().with(ConfigKey::LoginBaseUrl, "https://test.salesforce.com");
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"salesforce_base_url":"https://test.salesforce.com"}"#);
    }

    proptest! {
        #[test]
        fn prop_override_always_wins(setting in "[a-zA-Z0-9]{1,16}", over in "[a-zA-Z0-9]{1,16}") {
            for key in ConfigKey::ALL {
                let settings = SettingsRecord::new().with(key, &setting);
                let overrides = Overrides::none().with(key, over.clone());
                let resolver = ConfigResolver::new(LayeredConfig::new(overrides, settings));
                prop_assert_eq!(resolver.resolve(key), over.as_str());
            }
        }
    }
}
