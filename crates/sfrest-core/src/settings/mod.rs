//! Salesforce connection settings.
//!
//! Provides settings storage, validation, and the per-field view used by the
//! settings tab.

mod repository;
mod validation;

pub use repository::{SETTINGS_OPTION, SettingsRepository};
pub use validation::{SettingsError, validate_settings};

use sfrest_oauth::{ConfigKey, Overrides, SettingsRecord};

/// One row of the settings form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsField {
    /// Which setting.
    pub key: ConfigKey,
    /// Stored value (empty when overridden).
    pub value: String,
    /// Whether the environment defines this value, making it read-only.
    pub overridden: bool,
}

impl SettingsField {
    /// Form field label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        self.key.label()
    }
}

/// Lists the settings form rows. Overridden values are never echoed.
#[must_use]
pub fn settings_fields(record: &SettingsRecord, overrides: &Overrides) -> Vec<SettingsField> {
    ConfigKey::ALL
        .into_iter()
        .map(|key| {
            let overridden = overrides.contains(key);
            SettingsField {
                key,
                value: if overridden {
                    String::new()
                } else {
                    record.value(key).to_string()
                },
                overridden,
            }
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_overridden_value_hidden() {
        let record = SettingsRecord::new()
            .with(ConfigKey::ConsumerKey, "stored-key")
            .with(ConfigKey::ConsumerSecret, "stored-secret");
        let overrides = Overrides::none().with(ConfigKey::ConsumerSecret, "env-secret");

        let fields = settings_fields(&record, &overrides);
        assert_eq!(fields.len(), 4);
        assert_eq!(fields[0].value, "stored-key");
        assert!(!fields[0].overridden);
        assert_eq!(fields[1].value, "");
        assert!(fields[1].overridden);
        assert_eq!(fields[1].label(), "Consumer Secret");
    }
}
