//! Settings storage repository.

use sfrest_oauth::{Overrides, SettingsRecord};
use tracing::info;

use super::validation::validate_settings;
use crate::options::OptionStore;
use crate::{Error, Result};

/// Option name holding the settings record.
pub const SETTINGS_OPTION: &str = "salesforce_settings";

/// Repository for the mutable settings record.
#[derive(Debug, Clone)]
pub struct SettingsRepository {
    options: OptionStore,
}

impl SettingsRepository {
    /// Creates a repository over an option store.
    #[must_use]
    pub const fn new(options: OptionStore) -> Self {
        Self { options }
    }

    /// Loads the settings record; empty when never saved.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn load(&self) -> Result<SettingsRecord> {
        Ok(self
            .options
            .get(SETTINGS_OPTION)
            .await?
            .unwrap_or_default())
    }

    /// Validates and saves a settings record.
    ///
    /// Overridden fields are not validated, since their stored values are
    /// never used.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if a field is empty or malformed, or an
    /// error if the database write fails.
    pub async fn save(&self, record: &SettingsRecord, overrides: &Overrides) -> Result<()> {
        validate_settings(record, overrides).map_err(Error::Validation)?;
        self.options.update(SETTINGS_OPTION, record).await?;
        info!("Salesforce settings saved");
        Ok(())
    }
}
