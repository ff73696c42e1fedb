//! Named option storage.
//!
//! Each option is one JSON value stored under a unique name, so a whole
//! record is always read and written in a single statement.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::debug;

use crate::Result;

/// SQLite-backed option table shared by the settings and token repositories.
#[derive(Debug, Clone)]
pub struct OptionStore {
    pool: SqlitePool,
}

impl OptionStore {
    /// Opens (or creates) the database at `database_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn new(database_path: &str) -> Result<Self> {
        let url = format!("sqlite:{database_path}?mode=rwc");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let store = Self { pool };
        store.initialize().await?;
        Ok(store)
    }

    /// Create an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.initialize().await?;
        Ok(store)
    }

    /// Initialize database schema.
    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS options (
                name TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Reads option `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the stored value does not decode.
    pub async fn get<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        let row = sqlx::query("SELECT value FROM options WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let value: String = row.get("value");
                Ok(Some(serde_json::from_str(&value)?))
            }
            None => Ok(None),
        }
    }

    /// Writes option `name`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the query fails.
    pub async fn update<T: Serialize + Sync>(&self, name: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        sqlx::query(
            r"
            INSERT INTO options (name, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            ",
        )
        .bind(name)
        .bind(json)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!("Updated option {name}");
        Ok(())
    }

    /// Deletes option `name`. Missing options are not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn delete(&self, name: &str) -> Result<()> {
        sqlx::query("DELETE FROM options WHERE name = ?")
            .bind(name)
            .execute(&self.pool)
            .await?;

        debug!("Deleted option {name}");
        Ok(())
    }

    /// When option `name` was last written.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn updated_at(&self, name: &str) -> Result<Option<DateTime<Utc>>> {
        let row = sqlx::query("SELECT updated_at FROM options WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.and_then(|row| {
            let raw: String = row.get("updated_at");
            DateTime::parse_from_rfc3339(&raw)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        }))
    }
}
