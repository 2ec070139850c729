//! Config registry: versionless institution template/guideline bundles.
//!
//! The pipeline only reads; writes come from the configuration-management
//! side. Documents are parsed into the validated `ConfigDocument` type on
//! read, so a malformed document surfaces as a fault at load time rather
//! than corrupting a classification mid-flight.

use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::StoreError;
use crate::models::ConfigDocument;

/// Whether an upsert created a new document or replaced an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Created,
    Updated,
}

pub trait ConfigStore: Send + Sync {
    fn get(&self, config_id: &str) -> Result<Option<ConfigDocument>, StoreError>;

    /// Create or replace the document, reporting which happened.
    fn put(&self, doc: &ConfigDocument) -> Result<PutOutcome, StoreError>;
}

/// SQLite-backed config registry.
pub struct SqliteConfigStore {
    conn: Mutex<Connection>,
}

impl SqliteConfigStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let conn = self
            .conn
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&conn)
    }
}

impl ConfigStore for SqliteConfigStore {
    fn get(&self, config_id: &str) -> Result<Option<ConfigDocument>, StoreError> {
        self.with_conn(|conn| {
            let data: Option<String> = conn
                .query_row(
                    "SELECT config_data FROM configs WHERE config_id = ?1",
                    params![config_id],
                    |row| row.get(0),
                )
                .optional()?;

            match data {
                None => Ok(None),
                Some(data) => ConfigDocument::from_json(config_id, &data)
                    .map(Some)
                    .map_err(|e| StoreError::MalformedConfig {
                        config_id: config_id.to_string(),
                        reason: e.to_string(),
                    }),
            }
        })
    }

    fn put(&self, doc: &ConfigDocument) -> Result<PutOutcome, StoreError> {
        self.with_conn(|conn| {
            let body = doc
                .to_json()
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            let now = Utc::now();

            let exists: bool = conn
                .query_row(
                    "SELECT 1 FROM configs WHERE config_id = ?1",
                    params![doc.config_id],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();

            if exists {
                conn.execute(
                    "UPDATE configs SET config_data = ?2, updated_at = ?3 WHERE config_id = ?1",
                    params![doc.config_id, body, now],
                )?;
                Ok(PutOutcome::Updated)
            } else {
                conn.execute(
                    "INSERT INTO configs (config_id, config_data, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![doc.config_id, body, now, now],
                )?;
                Ok(PutOutcome::Created)
            }
        })
    }
}
