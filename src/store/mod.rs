pub mod config_store;
pub mod job_store;
pub mod object_store;
pub mod sqlite;

pub use config_store::*;
pub use job_store::*;
pub use object_store::*;
pub use sqlite::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("object not found: {store_ref}/{key}")]
    ObjectNotFound { store_ref: String, key: String },

    #[error("invalid object key: {0}")]
    InvalidKey(String),

    #[error("malformed config document {config_id}: {reason}")]
    MalformedConfig { config_id: String, reason: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },
}
