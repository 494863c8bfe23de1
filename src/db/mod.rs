pub mod repository;
pub mod sqlite;

pub use repository::SqliteStore;
pub use sqlite::*;

use thiserror::Error;

use crate::error::CareError;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for CareError {
    fn from(err: rusqlite::Error) -> Self {
        CareError::Database(DatabaseError::Sqlite(err))
    }
}
