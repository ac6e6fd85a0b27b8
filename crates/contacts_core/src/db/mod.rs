//! SQLite bootstrap for the local document backend.
//!
//! # Responsibility
//! - Open connections and bring the `documents` schema up to date.
//! - Report bootstrap failures with the same `StoreErrorKind`s the
//!   collection uses for request failures.
//!
//! # Invariants
//! - The schema version lives in `PRAGMA user_version`.
//! - No document is read or written before migrations succeed.

use crate::store::{StoreError, StoreErrorKind};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

/// Failure while opening or migrating a document database.
#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// The file was written by a newer build with more migrations.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl DbError {
    /// Store-level category of this failure.
    pub fn kind(&self) -> StoreErrorKind {
        match self {
            Self::Sqlite(err) => classify_sqlite(err),
            Self::UnsupportedSchemaVersion { .. } => StoreErrorKind::Backend,
        }
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "document database bootstrap failed: {err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "documents schema v{db_version} requires a newer build (this build knows up to v{latest_supported})"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        StoreError::with_source(value.kind(), value)
    }
}

/// Maps a SQLite result code onto the store error kinds.
///
/// An unreadable path is a reachability problem. A readable file that is
/// not a database is bad data, and retrying will not help.
pub(crate) fn classify_sqlite(err: &rusqlite::Error) -> StoreErrorKind {
    use rusqlite::ErrorCode;

    match err.sqlite_error_code() {
        Some(ErrorCode::CannotOpen) => StoreErrorKind::Connection,
        Some(ErrorCode::DatabaseCorrupt | ErrorCode::NotADatabase) => StoreErrorKind::Corrupt,
        _ => StoreErrorKind::Backend,
    }
}
