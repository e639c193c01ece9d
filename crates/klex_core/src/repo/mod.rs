//! Relational gateway: one repository per catalog aggregate.
//!
//! # Responsibility
//! - Compose statements against the shared `ConnectionSession`.
//! - Implement cascading writes the schema does not declare: replace-all
//!   child sync, key-rename repointing, multi-level cascade delete.
//!
//! # Invariants
//! - Write paths call `validate()` before any SQL mutation.
//! - Nothing here commits or rolls back; callers own the transaction.
//! - A failed statement inside a cascade leaves earlier statements applied
//!   in the open transaction until the caller rolls back.
//! - Rename updates report the matched row count; a stale previous key is
//!   zero rows, not an error.

use crate::db::DbError;
use crate::model::{FileId, ValidationError};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod album_repo;
pub mod artist_repo;
pub mod category_repo;
pub mod discovery_repo;
pub mod film_repo;
pub mod media_repo;
pub mod sync;
pub mod track_repo;
pub mod user_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Gateway error for catalog persistence and hydration.
#[derive(Debug)]
pub enum RepoError {
    Validation(ValidationError),
    /// Store failure (`DatabaseError`).
    Db(DbError),
    NotFound(String),
    /// Persisted rows that cannot be hydrated into a valid entity.
    InvalidData(String),
    /// The media file is already linked to a film or a track.
    AlreadyLinked(FileId),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(what) => write!(f, "not found: {what}"),
            Self::InvalidData(message) => write!(f, "invalid persisted catalog data: {message}"),
            Self::AlreadyLinked(file_id) => {
                write!(f, "media file {file_id} is already linked to a film or track")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound(_) => None,
            Self::InvalidData(_) => None,
            Self::AlreadyLinked(_) => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Reads an unsigned column, rejecting negative persisted values.
pub(crate) fn get_u32(row: &rusqlite::Row<'_>, column: &str) -> RepoResult<u32> {
    let value: i64 = row.get(column)?;
    u32::try_from(value)
        .map_err(|_| RepoError::InvalidData(format!("column `{column}` holds `{value}`")))
}
