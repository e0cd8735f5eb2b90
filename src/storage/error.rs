//! Storage error types

use crate::storage::PageId;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Alias '{alias}' already maps to page {existing}, refusing to remap it to {requested}")]
    Conflict {
        alias: String,
        existing: PageId,
        requested: PageId,
    },

    #[error("Dangling reference to unknown page {0}")]
    DanglingReference(PageId),

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Page identity invariant violated: {0}")]
    IdentityViolation(String),

    #[error("Storage still busy after {attempts} attempts: {source}")]
    Transient {
        attempts: u32,
        source: rusqlite::Error,
    },

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Returns true for lookups on a missing id or key
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns true for failures that may succeed if the operation is retried later
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transient { .. } => true,
            Self::Sqlite(err) => is_busy(err),
            _ => false,
        }
    }

    /// Returns true for errors that indicate a broken store and must abort the crawl
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::IdentityViolation(_) | Self::SchemaMismatch(_) | Self::Io(_)
        ) || matches!(self, Self::Sqlite(err) if is_corruption(err))
    }
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Lock contention with another connection
pub(crate) fn is_busy(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(code, _)
            if matches!(
                code.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            )
    )
}

pub(crate) fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(code, message) => {
            code.code == rusqlite::ErrorCode::ConstraintViolation
                || message.as_deref().is_some_and(|value| {
                    value.contains("UNIQUE constraint failed")
                        || value.contains("PRIMARY KEY constraint failed")
                })
        }
        _ => false,
    }
}

fn is_corruption(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(code, _)
            if matches!(
                code.code,
                rusqlite::ErrorCode::DatabaseCorrupt | rusqlite::ErrorCode::NotADatabase
            )
    )
}
