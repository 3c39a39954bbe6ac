// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for bk-core operations.

use thiserror::Error;

/// All possible errors that can occur in bk-core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cache entry not found: {0}")]
    EntryNotFound(String),

    #[error("pending operation not found: {0}")]
    OperationNotFound(i64),

    #[error("invalid operation kind: '{0}'\n  hint: valid kinds are: bookmark_add, bookmark_remove, save_offline_add, save_offline_remove, content_update")]
    InvalidOpKind(String),

    #[error("invalid cache key: {0}")]
    InvalidKey(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("database error: {0}")]
    Database(#[source] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupted data: {0}")]
    CorruptedData(String),

    #[error("storage lock poisoned")]
    LockPoisoned,
}

impl From<rusqlite::Error> for Error {
    /// Row decoders report bad column values as [`Error::CorruptedData`]
    /// wrapped in a conversion failure; surface those directly.
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::FromSqlConversionFailure(_, _, inner) = &err {
            if let Some(Error::CorruptedData(msg)) = inner.downcast_ref::<Error>() {
                return Error::CorruptedData(msg.clone());
            }
        }
        Error::Database(err)
    }
}

/// A specialized Result type for bk-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
