use std::path::PathBuf;
use thiserror::Error;

pub type CatalogResult<T> = Result<T, CatalogError>;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("{kind} '{value}' already exists")]
    DuplicateKey { kind: &'static str, value: String },

    #[error("{kind} '{value}' not found")]
    NotFound { kind: &'static str, value: String },

    #[error("cannot access {path:?}: {source}")]
    FilesystemUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} must not be empty")]
    EmptyInput(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl CatalogError {
    pub fn duplicate(kind: &'static str, value: impl Into<String>) -> Self {
        CatalogError::DuplicateKey { kind, value: value.into() }
    }

    pub fn not_found(kind: &'static str, value: impl ToString) -> Self {
        CatalogError::NotFound { kind, value: value.to_string() }
    }

    pub fn unavailable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CatalogError::FilesystemUnavailable { path: path.into(), source }
    }
}

/// True when a rusqlite error is a UNIQUE / PRIMARY KEY violation.
pub fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// Trims `value` and rejects it when nothing is left.
pub fn require_non_empty<'a>(field: &'static str, value: &'a str) -> CatalogResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CatalogError::EmptyInput(field));
    }
    Ok(trimmed)
}
