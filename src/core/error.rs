/// Dalite Error Module
///
/// This module defines the error taxonomy for the data-access layer.
/// Constraint breaches are surfaced as a dedicated, recoverable variant
/// carrying the violated constraint and the engine's detail message;
/// everything else from the engine propagates unchanged.
use thiserror::Error;

/// Error type for all data-access layer operations.
///
/// The taxonomy follows the layer's contract:
/// - `ConstraintViolation` is recoverable and triggers rollback at the
///   enclosing transaction or batch boundary.
/// - `UseAfterClose` is a programmer error: the store handle is terminal
///   once closed.
/// - `Database` carries any other engine failure unchanged.
#[derive(Error, Debug)]
pub enum DalError {
    /// Uniqueness or referential-integrity breach reported by the engine
    #[error("Constraint violation ({constraint}): {detail}")]
    ConstraintViolation { constraint: String, detail: String },

    /// An operation was attempted on a closed store handle
    #[error("Store handle used after close")]
    UseAfterClose,

    /// Any other database error from SQLite operations
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Malformed query input (bad field name, unusable filter)
    #[error("Query error: {0}")]
    Query(String),

    /// Configuration loading and validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system and I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DalError {
    /// Translates an engine error, promoting constraint failures to the
    /// typed `ConstraintViolation` variant.
    pub(crate) fn from_engine(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(code, msg)
                if code.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                DalError::ConstraintViolation {
                    constraint: constraint_kind(code.extended_code).to_string(),
                    detail: msg.unwrap_or_else(|| "constraint failed".to_string()),
                }
            }
            other => DalError::Database(other),
        }
    }

    /// Whether this error is a constraint breach (and thus recoverable).
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, DalError::ConstraintViolation { .. })
    }
}

/// Names the constraint class from SQLite's extended result code.
fn constraint_kind(extended_code: std::os::raw::c_int) -> &'static str {
    use rusqlite::ffi;

    match extended_code {
        ffi::SQLITE_CONSTRAINT_UNIQUE => "UNIQUE",
        ffi::SQLITE_CONSTRAINT_FOREIGNKEY => "FOREIGN KEY",
        ffi::SQLITE_CONSTRAINT_NOTNULL => "NOT NULL",
        ffi::SQLITE_CONSTRAINT_PRIMARYKEY => "PRIMARY KEY",
        ffi::SQLITE_CONSTRAINT_CHECK => "CHECK",
        _ => "CONSTRAINT",
    }
}

/// Type alias for Result to use DalError as the error type.
pub type Result<T> = std::result::Result<T, DalError>;
