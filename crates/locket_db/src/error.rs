//! Error types shared by every engine adapter and the prefix layer.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type DbResult<T> = Result<T, DbError>;

/// Errors that can occur during store operations.
///
/// The first four variants are the stable taxonomy every adapter reports
/// identically. They are detected before anything reaches the engine, so a
/// call failing with one of them has no side effects. The remaining variants
/// carry the engine's own error untouched.
#[derive(Debug, Error)]
pub enum DbError {
    /// A zero-length key was given where a key (or range bound) is required.
    #[error("key cannot be empty")]
    KeyEmpty,

    /// A value was absent where a (possibly empty) value is required.
    #[error("value cannot be nil")]
    ValueNil,

    /// The batch has already been written or closed.
    #[error("batch has been written or closed")]
    BatchClosed,

    /// No constructor is registered under the requested engine id.
    #[error("unknown db engine: {0}")]
    UnknownEngine(String),

    /// Engine options were rejected before opening.
    #[error("invalid engine options: {0}")]
    InvalidOptions(String),

    /// An I/O error occurred outside the engine (e.g. creating directories).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Error reported by the redb engine.
    #[cfg(feature = "redb")]
    #[error("redb: {0}")]
    Redb(#[from] redb::Error),

    /// Error reported by the sled engine.
    #[cfg(feature = "sled")]
    #[error("sled: {0}")]
    Sled(#[from] sled::Error),
}

impl DbError {
    /// Creates an unknown engine error.
    pub fn unknown_engine(id: impl Into<String>) -> Self {
        Self::UnknownEngine(id.into())
    }

    /// Creates an invalid options error.
    pub fn invalid_options(message: impl Into<String>) -> Self {
        Self::InvalidOptions(message.into())
    }

    /// Returns true for the precondition kinds that never reach the engine.
    #[must_use]
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::KeyEmpty | Self::ValueNil | Self::BatchClosed)
    }
}

/// Rejects a zero-length key.
pub(crate) fn check_key(key: &[u8]) -> DbResult<()> {
    if key.is_empty() {
        return Err(DbError::KeyEmpty);
    }
    Ok(())
}

/// Rejects a range bound that is present but zero-length.
pub(crate) fn check_bounds(start: Option<&[u8]>, end: Option<&[u8]>) -> DbResult<()> {
    if matches!(start, Some(s) if s.is_empty()) || matches!(end, Some(e) if e.is_empty()) {
        return Err(DbError::KeyEmpty);
    }
    Ok(())
}

/// Validates a value coming from an untyped source.
///
/// Typed callers pass `&[u8]` and can never hit `ValueNil`; callers that
/// receive optional input (a missing command-line argument, a decoded
/// message with no payload) go through here so the failure is reported with
/// the shared error kind.
///
/// # Errors
///
/// Returns [`DbError::ValueNil`] if `value` is `None`.
pub fn require_value(value: Option<&[u8]>) -> DbResult<&[u8]> {
    value.ok_or(DbError::ValueNil)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_check_key_rejects_empty() {
        assert!(matches!(check_key(b""), Err(DbError::KeyEmpty)));
        assert!(check_key(b"k").is_ok());
    }

    #[test]
    fn error_check_bounds_allows_unbounded() {
        assert!(check_bounds(None, None).is_ok());
        assert!(check_bounds(Some(b"a"), None).is_ok());
        assert!(check_bounds(None, Some(b"z")).is_ok());
    }

    #[test]
    fn error_check_bounds_rejects_empty_bound() {
        assert!(matches!(check_bounds(Some(b""), None), Err(DbError::KeyEmpty)));
        assert!(matches!(check_bounds(None, Some(b"")), Err(DbError::KeyEmpty)));
    }

    #[test]
    fn error_require_value() {
        assert!(matches!(require_value(None), Err(DbError::ValueNil)));
        assert_eq!(require_value(Some(b"")).unwrap(), b"");
    }

    #[test]
    fn error_precondition_kinds() {
        assert!(DbError::KeyEmpty.is_precondition());
        assert!(DbError::BatchClosed.is_precondition());
        assert!(!DbError::unknown_engine("x").is_precondition());
        assert_eq!(
            DbError::unknown_engine("leveldb").to_string(),
            "unknown db engine: leveldb"
        );
    }
}
