//! Error types for store and snapshot operations.

use thiserror::Error;

/// Errors from store operations.
///
/// Snapshot failures fall into three classes: the filesystem refused
/// ([`StoreError::Io`]), the mapping could not be encoded
/// ([`StoreError::Serialization`]), or the bytes on disk could not be decoded
/// into a mapping ([`StoreError::Deserialization`]).
#[derive(Debug, Error)]
pub enum StoreError {
    /// The snapshot file could not be created, opened, read, or written.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The mapping could not be encoded into the snapshot format.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The snapshot bytes are truncated, corrupt, or of the wrong shape.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Keys must be non-empty strings.
    #[error("invalid key {0:?}: keys must be non-empty")]
    InvalidKey(String),

    /// A configuration file could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl StoreError {
    /// Returns `true` for filesystem failures.
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io(_))
    }

    /// Returns `true` for encoding failures.
    pub fn is_serialization(&self) -> bool {
        matches!(self, Self::Serialization(_))
    }

    /// Returns `true` for decoding failures.
    pub fn is_deserialization(&self) -> bool {
        matches!(self, Self::Deserialization(_))
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: StoreError = io.into();
        assert!(err.is_io());
        assert!(!err.is_deserialization());
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn classification_helpers() {
        assert!(StoreError::Serialization("x".into()).is_serialization());
        assert!(StoreError::Deserialization("x".into()).is_deserialization());
        assert!(!StoreError::InvalidKey(String::new()).is_io());
    }

    #[test]
    fn invalid_key_display_quotes_key() {
        let err = StoreError::InvalidKey(String::new());
        assert_eq!(err.to_string(), "invalid key \"\": keys must be non-empty");
    }
}
