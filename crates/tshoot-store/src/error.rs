//! Error types for the persistence layer

use std::path::PathBuf;

/// Failures reading or writing persisted state
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Backing file could not be read or written
    #[error("i/o error on {}: {source}", path.display())]
    Io {
        /// File being accessed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Value could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Backing file exists but is not a JSON object
    #[error("store file {} does not contain a JSON object", .0.display())]
    Corrupt(PathBuf),

    /// A key holds a value of the wrong shape
    #[error("unexpected value under key {key}: {reason}")]
    InvalidValue {
        /// Offending key
        key: String,
        /// Decoder message
        reason: String,
    },
}

impl StoreError {
    /// I/O failures may succeed on a later request; shape errors will not
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io { .. })
    }
}
