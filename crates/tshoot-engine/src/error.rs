//! Error types for the engine
//!
//! Only storage trouble escapes as [`EngineError`]. Authorization failures
//! become confirmation prompts, probe failures become rollbacks and session
//! mismatches become "not troubleshooting".

use crate::transaction::TransactionState;
use tshoot_auth::AuthError;
use tshoot_store::StoreError;

/// Engine failures
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Persisted state could not be read or written
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Signing key could not be loaded
    #[error("authorization setup failed: {0}")]
    Auth(#[from] AuthError),

    /// Configuration rejected
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Request URL could not be parsed
    #[error("invalid request url {url}: {source}")]
    InvalidUrl {
        /// Offending text
        url: String,
        /// Parser error
        #[source]
        source: url::ParseError,
    },

    /// Transaction state machine violated
    #[error("illegal transaction transition {from:?} -> {to:?}")]
    IllegalTransition {
        /// State before
        from: TransactionState,
        /// Requested state
        to: TransactionState,
    },
}

impl EngineError {
    /// Whether repeating the request could succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(e) => e.is_retryable(),
            Self::Auth(AuthError::Store(e)) => e.is_retryable(),
            _ => false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("cannot read {path}: {source}")]
    Read {
        /// Config file path
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// TOML could not be parsed
    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// A field holds an unusable value
    #[error("invalid value for {field}: {reason}")]
    InvalidField {
        /// Field name
        field: &'static str,
        /// What is wrong
        reason: String,
    },
}
