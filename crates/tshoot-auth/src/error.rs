//! Authorization errors

use tshoot_store::StoreError;

/// Why an action token was refused
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No token accompanied the request
    #[error("authorization token missing")]
    Missing,

    /// Token text could not be parsed
    #[error("malformed authorization token: {0}")]
    Malformed(String),

    /// Signature does not cover this action and payload
    #[error("authorization token does not match action or payload")]
    Mismatch,

    /// Validity window has passed
    #[error("authorization token expired")]
    Expired,

    /// Token was already used once
    #[error("authorization token already consumed")]
    Replayed,

    /// Consumed-token ledger or signing key could not be accessed
    #[error("authorization storage error: {0}")]
    Store(#[from] StoreError),
}

impl AuthError {
    /// Everything except storage trouble is a caller-side failure
    #[inline]
    #[must_use]
    pub fn is_authorization_failure(&self) -> bool {
        !matches!(self, Self::Store(_))
    }
}
