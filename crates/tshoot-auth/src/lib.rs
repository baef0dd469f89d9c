//! Troubleshooting Mode authentication
//!
//! Two independent gates:
//! 1. [`SessionToken`] decides whether a request belongs to the active
//!    troubleshooting session at all. It never fails; a mismatch simply
//!    means "not troubleshooting".
//! 2. [`ActionAuthorizer`] issues and verifies single-use tokens bound to
//!    an action name and a digest of its payload, so forged, stale, replayed
//!    or tampered links never mutate state.

pub mod authorizer;
pub mod error;
pub mod session;

pub use authorizer::{
    load_or_create_signing_key, payload_digest, ActionAuthorizer, AuthorizationToken,
    CONSUMED_KEY, SIGNING_KEY_KEY,
};
pub use error::AuthError;
pub use session::{SessionCredentials, SessionToken};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
