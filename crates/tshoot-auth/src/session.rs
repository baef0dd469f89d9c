//! Session binding
//!
//! A browser proves it belongs to the troubleshooting session by presenting
//! a secret cookie. The server never stores the secret itself; it stores
//! `secret + sha256(client origin)`, so a cookie replayed from a different
//! network origin derives a different value and is ignored.

use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::net::IpAddr;
use subtle::ConstantTimeEq;

/// Credentials a request may carry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionCredentials {
    /// Raw session cookie value
    pub cookie: Option<String>,
    /// Pre-derived token passed as a query parameter
    pub query_token: Option<String>,
    /// Network origin of the caller
    pub client_origin: Option<IpAddr>,
}

impl SessionCredentials {
    /// Token the request presents, if any
    ///
    /// A cookie wins over the query parameter; it is converted by appending
    /// the hash of the caller's origin.
    #[must_use]
    pub fn supplied_token(&self) -> Option<String> {
        match &self.cookie {
            Some(cookie) => Some(SessionToken::derive_from_cookie(cookie, self.client_origin)),
            None => self.query_token.clone(),
        }
    }
}

/// Derives and validates the troubleshooting session token
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionToken;

impl SessionToken {
    /// Bind a cookie value to the caller's origin
    #[must_use]
    pub fn derive_from_cookie(cookie_value: &str, client_origin: Option<IpAddr>) -> String {
        let origin = client_origin.map(|ip| ip.to_string()).unwrap_or_default();
        let digest = Sha256::digest(origin.as_bytes());
        format!("{cookie_value}{}", hex::encode(digest))
    }

    /// Whether the credentials match the persisted session hash
    ///
    /// Read-only and infallible: any missing piece yields `false`.
    #[must_use]
    pub fn is_active(credentials: &SessionCredentials, disable_hash: Option<&str>) -> bool {
        let Some(expected) = disable_hash.filter(|hash| !hash.is_empty()) else {
            return false;
        };
        let Some(supplied) = credentials.supplied_token() else {
            return false;
        };

        // ct_eq on slices of different lengths is false
        bool::from(supplied.as_bytes().ct_eq(expected.as_bytes()))
    }

    /// Fresh random cookie secret (32 hex chars)
    #[must_use]
    pub fn generate_secret() -> String {
        let mut bytes = [0u8; 16];
        OsRng.fill_bytes(&mut bytes);
        hex::encode(bytes)
    }
}
