//! Single-use action authorization
//!
//! Every state-changing request must carry a token issued for exactly that
//! action and payload. Tokens are ed25519-signed over
//! `(action, sha256(payload joined by ","), token id, issued_at, expires_at)`
//! and recorded in a consumed-token ledger on first use.
//!
//! Runtime checks performed, in order:
//! - Token present and well formed
//! - Signature covers this action and payload digest
//! - Token not expired
//! - Token not already consumed

use crate::error::AuthError;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use parking_lot::Mutex;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tshoot_store::{KeyValueStore, StoreError};
use uuid::Uuid;

/// Store key holding consumed token ids and their expiry
pub const CONSUMED_KEY: &str = "health-check-consumed-authorizations";

/// Store key holding the hex-encoded signing key seed
pub const SIGNING_KEY_KEY: &str = "health-check-authorization-key";

const PAYLOAD_DELIMITER: &str = ",";

/// Digest binding a token to its payload
#[must_use]
pub fn payload_digest<S: AsRef<str>>(payload: &[S]) -> [u8; 32] {
    let joined = payload
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(PAYLOAD_DELIMITER);
    Sha256::digest(joined.as_bytes()).into()
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// A signed, expiring, single-use authorization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationToken {
    /// Unique id, recorded in the ledger when consumed
    pub token_id: Uuid,
    /// Unix timestamp when token was issued
    pub issued_at: u64,
    /// Unix timestamp after which the token is refused
    pub expires_at: u64,
    /// Signature over action, payload digest, id and validity window
    pub signature: Signature,
}

impl AuthorizationToken {
    fn sign(
        signing_key: &SigningKey,
        action: &str,
        digest: &[u8; 32],
        issued_at: u64,
        expires_at: u64,
    ) -> Self {
        let token_id = Uuid::new_v4();
        let message = token_message(action, digest, token_id, issued_at, expires_at);
        Self {
            token_id,
            issued_at,
            expires_at,
            signature: signing_key.sign(&message),
        }
    }

    /// Whether the signature covers `action` and `digest`
    #[must_use]
    pub fn verify(&self, verifying_key: &VerifyingKey, action: &str, digest: &[u8; 32]) -> bool {
        let message = token_message(action, digest, self.token_id, self.issued_at, self.expires_at);
        verifying_key.verify(&message, &self.signature).is_ok()
    }

    /// Check expiry against `now`
    #[inline]
    #[must_use]
    pub fn is_expired_at(&self, now: u64) -> bool {
        now > self.expires_at
    }

    /// URL-safe text form: `id.issued.expires.signature`
    #[must_use]
    pub fn encode(&self) -> String {
        format!(
            "{}.{}.{}.{}",
            self.token_id.simple(),
            self.issued_at,
            self.expires_at,
            hex::encode(self.signature.to_bytes())
        )
    }

    /// Parse the text form produced by [`encode`](Self::encode)
    pub fn decode(text: &str) -> Result<Self, AuthError> {
        let malformed = |what: &str| AuthError::Malformed(what.to_string());

        let mut parts = text.split('.');
        let (Some(id), Some(issued), Some(expires), Some(sig), None) = (
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
        ) else {
            return Err(malformed("expected four dot-separated fields"));
        };

        let token_id = Uuid::parse_str(id).map_err(|_| malformed("token id"))?;
        let issued_at = issued.parse().map_err(|_| malformed("issue time"))?;
        let expires_at = expires.parse().map_err(|_| malformed("expiry time"))?;
        let sig_bytes = hex::decode(sig).map_err(|_| malformed("signature encoding"))?;
        let signature = Signature::from_slice(&sig_bytes).map_err(|_| malformed("signature length"))?;

        Ok(Self {
            token_id,
            issued_at,
            expires_at,
            signature,
        })
    }
}

impl fmt::Display for AuthorizationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

fn token_message(
    action: &str,
    digest: &[u8; 32],
    token_id: Uuid,
    issued_at: u64,
    expires_at: u64,
) -> Vec<u8> {
    let mut msg = Vec::with_capacity(action.len() + 1 + 32 + 16 + 8 + 8);
    msg.extend_from_slice(action.as_bytes());
    msg.push(0);
    msg.extend_from_slice(digest);
    msg.extend_from_slice(token_id.as_bytes());
    msg.extend_from_slice(&issued_at.to_le_bytes());
    msg.extend_from_slice(&expires_at.to_le_bytes());
    msg
}

/// Load the persisted signing key, generating and persisting one if absent
pub fn load_or_create_signing_key(kv: &dyn KeyValueStore) -> Result<SigningKey, AuthError> {
    if let Some(value) = kv.get(SIGNING_KEY_KEY)? {
        let invalid = |reason: &str| StoreError::InvalidValue {
            key: SIGNING_KEY_KEY.to_string(),
            reason: reason.to_string(),
        };
        let text = value.as_str().ok_or_else(|| invalid("expected a hex string"))?;
        let bytes = hex::decode(text).map_err(|_| invalid("not hex"))?;
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|_| invalid("expected 32 bytes"))?;
        return Ok(SigningKey::from_bytes(&seed));
    }

    let mut csprng = OsRng;
    let signing_key = SigningKey::generate(&mut csprng);
    kv.set(
        SIGNING_KEY_KEY,
        serde_json::Value::String(hex::encode(signing_key.to_bytes())),
    )?;
    tracing::info!("generated new authorization signing key");
    Ok(signing_key)
}

/// Issues and verifies action tokens
#[derive(Debug)]
pub struct ActionAuthorizer {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
    ttl_secs: u64,
    kv: Arc<dyn KeyValueStore>,
    ledger_lock: Mutex<()>,
}

impl ActionAuthorizer {
    /// Create an authorizer whose tokens live for `ttl`
    #[must_use]
    pub fn new(signing_key: SigningKey, ttl: Duration, kv: Arc<dyn KeyValueStore>) -> Self {
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
            ttl_secs: ttl.as_secs(),
            kv,
            ledger_lock: Mutex::new(()),
        }
    }

    /// Token validity window
    #[inline]
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// Issue a token for `action` over `payload`
    #[must_use]
    pub fn issue<S: AsRef<str>>(&self, action: &str, payload: &[S]) -> AuthorizationToken {
        self.issue_at(action, payload, now_secs())
    }

    /// Issue with an explicit clock
    #[must_use]
    pub fn issue_at<S: AsRef<str>>(
        &self,
        action: &str,
        payload: &[S],
        now: u64,
    ) -> AuthorizationToken {
        let digest = payload_digest(payload);
        AuthorizationToken::sign(
            &self.signing_key,
            action,
            &digest,
            now,
            now.saturating_add(self.ttl_secs),
        )
    }

    /// Verify and consume; `true` at most once per token
    #[must_use]
    pub fn verify<S: AsRef<str>>(&self, action: &str, payload: &[S], supplied: Option<&str>) -> bool {
        match self.check(action, payload, supplied) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(action, error = %e, "action authorization refused");
                false
            }
        }
    }

    /// Like [`verify`](Self::verify), reporting the reason for refusal
    pub fn check<S: AsRef<str>>(
        &self,
        action: &str,
        payload: &[S],
        supplied: Option<&str>,
    ) -> Result<(), AuthError> {
        self.check_at(action, payload, supplied, now_secs())
    }

    /// Check with an explicit clock
    pub fn check_at<S: AsRef<str>>(
        &self,
        action: &str,
        payload: &[S],
        supplied: Option<&str>,
        now: u64,
    ) -> Result<(), AuthError> {
        let text = supplied
            .filter(|text| !text.is_empty())
            .ok_or(AuthError::Missing)?;
        let token = AuthorizationToken::decode(text)?;

        let digest = payload_digest(payload);
        if !token.verify(&self.verifying_key, action, &digest) {
            return Err(AuthError::Mismatch);
        }

        if token.is_expired_at(now) {
            return Err(AuthError::Expired);
        }

        self.consume(&token, now)
    }

    fn consume(&self, token: &AuthorizationToken, now: u64) -> Result<(), AuthError> {
        let _guard = self.ledger_lock.lock();

        let mut ledger: BTreeMap<String, u64> = match self.kv.get(CONSUMED_KEY)? {
            Some(value) => serde_json::from_value(value).map_err(StoreError::from)?,
            None => BTreeMap::new(),
        };
        ledger.retain(|_, expires_at| *expires_at >= now);

        let id = token.token_id.simple().to_string();
        if ledger.contains_key(&id) {
            return Err(AuthError::Replayed);
        }
        ledger.insert(id, token.expires_at);

        self.kv
            .set(CONSUMED_KEY, serde_json::to_value(&ledger).map_err(StoreError::from)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tshoot_store::MemoryStore;

    fn authorizer() -> (Arc<MemoryStore>, ActionAuthorizer) {
        let kv = Arc::new(MemoryStore::new());
        let mut csprng = OsRng;
        let signing_key = SigningKey::generate(&mut csprng);
        let authorizer = ActionAuthorizer::new(signing_key, Duration::from_secs(1800), kv.clone());
        (kv, authorizer)
    }

    #[test]
    fn test_valid_token_passes_once() {
        let (_, auth) = authorizer();
        let token = auth.issue("enable-extension", &["akismet"]).encode();

        assert!(auth.verify("enable-extension", &["akismet"], Some(&token)));
        assert!(matches!(
            auth.check("enable-extension", &["akismet"], Some(&token)),
            Err(AuthError::Replayed)
        ));
    }

    #[test]
    fn test_payload_tampering_fails() {
        let (_, auth) = authorizer();
        let token = auth.issue("enable-extension", &["akismet"]).encode();

        assert!(matches!(
            auth.check("enable-extension", &["hello-dolly"], Some(&token)),
            Err(AuthError::Mismatch)
        ));
        // The refused attempt did not consume the token
        assert!(auth.verify("enable-extension", &["akismet"], Some(&token)));
    }

    #[test]
    fn test_wrong_action_fails() {
        let (_, auth) = authorizer();
        let token = auth.issue("enable-extension", &["akismet"]).encode();

        assert!(matches!(
            auth.check("disable-extension", &["akismet"], Some(&token)),
            Err(AuthError::Mismatch)
        ));
    }

    #[test]
    fn test_expired_token_fails() {
        let (_, auth) = authorizer();
        let token = auth.issue_at("dismiss-notices", &[] as &[&str], 1_000).encode();

        assert!(auth
            .check_at("dismiss-notices", &[] as &[&str], Some(&token), 1_000 + 1800)
            .is_ok());

        let second = auth.issue_at("dismiss-notices", &[] as &[&str], 1_000).encode();
        assert!(matches!(
            auth.check_at("dismiss-notices", &[] as &[&str], Some(&second), 1_000 + 1801),
            Err(AuthError::Expired)
        ));
    }

    #[test]
    fn test_missing_and_malformed() {
        let (_, auth) = authorizer();

        assert!(matches!(
            auth.check("disable-troubleshooting", &[] as &[&str], None),
            Err(AuthError::Missing)
        ));
        assert!(matches!(
            auth.check("disable-troubleshooting", &[] as &[&str], Some("")),
            Err(AuthError::Missing)
        ));
        assert!(matches!(
            auth.check("disable-troubleshooting", &[] as &[&str], Some("abc.def")),
            Err(AuthError::Malformed(_))
        ));
    }

    #[test]
    fn test_fresh_tokens_are_distinct() {
        let (_, auth) = authorizer();
        let a = auth.issue("change-active-theme", &["twentytwenty"]);
        let b = auth.issue("change-active-theme", &["twentytwenty"]);

        assert_ne!(a.token_id, b.token_id);
        assert!(auth.verify("change-active-theme", &["twentytwenty"], Some(&a.encode())));
        assert!(auth.verify("change-active-theme", &["twentytwenty"], Some(&b.encode())));
    }

    #[test]
    fn test_foreign_key_rejected() {
        let (_, auth) = authorizer();
        let (_, other) = authorizer();
        let token = other.issue("dismiss-notices", &[] as &[&str]).encode();

        assert!(!auth.verify("dismiss-notices", &[] as &[&str], Some(&token)));
    }

    #[test]
    fn test_encode_decode() {
        let (_, auth) = authorizer();
        let token = auth.issue("enable-extension", &["a"]);

        assert_eq!(AuthorizationToken::decode(&token.encode()).unwrap(), token);
    }

    #[test]
    fn test_ledger_prunes_expired_entries() {
        let (kv, auth) = authorizer();
        let old = auth.issue_at("x", &["1"], 100).encode();
        assert!(auth.check_at("x", &["1"], Some(&old), 100).is_ok());

        let fresh = auth.issue_at("x", &["1"], 10_000).encode();
        assert!(auth.check_at("x", &["1"], Some(&fresh), 10_000).is_ok());

        let ledger: BTreeMap<String, u64> =
            serde_json::from_value(kv.get(CONSUMED_KEY).unwrap().unwrap()).unwrap();
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_signing_key_persisted() {
        let kv = MemoryStore::new();
        let first = load_or_create_signing_key(&kv).unwrap();
        let second = load_or_create_signing_key(&kv).unwrap();

        assert_eq!(first.to_bytes(), second.to_bytes());
    }

    #[test]
    fn test_digest_depends_on_order_and_delimiter() {
        assert_ne!(payload_digest(&["a", "b"]), payload_digest(&["b", "a"]));
        assert_eq!(payload_digest(&["a,b"]), payload_digest(&["a", "b"]));
        assert_eq!(payload_digest(&[] as &[&str]), payload_digest(&[""]));
    }
}
