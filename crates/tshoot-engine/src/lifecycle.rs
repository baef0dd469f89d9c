//! Starting and ending a troubleshooting session

use crate::context::RequestContext;
use crate::error::EngineError;
use crate::registry::ExtensionRegistry;
use crate::request::Request;
use serde::Serialize;
use std::collections::BTreeSet;
use std::net::IpAddr;
use tshoot_auth::SessionToken;
use tshoot_store::OverrideStore;

/// Instruction for the HTTP layer about the session cookie
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum CookieDirective {
    /// Set the cookie
    Set {
        /// Cookie name
        name: String,
        /// Secret value
        value: String,
    },
    /// Expire the cookie
    Clear {
        /// Cookie name
        name: String,
    },
}

/// A freshly started session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStart {
    /// Cookie secret the browser must keep
    pub secret: String,
    /// Cookie to send back
    pub cookie: CookieDirective,
}

/// Session begin/end and the host hooks tied to them
#[derive(Clone, Copy)]
pub struct SessionLifecycle<'a> {
    store: &'a OverrideStore,
    extensions: &'a dyn ExtensionRegistry,
    cookie_name: &'a str,
}

impl std::fmt::Debug for SessionLifecycle<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionLifecycle")
            .field("cookie_name", &self.cookie_name)
            .finish_non_exhaustive()
    }
}

impl<'a> SessionLifecycle<'a> {
    /// Lifecycle over `store`
    #[must_use]
    pub fn new(
        store: &'a OverrideStore,
        extensions: &'a dyn ExtensionRegistry,
        cookie_name: &'a str,
    ) -> Self {
        Self {
            store,
            extensions,
            cookie_name,
        }
    }

    /// Open a session bound to `client_origin` with `allowed` slugs loading
    ///
    /// Replaces any previous session, dropping its theme override and
    /// notices. The real active extension list is
    /// recorded so it can be restored if something activates extensions
    /// mid-session.
    pub fn begin_session(
        &self,
        client_origin: Option<IpAddr>,
        allowed: &BTreeSet<String>,
    ) -> Result<SessionStart, EngineError> {
        let secret = SessionToken::generate_secret();
        let hash = SessionToken::derive_from_cookie(&secret, client_origin);

        self.store.clear_session()?;
        self.store.set_disable_hash(&hash)?;
        self.store.set_allowed_extensions(allowed)?;
        self.store
            .set_backup_extension_list(&self.extensions.active_extensions())?;

        tracing::info!(allowed = allowed.len(), "troubleshooting session started");
        Ok(SessionStart {
            cookie: CookieDirective::Set {
                name: self.cookie_name.to_string(),
                value: secret.clone(),
            },
            secret,
        })
    }

    /// Close the session and forget every override
    pub fn end_session(&self) -> Result<CookieDirective, EngineError> {
        self.store.clear_session()?;
        tracing::info!("troubleshooting session ended");
        Ok(CookieDirective::Clear {
            name: self.cookie_name.to_string(),
        })
    }

    /// Logout hook: end the session if this browser holds the cookie
    pub fn on_logout(&self, request: &Request) -> Result<Option<CookieDirective>, EngineError> {
        if request.cookie(self.cookie_name).is_none() {
            return Ok(None);
        }
        self.end_session().map(Some)
    }

    /// Activation hook: the list the host must restore as its real active
    /// extensions, when a troubleshooting request changed them
    pub fn on_extension_activated(
        &self,
        ctx: &RequestContext,
    ) -> Result<Option<Vec<String>>, EngineError> {
        if !ctx.is_troubleshooting() {
            return Ok(None);
        }
        let backup = self.store.backup_extension_list()?;
        if backup.is_some() {
            tracing::warn!("extension activated during troubleshooting; restoring recorded list");
        }
        Ok(backup)
    }
}
