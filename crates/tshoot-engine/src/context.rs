//! Per-request context
//!
//! Everything a filter needs is read once at the start of a request and
//! carried here explicitly, together with the re-entrancy flags that stop
//! a filter from filtering its own inputs.

use crate::config::EngineConfig;
use crate::registry::ThemeInfo;
use crate::request::{params, Request};
use std::cell::{Cell, OnceCell};
use std::collections::BTreeSet;
use tshoot_auth::SessionToken;
use tshoot_store::{OverrideStore, Overrides};

/// "Resolution in progress" marker
#[derive(Debug, Default)]
pub struct ReentrancyFlag(Cell<bool>);

impl ReentrancyFlag {
    /// Whether a resolution is running
    #[inline]
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.0.get()
    }

    /// Set the flag until the returned guard drops
    #[must_use]
    pub fn enter(&self) -> ReentrancyGuard<'_> {
        let previous = self.0.replace(true);
        ReentrancyGuard {
            flag: self,
            previous,
        }
    }
}

/// Restores a [`ReentrancyFlag`] on drop
#[derive(Debug)]
pub struct ReentrancyGuard<'a> {
    flag: &'a ReentrancyFlag,
    previous: bool,
}

impl Drop for ReentrancyGuard<'_> {
    fn drop(&mut self) {
        self.flag.0.set(self.previous);
    }
}

/// Session state as seen by one request
#[derive(Debug)]
pub struct RequestContext {
    request: Request,
    session_active: bool,
    overrides: Overrides,
    request_allow: BTreeSet<String>,
    pub(crate) extension_guard: ReentrancyFlag,
    pub(crate) theme_guard: ReentrancyFlag,
    pub(crate) theme_details: OnceCell<Option<ThemeInfo>>,
}

impl RequestContext {
    /// Read the session for `request`
    ///
    /// Never fails: storage trouble is logged and the request is treated as
    /// not troubleshooting, so visitors always see the real site.
    pub fn load(request: Request, store: &OverrideStore, config: &EngineConfig) -> Self {
        let (session_active, overrides) = match Self::read_session(&request, store, config) {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(error = %e, "cannot read troubleshooting state; serving unfiltered");
                (false, Overrides::default())
            }
        };

        let request_allow = request
            .query(params::ALLOWED_EXTENSIONS)
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|slug| !slug.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            request,
            session_active,
            overrides,
            request_allow,
            extension_guard: ReentrancyFlag::default(),
            theme_guard: ReentrancyFlag::default(),
            theme_details: OnceCell::new(),
        }
    }

    fn read_session(
        request: &Request,
        store: &OverrideStore,
        config: &EngineConfig,
    ) -> Result<(bool, Overrides), tshoot_store::StoreError> {
        let hash = store.disable_hash()?;
        let credentials = request.credentials(&config.cookie_name);
        if !SessionToken::is_active(&credentials, hash.as_deref()) {
            return Ok((false, Overrides::default()));
        }
        Ok((true, store.overrides()?))
    }

    /// The request
    #[inline]
    #[must_use]
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Whether this request belongs to the troubleshooting session
    #[inline]
    #[must_use]
    pub fn is_troubleshooting(&self) -> bool {
        self.session_active
    }

    /// Persisted overrides; empty when not troubleshooting
    #[inline]
    #[must_use]
    pub fn overrides(&self) -> &Overrides {
        &self.overrides
    }

    /// Persisted allow-list plus any slugs passed for this request only
    #[must_use]
    pub fn allowed_extensions(&self) -> BTreeSet<String> {
        self.overrides
            .allowed_extensions
            .union(&self.request_allow)
            .cloned()
            .collect()
    }

    /// Run `f` with extension filtering suspended
    pub fn unfiltered<T>(&self, f: impl FnOnce() -> T) -> T {
        let _guard = self.extension_guard.enter();
        f()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tshoot_store::MemoryStore;

    #[test]
    fn test_flag_restores_previous_value() {
        let flag = ReentrancyFlag::default();
        {
            let _outer = flag.enter();
            {
                let _inner = flag.enter();
                assert!(flag.is_set());
            }
            assert!(flag.is_set());
        }
        assert!(!flag.is_set());
    }

    #[test]
    fn test_request_allow_list_only_applies_when_troubleshooting() {
        let store = OverrideStore::new(Arc::new(MemoryStore::new()));
        let request =
            Request::new("http://example.test/?health-check-allowed-plugins=a,%20b,,").unwrap();

        let ctx = RequestContext::load(request, &store, &EngineConfig::default());
        assert!(!ctx.is_troubleshooting());
        assert_eq!(
            ctx.allowed_extensions().into_iter().collect::<Vec<_>>(),
            vec!["a", "b"]
        );
    }

    #[test]
    fn test_overrides_hidden_without_session() {
        let store = OverrideStore::new(Arc::new(MemoryStore::new()));
        store.set_disable_hash("expected").unwrap();
        store
            .write_overrides(&Overrides::default().allowing("a"))
            .unwrap();

        let request = Request::new("http://example.test/")
            .unwrap()
            .with_cookie("wp-health-check-disable-plugins", "wrong");
        let ctx = RequestContext::load(request, &store, &EngineConfig::default());

        assert!(!ctx.is_troubleshooting());
        assert!(ctx.overrides().allowed_extensions.is_empty());
    }
}
