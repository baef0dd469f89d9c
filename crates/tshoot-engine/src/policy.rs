//! Capabilities withheld from the operator while troubleshooting

use crate::context::RequestContext;
use serde::Serialize;

/// Screen on which new extensions are installed
const EXTENSION_INSTALL_SCREEN: &str = "plugin-install.php";

/// Host capability the engine may deny
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Changing the real active theme
    SwitchThemes,
    /// Activating extensions
    ActivatePlugins,
}

/// Capabilities the host must deny for this request
///
/// Changing the real theme or extension set mid-session leads to confusing
/// results, so switching themes is always denied and activation is denied
/// on the install screen.
#[must_use]
pub fn restricted_capabilities(ctx: &RequestContext) -> Vec<Capability> {
    if !ctx.is_troubleshooting() {
        return Vec::new();
    }

    let mut denied = vec![Capability::SwitchThemes];
    if ctx.request().url().path().ends_with(EXTENSION_INSTALL_SCREEN) {
        denied.push(Capability::ActivatePlugins);
    }
    denied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::request::Request;
    use std::sync::Arc;
    use tshoot_auth::SessionToken;
    use tshoot_store::{MemoryStore, OverrideStore};

    fn ctx(url: &str, troubleshooting: bool) -> RequestContext {
        let store = OverrideStore::new(Arc::new(MemoryStore::new()));
        store
            .set_disable_hash(&SessionToken::derive_from_cookie("s", None))
            .unwrap();
        let config = EngineConfig::default();
        let mut request = Request::new(url).unwrap();
        if troubleshooting {
            request = request.with_cookie(config.cookie_name.clone(), "s");
        }
        RequestContext::load(request, &store, &config)
    }

    #[test]
    fn test_nothing_denied_outside_session() {
        assert!(restricted_capabilities(&ctx("http://x.test/wp-admin/plugin-install.php", false)).is_empty());
    }

    #[test]
    fn test_install_screen_denies_activation() {
        assert_eq!(
            restricted_capabilities(&ctx("http://x.test/wp-admin/plugin-install.php?tab=featured", true)),
            vec![Capability::SwitchThemes, Capability::ActivatePlugins]
        );
        assert_eq!(
            restricted_capabilities(&ctx("http://x.test/wp-admin/plugins.php", true)),
            vec![Capability::SwitchThemes]
        );
    }
}
