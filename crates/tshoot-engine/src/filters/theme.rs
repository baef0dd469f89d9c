//! Theme view filter
//!
//! While troubleshooting, the session renders with its theme override, or
//! else the newest installed bundled default. Looking up the override's
//! metadata may ask which theme is active; that nested query sees the real
//! theme through the context's re-entrancy flag.

use crate::context::RequestContext;
use crate::registry::{ActiveThemeQuery, ThemeInfo, ThemeRegistry};
use serde::Serialize;
use std::sync::Arc;

/// Computes the stylesheet and template a request actually renders with
#[derive(Clone)]
pub struct ThemeViewFilter {
    registry: Arc<dyn ThemeRegistry>,
    default_themes: Vec<String>,
    latest_classic_default_theme: String,
}

impl std::fmt::Debug for ThemeViewFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThemeViewFilter")
            .field("default_themes", &self.default_themes)
            .finish_non_exhaustive()
    }
}

/// Suggested installs when no bundled default theme is present
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DefaultThemePrompt {
    /// Newest bundled default
    pub latest_default: String,
    /// Newest bundled classic (non-block) default
    pub latest_classic_default: String,
}

/// Effective theme as seen from inside a registry lookup
struct BoundThemeView<'a> {
    filter: &'a ThemeViewFilter,
    ctx: &'a RequestContext,
}

impl ActiveThemeQuery for BoundThemeView<'_> {
    fn stylesheet(&self) -> String {
        self.filter.effective_theme(self.ctx)
    }

    fn template(&self) -> String {
        self.filter.effective_parent_theme(self.ctx)
    }
}

impl ThemeViewFilter {
    /// Filter over `registry`, preferring `default_themes` in order
    #[must_use]
    pub fn new(
        registry: Arc<dyn ThemeRegistry>,
        default_themes: Vec<String>,
        latest_classic_default_theme: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            default_themes,
            latest_classic_default_theme: latest_classic_default_theme.into(),
        }
    }

    /// Most recent installed bundled default theme
    #[must_use]
    pub fn default_theme(&self) -> Option<String> {
        self.default_themes
            .iter()
            .find(|slug| self.registry.exists(slug))
            .cloned()
    }

    /// Install suggestion, only when no bundled default is installed
    #[must_use]
    pub fn default_theme_prompt(&self) -> Option<DefaultThemePrompt> {
        if self.default_theme().is_some() {
            return None;
        }
        Some(DefaultThemePrompt {
            latest_default: self.default_themes.first().cloned().unwrap_or_default(),
            latest_classic_default: self.latest_classic_default_theme.clone(),
        })
    }

    /// Metadata of the overriding theme, resolved once per request
    fn override_details<'a>(&self, ctx: &'a RequestContext, slug: &str) -> Option<&'a ThemeInfo> {
        ctx.theme_details
            .get_or_init(|| {
                let _guard = ctx.theme_guard.enter();
                let view = BoundThemeView { filter: self, ctx };
                self.registry.resolve(slug, &view)
            })
            .as_ref()
    }

    fn passthrough(ctx: &RequestContext) -> bool {
        ctx.theme_guard.is_set() || !ctx.is_troubleshooting()
    }

    /// Stylesheet-level theme for this request
    #[must_use]
    pub fn effective_theme(&self, ctx: &RequestContext) -> String {
        if Self::passthrough(ctx) {
            return self.registry.stylesheet();
        }

        match ctx.overrides().theme.as_deref() {
            Some(slug) => slug.to_string(),
            None => self
                .default_theme()
                .unwrap_or_else(|| self.registry.stylesheet()),
        }
    }

    /// Template-level theme for this request
    ///
    /// A child theme override keeps the child as stylesheet and resolves
    /// templates from its parent.
    #[must_use]
    pub fn effective_parent_theme(&self, ctx: &RequestContext) -> String {
        if Self::passthrough(ctx) {
            return self.registry.template();
        }

        match ctx.overrides().theme.as_deref() {
            Some(slug) => self
                .override_details(ctx, slug)
                .and_then(|theme| theme.parent.clone())
                .unwrap_or_else(|| slug.to_string()),
            None => self
                .default_theme()
                .unwrap_or_else(|| self.registry.template()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::registry::SiteManifest;
    use crate::request::Request;
    use tshoot_auth::SessionToken;
    use tshoot_store::{MemoryStore, OverrideStore, Overrides};

    fn manifest(themes: &[(&str, Option<&str>)], stylesheet: &str) -> Arc<SiteManifest> {
        Arc::new(SiteManifest {
            themes: themes
                .iter()
                .map(|(id, parent)| ThemeInfo {
                    id: (*id).to_string(),
                    name: (*id).to_string(),
                    parent: parent.map(str::to_string),
                })
                .collect(),
            stylesheet: stylesheet.to_string(),
            ..SiteManifest::default()
        })
    }

    fn ctx(theme: Option<&str>, active: bool) -> RequestContext {
        let store = OverrideStore::new(Arc::new(MemoryStore::new()));
        store
            .set_disable_hash(&SessionToken::derive_from_cookie("secret", None))
            .unwrap();
        let overrides = match theme {
            Some(theme) => Overrides::default().with_theme(theme),
            None => Overrides::default(),
        };
        store.write_overrides(&overrides).unwrap();

        let config = EngineConfig::default();
        let mut request = Request::new("http://example.test/").unwrap();
        if active {
            request = request.with_cookie(config.cookie_name.clone(), "secret");
        }
        RequestContext::load(request, &store, &config)
    }

    fn filter(registry: Arc<SiteManifest>) -> ThemeViewFilter {
        let config = EngineConfig::default();
        ThemeViewFilter::new(
            registry,
            config.default_themes,
            config.latest_classic_default_theme,
        )
    }

    #[test]
    fn test_inactive_session_passes_through() {
        let filter = filter(manifest(&[("custom", None), ("twentytwenty", None)], "custom"));
        let ctx = ctx(Some("twentytwenty"), false);

        assert_eq!(filter.effective_theme(&ctx), "custom");
        assert_eq!(filter.effective_parent_theme(&ctx), "custom");
    }

    #[test]
    fn test_newest_installed_default_wins() {
        let filter = filter(manifest(
            &[("custom", None), ("twentynineteen", None), ("twentytwentyone", None)],
            "custom",
        ));
        let ctx = ctx(None, true);

        assert_eq!(filter.effective_theme(&ctx), "twentytwentyone");
        assert_eq!(filter.effective_parent_theme(&ctx), "twentytwentyone");
        assert_eq!(filter.default_theme_prompt(), None);
    }

    #[test]
    fn test_no_default_installed_falls_back_to_real() {
        let filter = filter(manifest(&[("custom", None)], "custom"));
        let ctx = ctx(None, true);

        assert_eq!(filter.effective_theme(&ctx), "custom");
        assert_eq!(
            filter.default_theme_prompt(),
            Some(DefaultThemePrompt {
                latest_default: "twentytwentyfour".into(),
                latest_classic_default: "twentytwentyone".into(),
            })
        );
    }

    #[test]
    fn test_child_override_uses_parent_template() {
        let filter = filter(manifest(
            &[("custom", None), ("kid", Some("twentytwenty")), ("twentytwenty", None)],
            "custom",
        ));
        let ctx = ctx(Some("kid"), true);

        assert_eq!(filter.effective_theme(&ctx), "kid");
        assert_eq!(filter.effective_parent_theme(&ctx), "twentytwenty");
    }

    #[test]
    fn test_unknown_override_is_its_own_template() {
        let filter = filter(manifest(&[("custom", None)], "custom"));
        let ctx = ctx(Some("gone"), true);

        assert_eq!(filter.effective_theme(&ctx), "gone");
        assert_eq!(filter.effective_parent_theme(&ctx), "gone");
    }
}
