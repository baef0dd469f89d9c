//! Wiring of store, authorizer, registries and probe

use crate::config::EngineConfig;
use crate::context::RequestContext;
use crate::error::EngineError;
use crate::filters::{ExtensionViewFilter, ThemeViewFilter};
use crate::lifecycle::SessionLifecycle;
use crate::policy::{restricted_capabilities, Capability};
use crate::probe::HealthProbe;
use crate::registry::{ExtensionRegistry, ThemeRegistry};
use crate::request::Request;
use crate::router::{RequestRouter, RouteOutcome};
use crate::transaction::TransactionGuard;
use ed25519_dalek::SigningKey;
use std::sync::Arc;
use std::time::Duration;
use tshoot_auth::{load_or_create_signing_key, ActionAuthorizer};
use tshoot_store::{KeyValueStore, OverrideStore};

/// Troubleshooting session engine
///
/// Owns every collaborator explicitly; nothing is read from globals.
pub struct Engine {
    config: EngineConfig,
    store: OverrideStore,
    authorizer: ActionAuthorizer,
    extensions: Arc<dyn ExtensionRegistry>,
    themes: Arc<dyn ThemeRegistry>,
    theme_filter: ThemeViewFilter,
    probe: Arc<dyn HealthProbe>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Build an engine over `kv`
    ///
    /// Uses the configured signing seed, or the one persisted in `kv`
    /// (generated on first use).
    pub fn new(
        config: EngineConfig,
        kv: Arc<dyn KeyValueStore>,
        extensions: Arc<dyn ExtensionRegistry>,
        themes: Arc<dyn ThemeRegistry>,
        probe: Arc<dyn HealthProbe>,
    ) -> Result<Self, EngineError> {
        config.validate()?;

        let signing_key = match config.signing_seed()? {
            Some(seed) => SigningKey::from_bytes(&seed),
            None => load_or_create_signing_key(kv.as_ref())?,
        };
        let authorizer = ActionAuthorizer::new(
            signing_key,
            Duration::from_secs(config.authorization_ttl_secs),
            kv.clone(),
        );
        let theme_filter = ThemeViewFilter::new(
            themes.clone(),
            config.default_themes.clone(),
            config.latest_classic_default_theme.clone(),
        );

        Ok(Self {
            store: OverrideStore::new(kv),
            config,
            authorizer,
            extensions,
            themes,
            theme_filter,
            probe,
        })
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Session state
    #[inline]
    #[must_use]
    pub fn store(&self) -> &OverrideStore {
        &self.store
    }

    /// Action token issuer
    #[inline]
    #[must_use]
    pub fn authorizer(&self) -> &ActionAuthorizer {
        &self.authorizer
    }

    /// Installed extensions
    #[inline]
    #[must_use]
    pub fn extension_registry(&self) -> &dyn ExtensionRegistry {
        self.extensions.as_ref()
    }

    /// Installed themes
    #[inline]
    #[must_use]
    pub fn theme_registry(&self) -> &dyn ThemeRegistry {
        self.themes.as_ref()
    }

    /// Health probe
    #[inline]
    #[must_use]
    pub fn probe(&self) -> &dyn HealthProbe {
        self.probe.as_ref()
    }

    /// Read the session state for `request`
    #[must_use]
    pub fn context(&self, request: Request) -> RequestContext {
        RequestContext::load(request, &self.store, &self.config)
    }

    /// Request dispatcher
    #[must_use]
    pub fn router(&self) -> RequestRouter<'_> {
        RequestRouter::new(self)
    }

    /// Load the context for `request` and dispatch it
    pub fn route(&self, request: Request) -> Result<RouteOutcome, EngineError> {
        let ctx = self.context(request);
        self.router().route(&ctx)
    }

    /// Theme view filter
    #[inline]
    #[must_use]
    pub fn theme_filter(&self) -> &ThemeViewFilter {
        &self.theme_filter
    }

    /// Extensions this request loads
    #[must_use]
    pub fn effective_extensions(&self, ctx: &RequestContext) -> Vec<String> {
        let full = ctx.unfiltered(|| self.extensions.active_extensions());
        ExtensionViewFilter.effective_list(&full, ctx)
    }

    /// Stylesheet this request renders with
    #[must_use]
    pub fn effective_theme(&self, ctx: &RequestContext) -> String {
        self.theme_filter.effective_theme(ctx)
    }

    /// Template this request renders with
    #[must_use]
    pub fn effective_parent_theme(&self, ctx: &RequestContext) -> String {
        self.theme_filter.effective_parent_theme(ctx)
    }

    /// Capabilities the host must deny for this request
    #[must_use]
    pub fn restricted_capabilities(&self, ctx: &RequestContext) -> Vec<Capability> {
        restricted_capabilities(ctx)
    }

    /// Guard for one override mutation
    #[must_use]
    pub fn transaction_guard(&self) -> TransactionGuard<'_> {
        TransactionGuard::new(&self.store, self.probe.as_ref(), &self.authorizer)
    }

    /// Session begin/end
    #[must_use]
    pub fn lifecycle(&self) -> SessionLifecycle<'_> {
        SessionLifecycle::new(&self.store, self.extensions.as_ref(), &self.config.cookie_name)
    }
}
