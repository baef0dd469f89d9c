//! Troubleshooting session engine
//!
//! Scopes extension and theme overrides to one browser session without
//! touching what any other visitor sees:
//! - [`ExtensionViewFilter`] and [`ThemeViewFilter`] shape what a
//!   troubleshooting request loads
//! - [`TransactionGuard`] applies each override change under a live health
//!   probe and rolls it back when the site breaks
//! - [`RequestRouter`] gates every change behind a single-use
//!   authorization token and answers with a [`RouteOutcome`]
//!
//! # Example
//!
//! ```rust,ignore
//! use tshoot_engine::{Engine, EngineConfig, Request, RouteOutcome, SiteManifest, StaticProbe};
//!
//! let site = Arc::new(SiteManifest::from_json(&manifest_json)?);
//! let engine = Engine::new(
//!     EngineConfig::default(),
//!     Arc::new(MemoryStore::new()),
//!     site.clone(),
//!     site,
//!     Arc::new(StaticProbe(true)),
//! )?;
//!
//! match engine.route(Request::new(url)?.with_cookie(cookie_name, secret))? {
//!     RouteOutcome::Redirect { location, .. } => redirect_to(location),
//!     RouteOutcome::Confirm(prompt) => render_prompt(prompt),
//!     RouteOutcome::Continue => render_page(),
//! }
//! ```

pub mod action;
pub mod config;
pub mod context;
pub mod dashboard;
pub mod engine;
pub mod error;
pub mod filters;
pub mod lifecycle;
pub mod policy;
pub mod probe;
pub mod registry;
pub mod request;
pub mod router;
pub mod transaction;

pub use action::Action;
pub use config::EngineConfig;
pub use context::RequestContext;
pub use dashboard::{DashboardModel, ExtensionEntry, ThemeEntry};
pub use engine::Engine;
pub use error::{ConfigError, EngineError};
pub use filters::{DefaultThemePrompt, ExtensionViewFilter, ThemeViewFilter};
pub use lifecycle::{CookieDirective, SessionLifecycle, SessionStart};
pub use policy::Capability;
pub use probe::{HealthProbe, HttpProbe, ProbeError, ProbeReport, StaticProbe};
pub use registry::{
    extension_slug, ActiveThemeQuery, ExtensionInfo, ExtensionRegistry, SiteManifest, ThemeInfo,
    ThemeRegistry,
};
pub use request::{params, Request};
pub use router::{ConfirmationPrompt, PromptField, RequestRouter, RouteOutcome};
pub use transaction::{TransactionGuard, TransactionOutcome, TransactionState};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
