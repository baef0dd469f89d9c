//! Request dispatch
//!
//! Each request runs through four named stages with typed hand-offs:
//!
//! | Stage | In | Out |
//! |---|---|---|
//! | `capture` | [`RequestContext`] | action, force flag and token, or nothing to do |
//! | `authorize` | captured action | authorized action, or a confirmation prompt |
//! | `execute` | authorized action | redirect target and cookie change |
//! | `respond` | effect | [`RouteOutcome`] |
//!
//! The router never performs I/O on the response; the caller turns the
//! outcome into a redirect, a rendered prompt or a normal page.

use crate::action::Action;
use crate::context::RequestContext;
use crate::engine::Engine;
use crate::error::EngineError;
use crate::lifecycle::CookieDirective;
use crate::registry::extension_slug;
use crate::request::link_with;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::field;

/// What the HTTP layer should do with the request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RouteOutcome {
    /// Action done; redirect and stop
    Redirect {
        /// Target URL, troubleshooting arguments removed
        location: String,
        /// Session cookie change, if any
        #[serde(skip_serializing_if = "Option::is_none")]
        cookie: Option<CookieDirective>,
    },
    /// Authorization failed; ask the operator to confirm
    Confirm(ConfirmationPrompt),
    /// Nothing to do; render normally
    Continue,
}

/// One pre-filled form field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptField {
    /// Query argument name
    pub name: String,
    /// Value
    pub value: String,
}

/// Re-confirmation form echoing the refused action
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfirmationPrompt {
    /// Action name
    pub action: String,
    /// Action payload
    pub payload: Vec<String>,
    /// What the operator was attempting
    pub details: String,
    /// Form fields, including a fresh token
    pub fields: Vec<PromptField>,
    /// The same fields as a ready link
    pub confirm_url: String,
}

#[derive(Debug)]
struct Captured {
    action: Action,
    force: bool,
    token: Option<String>,
}

#[derive(Debug)]
struct Authorized {
    action: Action,
    force: bool,
}

enum Gate {
    Pass(Authorized),
    Confirm(ConfirmationPrompt),
}

#[derive(Debug)]
struct Effect {
    location: String,
    cookie: Option<CookieDirective>,
}

/// Dispatches troubleshooting actions
#[derive(Debug, Clone, Copy)]
pub struct RequestRouter<'a> {
    engine: &'a Engine,
}

impl<'a> RequestRouter<'a> {
    /// Router over `engine`
    #[must_use]
    pub fn new(engine: &'a Engine) -> Self {
        Self { engine }
    }

    /// Run the pipeline for one request
    pub fn route(&self, ctx: &RequestContext) -> Result<RouteOutcome, EngineError> {
        let span = tracing::info_span!(
            "route",
            path = ctx.request().url().path(),
            troubleshooting = ctx.is_troubleshooting(),
            action = field::Empty,
        );
        let _entered = span.enter();

        let Some(captured) = tracing::debug_span!("capture").in_scope(|| self.capture(ctx)) else {
            return Ok(RouteOutcome::Continue);
        };
        span.record("action", captured.action.name());

        let authorized = match tracing::debug_span!("authorize").in_scope(|| self.authorize(ctx, captured))? {
            Gate::Pass(authorized) => authorized,
            Gate::Confirm(prompt) => return Ok(RouteOutcome::Confirm(prompt)),
        };

        let effect = tracing::debug_span!("execute").in_scope(|| self.execute(ctx, authorized))?;
        Ok(tracing::debug_span!("respond").in_scope(|| Self::respond(effect)))
    }

    fn capture(&self, ctx: &RequestContext) -> Option<Captured> {
        let request = ctx.request();
        let action = Action::capture(request)?;

        if action.requires_session() && !ctx.is_troubleshooting() {
            tracing::debug!(action = action.name(), "ignored outside a troubleshooting session");
            return None;
        }
        if matches!(action, Action::TroubleshootExtensions(_)) && ctx.is_troubleshooting() {
            tracing::debug!("already troubleshooting");
            return None;
        }
        if matches!(action, Action::DismissNotices) && !request.is_admin() {
            tracing::debug!("notices are only dismissed from admin screens");
            return None;
        }

        Some(Captured {
            force: action.is_forced(request),
            token: request.query(crate::request::params::AUTH_TOKEN),
            action,
        })
    }

    fn authorize(&self, ctx: &RequestContext, captured: Captured) -> Result<Gate, EngineError> {
        let Captured {
            action,
            force,
            token,
        } = captured;
        let authorizer = self.engine.authorizer();
        let payload = action.payload();

        match authorizer.check(action.name(), &payload, token.as_deref()) {
            Ok(()) => Ok(Gate::Pass(Authorized { action, force })),
            Err(e) if e.is_authorization_failure() => {
                tracing::warn!(action = action.name(), error = %e, "asking operator to confirm");
                let pairs = action.signed_pairs(authorizer, force);
                let fields = pairs
                    .iter()
                    .map(|(name, value)| PromptField {
                        name: (*name).to_string(),
                        value: value.clone(),
                    })
                    .collect();
                Ok(Gate::Confirm(ConfirmationPrompt {
                    action: action.name().to_string(),
                    details: action.attempt_description(),
                    confirm_url: link_with(ctx.request().url(), &pairs),
                    payload,
                    fields,
                }))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn really_active_slugs(&self, ctx: &RequestContext, paths: &[String]) -> BTreeSet<String> {
        let active = ctx.unfiltered(|| self.engine.extension_registry().active_extensions());
        paths
            .iter()
            .filter(|path| active.contains(path))
            .map(|path| extension_slug(path).to_string())
            .collect()
    }

    fn execute(&self, ctx: &RequestContext, authorized: Authorized) -> Result<Effect, EngineError> {
        let Authorized { action, force } = authorized;
        let request = ctx.request();
        let here = request.url();
        let guard = self.engine.transaction_guard();
        let mut cookie = None;
        let mut location = request.clean_url().to_string();

        match &action {
            Action::DisableTroubleshooting => {
                cookie = Some(self.engine.lifecycle().end_session()?);
            }
            Action::DismissNotices => {
                self.engine.store().clear_notices()?;
                location.clone_from(&self.engine.config().admin_url);
            }
            Action::EnableExtension(slug) => {
                guard.execute(&action, force, here, |o| o.allowing(slug))?;
            }
            Action::DisableExtension(slug) => {
                guard.execute(&action, force, here, |o| o.disallowing(slug))?;
            }
            Action::ChangeActiveTheme(theme) => {
                guard.execute(&action, force, here, |o| o.with_theme(theme))?;
            }
            Action::TroubleshootExtensions(paths) => {
                let selected = self.really_active_slugs(ctx, paths);
                let start = self
                    .engine
                    .lifecycle()
                    .begin_session(request.client_origin(), &BTreeSet::new())?;
                guard.execute(&action, false, here, |o| {
                    let mut next = o.clone();
                    next.allowed_extensions.extend(selected);
                    next
                })?;
                cookie = Some(start.cookie);
            }
            Action::BulkEnableExtensions(paths) => {
                let selected = self.really_active_slugs(ctx, paths);
                guard.execute(&action, false, here, |o| {
                    let mut next = o.clone();
                    next.allowed_extensions.extend(selected);
                    next
                })?;
            }
            Action::BulkDisableExtensions(paths) => {
                let selected = self.really_active_slugs(ctx, paths);
                guard.execute(&action, false, here, |o| {
                    let mut next = o.clone();
                    next.allowed_extensions.retain(|slug| !selected.contains(slug));
                    next
                })?;
            }
        }

        Ok(Effect { location, cookie })
    }

    fn respond(effect: Effect) -> RouteOutcome {
        tracing::debug!(location = %effect.location, "redirecting");
        RouteOutcome::Redirect {
            location: effect.location,
            cookie: effect.cookie,
        }
    }
}
