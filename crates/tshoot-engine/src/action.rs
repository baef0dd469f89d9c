//! State-changing actions a request can carry

use crate::registry::extension_slug;
use crate::request::{link_with, params, Request};
use serde::Serialize;
use tshoot_auth::ActionAuthorizer;
use url::Url;

/// Bulk action values of `health-check-bulk-action`
pub mod bulk {
    /// Start a session with the selected extensions allowed
    pub const TROUBLESHOOT: &str = "troubleshoot";
    /// Allow the selected extensions
    pub const ENABLE: &str = "enable";
    /// Disallow the selected extensions
    pub const DISABLE: &str = "disable";
}

/// One mutating operation, with its payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "payload", rename_all = "kebab-case")]
pub enum Action {
    /// End the session
    DisableTroubleshooting,
    /// Clear the notice queue
    DismissNotices,
    /// Allow one extension slug
    EnableExtension(String),
    /// Disallow one extension slug
    DisableExtension(String),
    /// Switch the session theme
    ChangeActiveTheme(String),
    /// Start a session allowing the given extension paths
    TroubleshootExtensions(Vec<String>),
    /// Allow the given extension paths
    BulkEnableExtensions(Vec<String>),
    /// Disallow the given extension paths
    BulkDisableExtensions(Vec<String>),
}

impl Action {
    /// Find the action a request asks for
    ///
    /// Parameters are mutually exclusive; when several are present the
    /// first in this order wins: disable, dismiss, enable, disable one,
    /// theme, bulk.
    #[must_use]
    pub fn capture(request: &Request) -> Option<Self> {
        let non_empty = |name: &str| request.query(name).filter(|v| !v.is_empty());

        if request.has_query(params::DISABLE_TROUBLESHOOTING) {
            return Some(Self::DisableTroubleshooting);
        }
        if request.has_query(params::DISMISS_NOTICES) {
            return Some(Self::DismissNotices);
        }
        if let Some(slug) = non_empty(params::ENABLE_EXTENSION) {
            return Some(Self::EnableExtension(slug));
        }
        if let Some(slug) = non_empty(params::DISABLE_EXTENSION) {
            return Some(Self::DisableExtension(slug));
        }
        if let Some(theme) = non_empty(params::CHANGE_THEME) {
            return Some(Self::ChangeActiveTheme(theme));
        }

        let paths = request.query_all(params::BULK_CHECKED);
        match non_empty(params::BULK_ACTION).as_deref() {
            Some(bulk::TROUBLESHOOT) => Some(Self::TroubleshootExtensions(paths)),
            Some(bulk::ENABLE) => Some(Self::BulkEnableExtensions(paths)),
            Some(bulk::DISABLE) => Some(Self::BulkDisableExtensions(paths)),
            _ => None,
        }
    }

    /// Name the authorization token is bound to
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::DisableTroubleshooting => "disable-troubleshooting",
            Self::DismissNotices => "dismiss-notices",
            Self::EnableExtension(_) => "enable-extension",
            Self::DisableExtension(_) => "disable-extension",
            Self::ChangeActiveTheme(_) => "change-active-theme",
            Self::TroubleshootExtensions(_) => "troubleshoot-extensions",
            Self::BulkEnableExtensions(_) => "bulk-enable-extensions",
            Self::BulkDisableExtensions(_) => "bulk-disable-extensions",
        }
    }

    /// Items the authorization token is bound to
    #[must_use]
    pub fn payload(&self) -> Vec<String> {
        match self {
            Self::DisableTroubleshooting | Self::DismissNotices => Vec::new(),
            Self::EnableExtension(slug)
            | Self::DisableExtension(slug)
            | Self::ChangeActiveTheme(slug) => vec![slug.clone()],
            Self::TroubleshootExtensions(paths)
            | Self::BulkEnableExtensions(paths)
            | Self::BulkDisableExtensions(paths) => paths.clone(),
        }
    }

    /// Query argument that skips the health check, for actions that have one
    #[must_use]
    pub fn force_param(&self) -> Option<&'static str> {
        match self {
            Self::EnableExtension(_) => Some(params::FORCE_ENABLE),
            Self::DisableExtension(_) => Some(params::FORCE_DISABLE),
            Self::ChangeActiveTheme(_) => Some(params::FORCE_THEME),
            _ => None,
        }
    }

    /// Whether the request asked to skip the health check
    #[must_use]
    pub fn is_forced(&self, request: &Request) -> bool {
        self.force_param().is_some_and(|param| request.has_query(param))
    }

    /// Whether an active session is needed to run this action
    #[must_use]
    pub fn requires_session(&self) -> bool {
        !matches!(self, Self::TroubleshootExtensions(_))
    }

    /// Query arguments that trigger this action, without token or force
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let bulk_pairs = |kind: &str, paths: &[String]| -> Vec<(&'static str, String)> {
            std::iter::once((params::BULK_ACTION, kind.to_string()))
                .chain(paths.iter().map(|path| (params::BULK_CHECKED, path.clone())))
                .collect()
        };

        match self {
            Self::DisableTroubleshooting => vec![(params::DISABLE_TROUBLESHOOTING, "1".into())],
            Self::DismissNotices => vec![(params::DISMISS_NOTICES, "1".into())],
            Self::EnableExtension(slug) => vec![(params::ENABLE_EXTENSION, slug.clone())],
            Self::DisableExtension(slug) => vec![(params::DISABLE_EXTENSION, slug.clone())],
            Self::ChangeActiveTheme(theme) => vec![(params::CHANGE_THEME, theme.clone())],
            Self::TroubleshootExtensions(paths) => bulk_pairs(bulk::TROUBLESHOOT, paths),
            Self::BulkEnableExtensions(paths) => bulk_pairs(bulk::ENABLE, paths),
            Self::BulkDisableExtensions(paths) => bulk_pairs(bulk::DISABLE, paths),
        }
    }

    /// Trigger arguments plus force flag and a freshly issued token
    #[must_use]
    pub fn signed_pairs(&self, authorizer: &ActionAuthorizer, force: bool) -> Vec<(&'static str, String)> {
        let mut pairs = self.query_pairs();
        if force {
            if let Some(param) = self.force_param() {
                pairs.push((param, "true".into()));
            }
        }
        let token = authorizer.issue(self.name(), &self.payload());
        pairs.push((params::AUTH_TOKEN, token.encode()));
        pairs
    }

    /// Link on `base` that performs this action
    #[must_use]
    pub fn link(&self, authorizer: &ActionAuthorizer, base: &Url, force: bool) -> String {
        link_with(base, &self.signed_pairs(authorizer, force))
    }

    /// Slugs of the paths a bulk action names
    #[must_use]
    pub fn slugs(paths: &[String]) -> Vec<String> {
        paths.iter().map(|path| extension_slug(path).to_string()).collect()
    }

    /// What the operator was trying to do, for the confirmation prompt
    #[must_use]
    pub fn attempt_description(&self) -> String {
        match self {
            Self::DisableTroubleshooting => "You were attempting to disable troubleshooting mode.".into(),
            Self::DismissNotices => "You were attempting to dismiss all notices.".into(),
            Self::EnableExtension(slug) => {
                format!("You were attempting to enable the {slug} extension while troubleshooting.")
            }
            Self::DisableExtension(slug) => {
                format!("You were attempting to disable the {slug} extension while troubleshooting.")
            }
            Self::ChangeActiveTheme(theme) => {
                format!("You were attempting to change the active theme to {theme} while troubleshooting.")
            }
            Self::TroubleshootExtensions(paths) => format!(
                "You were attempting to start troubleshooting with {} selected extension(s).",
                paths.len()
            ),
            Self::BulkEnableExtensions(paths) => format!(
                "You were attempting to enable {} extension(s) while troubleshooting.",
                paths.len()
            ),
            Self::BulkDisableExtensions(paths) => format!(
                "You were attempting to disable {} extension(s) while troubleshooting.",
                paths.len()
            ),
        }
    }

    /// Audit line for a forced commit
    #[must_use]
    pub fn forced_message(&self) -> String {
        match self {
            Self::EnableExtension(slug) => format!("The {slug} extension was forcefully enabled."),
            Self::DisableExtension(slug) => format!("The {slug} extension was forcefully disabled."),
            Self::ChangeActiveTheme(theme) => format!("The theme was forcefully switched to {theme}."),
            other => format!("The {} action was forced.", other.name()),
        }
    }

    /// Warning text for an automatic rollback
    #[must_use]
    pub fn rollback_message(&self) -> String {
        match self {
            Self::EnableExtension(slug) => format!(
                "When enabling the extension, {slug}, a site failure occurred. Because of this the change was automatically reverted."
            ),
            Self::DisableExtension(slug) => format!(
                "When disabling the extension, {slug}, a site failure occurred. Because of this the change was automatically reverted."
            ),
            Self::ChangeActiveTheme(theme) => format!(
                "When switching the active theme to {theme}, a site failure occurred. Because of this we reverted the theme to the one you used previously."
            ),
            Self::TroubleshootExtensions(_) => "When enabling troubleshooting on the selected extensions, a site failure occurred. Because of this the selected extensions were kept disabled while troubleshooting mode started.".into(),
            Self::BulkEnableExtensions(_) => "When bulk-enabling extensions, a site failure occurred. Because of this the change was automatically reverted.".into(),
            Self::BulkDisableExtensions(_) => "When bulk-disabling extensions, a site failure occurred. Because of this the change was automatically reverted.".into(),
            other => format!("The {} action failed and was reverted.", other.name()),
        }
    }
}
