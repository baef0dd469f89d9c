//! Inbound request model and query parameter names

use crate::error::EngineError;
use std::collections::BTreeMap;
use std::net::IpAddr;
use tshoot_auth::SessionCredentials;
use url::Url;

/// Query parameters recognized by the engine
pub mod params {
    /// Pre-derived session token
    pub const SESSION_HASH: &str = "health-check-disable-plugin-hash";
    /// Comma-separated slugs allowed for this request only
    pub const ALLOWED_EXTENSIONS: &str = "health-check-allowed-plugins";
    /// End the session
    pub const DISABLE_TROUBLESHOOTING: &str = "health-check-disable-troubleshooting";
    /// Clear the notice queue
    pub const DISMISS_NOTICES: &str = "health-check-dismiss-notices";
    /// Allow one extension
    pub const ENABLE_EXTENSION: &str = "health-check-troubleshoot-enable-plugin";
    /// Disallow one extension
    pub const DISABLE_EXTENSION: &str = "health-check-troubleshoot-disable-plugin";
    /// Switch the session theme
    pub const CHANGE_THEME: &str = "health-check-change-active-theme";
    /// Skip the health check when enabling
    pub const FORCE_ENABLE: &str = "health-check-plugin-force-enable";
    /// Skip the health check when disabling
    pub const FORCE_DISABLE: &str = "health-check-plugin-force-disable";
    /// Skip the health check when switching themes
    pub const FORCE_THEME: &str = "health-check-theme-force-switch";
    /// Bulk action name (`troubleshoot`, `enable`, `disable`)
    pub const BULK_ACTION: &str = "health-check-bulk-action";
    /// Repeated extension path selected for a bulk action
    pub const BULK_CHECKED: &str = "checked[]";
    /// Authorization token
    pub const AUTH_TOKEN: &str = "_wpnonce";
    /// Cookie name mistakenly sent as a query argument by older links
    pub const LEGACY_SESSION: &str = "wp-health-check-disable-plugins";

    /// Stripped from every redirect
    pub const RECOGNIZED: [&str; 15] = [
        SESSION_HASH,
        ALLOWED_EXTENSIONS,
        DISABLE_TROUBLESHOOTING,
        DISMISS_NOTICES,
        ENABLE_EXTENSION,
        DISABLE_EXTENSION,
        CHANGE_THEME,
        FORCE_ENABLE,
        FORCE_DISABLE,
        FORCE_THEME,
        BULK_ACTION,
        BULK_CHECKED,
        AUTH_TOKEN,
        LEGACY_SESSION,
        "checked",
    ];
}

/// One inbound HTTP request, reduced to what the engine reads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    url: Url,
    cookies: BTreeMap<String, String>,
    client_origin: Option<IpAddr>,
    is_admin: bool,
}

impl Request {
    /// Parse an absolute request URL
    pub fn new(url: &str) -> Result<Self, EngineError> {
        let url = Url::parse(url).map_err(|source| EngineError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;
        Ok(Self::from_url(url))
    }

    /// Wrap an already parsed URL
    #[must_use]
    pub fn from_url(url: Url) -> Self {
        Self {
            url,
            cookies: BTreeMap::new(),
            client_origin: None,
            is_admin: false,
        }
    }

    /// Attach a cookie
    #[must_use]
    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    /// Set the caller's network address
    #[must_use]
    pub fn with_origin(mut self, origin: IpAddr) -> Self {
        self.client_origin = Some(origin);
        self
    }

    /// Mark as an administrative screen request
    #[must_use]
    pub fn as_admin(mut self) -> Self {
        self.is_admin = true;
        self
    }

    /// Full request URL
    #[inline]
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Cookie value by name
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// Caller's network address
    #[inline]
    #[must_use]
    pub fn client_origin(&self) -> Option<IpAddr> {
        self.client_origin
    }

    /// Whether this is an administrative screen
    #[inline]
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.is_admin
    }

    /// First value of a query parameter
    #[must_use]
    pub fn query(&self, name: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.trim().to_string())
    }

    /// Every value of a repeated query parameter
    #[must_use]
    pub fn query_all(&self, name: &str) -> Vec<String> {
        self.url
            .query_pairs()
            .filter(|(key, _)| key == name)
            .map(|(_, value)| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .collect()
    }

    /// Whether a query parameter is present at all
    #[must_use]
    pub fn has_query(&self, name: &str) -> bool {
        self.url.query_pairs().any(|(key, _)| key == name)
    }

    /// Session credentials carried by this request
    #[must_use]
    pub fn credentials(&self, cookie_name: &str) -> SessionCredentials {
        SessionCredentials {
            cookie: self.cookie(cookie_name).map(str::to_string),
            query_token: self.query(params::SESSION_HASH),
            client_origin: self.client_origin,
        }
    }

    /// Current URL with every recognized parameter removed
    #[must_use]
    pub fn clean_url(&self) -> Url {
        strip_troubleshooting_params(&self.url)
    }
}

/// Remove every recognized troubleshooting parameter from `url`
#[must_use]
pub fn strip_troubleshooting_params(url: &Url) -> Url {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !params::RECOGNIZED.contains(&key.as_ref()))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let mut clean = url.clone();
    if kept.is_empty() {
        clean.set_query(None);
    } else {
        clean.query_pairs_mut().clear().extend_pairs(kept.iter());
    }
    clean
}

/// `base` stripped of troubleshooting parameters, then extended with `pairs`
#[must_use]
pub fn link_with(base: &Url, pairs: &[(&str, String)]) -> String {
    let mut url = strip_troubleshooting_params(base);
    {
        let mut query = url.query_pairs_mut();
        for (key, value) in pairs {
            query.append_pair(key, value);
        }
    }
    url.to_string()
}
