//! Engine configuration

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Bundled default themes, most recent first
pub const DEFAULT_THEMES: [&str; 14] = [
    "twentytwentyfour",
    "twentytwentythree",
    "twentytwentytwo",
    "twentytwentyone",
    "twentytwenty",
    "twentynineteen",
    "twentyseventeen",
    "twentysixteen",
    "twentyfifteen",
    "twentyfourteen",
    "twentythirteen",
    "twentytwelve",
    "twentyeleven",
    "twentyten",
];

/// Most recent bundled theme that is not block-based
pub const LATEST_CLASSIC_DEFAULT_THEME: &str = "twentytwentyone";

/// Name of the browser cookie carrying the session secret
pub const DEFAULT_COOKIE_NAME: &str = "wp-health-check-disable-plugins";

/// Engine configuration
///
/// Every field has a default, so an empty TOML file is a valid config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Session cookie name
    pub cookie_name: String,
    /// Authorization token lifetime in seconds
    pub authorization_ttl_secs: u64,
    /// Bundled default themes, most recent first
    pub default_themes: Vec<String>,
    /// Suggested classic theme when no default is installed
    pub latest_classic_default_theme: String,
    /// Hex ed25519 seed; generated and persisted when absent
    pub signing_seed: Option<String>,
    /// Administrative landing page
    pub admin_url: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            authorization_ttl_secs: 30 * 60,
            default_themes: DEFAULT_THEMES.iter().map(|s| (*s).to_string()).collect(),
            latest_classic_default_theme: LATEST_CLASSIC_DEFAULT_THEME.to_string(),
            signing_seed: None,
            admin_url: "http://localhost/wp-admin/".to_string(),
        }
    }
}

impl EngineConfig {
    /// Default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the token lifetime
    #[inline]
    #[must_use]
    pub fn with_authorization_ttl(mut self, secs: u64) -> Self {
        self.authorization_ttl_secs = secs;
        self
    }

    /// Set a fixed signing seed
    #[inline]
    #[must_use]
    pub fn with_signing_seed(mut self, seed_hex: impl Into<String>) -> Self {
        self.signing_seed = Some(seed_hex.into());
        self
    }

    /// Replace the default theme list
    #[must_use]
    pub fn with_default_themes<I, S>(mut self, themes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_themes = themes.into_iter().map(Into::into).collect();
        self
    }

    /// Set the admin landing page
    #[inline]
    #[must_use]
    pub fn with_admin_url(mut self, url: impl Into<String>) -> Self {
        self.admin_url = url.into();
        self
    }

    /// Parse and validate TOML
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Reject unusable values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cookie_name.trim().is_empty() {
            return Err(ConfigError::InvalidField {
                field: "cookie_name",
                reason: "must not be empty".into(),
            });
        }
        if self.authorization_ttl_secs == 0 {
            return Err(ConfigError::InvalidField {
                field: "authorization_ttl_secs",
                reason: "must be positive".into(),
            });
        }
        if url::Url::parse(&self.admin_url).is_err() {
            return Err(ConfigError::InvalidField {
                field: "admin_url",
                reason: format!("{:?} is not an absolute URL", self.admin_url),
            });
        }
        self.signing_seed()?;
        Ok(())
    }

    /// Decoded signing seed, if configured
    pub fn signing_seed(&self) -> Result<Option<[u8; 32]>, ConfigError> {
        let Some(text) = &self.signing_seed else {
            return Ok(None);
        };
        let invalid = |reason: &str| ConfigError::InvalidField {
            field: "signing_seed",
            reason: reason.to_string(),
        };
        let bytes = hex::decode(text.trim()).map_err(|_| invalid("not hex"))?;
        let seed: [u8; 32] = bytes.try_into().map_err(|_| invalid("expected 32 bytes"))?;
        Ok(Some(seed))
    }
}
