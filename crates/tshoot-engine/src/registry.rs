//! Read-only extension and theme registries
//!
//! The host application owns the real lists; the engine only enumerates
//! them. [`SiteManifest`] is a serializable registry used by the CLI and
//! by tests.

use serde::{Deserialize, Serialize};

/// Slug of an extension path: the part before the first `/`, or the whole
/// path when there is no separator
#[must_use]
pub fn extension_slug(path: &str) -> &str {
    path.split_once('/').map_or(path, |(slug, _)| slug)
}

/// An installed extension
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionInfo {
    /// Primary file path, e.g. `akismet/akismet.php`
    pub path: String,
    /// Display name
    pub name: String,
}

impl ExtensionInfo {
    /// Slug derived from the path
    #[must_use]
    pub fn slug(&self) -> &str {
        extension_slug(&self.path)
    }
}

/// An installed theme
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeInfo {
    /// Theme slug
    pub id: String,
    /// Display name
    pub name: String,
    /// Parent (template) theme, for child themes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

/// Installed extensions
pub trait ExtensionRegistry: Send + Sync {
    /// Real active extension paths, in load order
    fn active_extensions(&self) -> Vec<String>;

    /// Metadata for an installed extension
    fn extension(&self, path: &str) -> Option<ExtensionInfo>;
}

/// The effective active theme as seen by a registry lookup
///
/// Resolving a theme's metadata may ask which theme is active; the view
/// filter hands registries this callback instead of letting them read
/// global state.
pub trait ActiveThemeQuery {
    /// Stylesheet-level theme
    fn stylesheet(&self) -> String;
    /// Template-level theme
    fn template(&self) -> String;
}

/// Installed themes
pub trait ThemeRegistry: Send + Sync {
    /// Real active stylesheet
    fn stylesheet(&self) -> String;

    /// Real active template
    fn template(&self) -> String;

    /// Every installed theme
    fn installed_themes(&self) -> Vec<ThemeInfo>;

    /// Whether a theme is installed
    fn exists(&self, slug: &str) -> bool {
        self.installed_themes().iter().any(|theme| theme.id == slug)
    }

    /// Metadata for `slug`; `active` answers "which theme is active?" if
    /// the lookup needs to know
    fn resolve(&self, slug: &str, active: &dyn ActiveThemeQuery) -> Option<ThemeInfo>;
}

/// Static registry contents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteManifest {
    /// Every installed extension
    #[serde(default)]
    pub extensions: Vec<ExtensionInfo>,
    /// Paths of the really-active extensions, in load order
    #[serde(default)]
    pub active_extensions: Vec<String>,
    /// Every installed theme
    #[serde(default)]
    pub themes: Vec<ThemeInfo>,
    /// Real active stylesheet
    #[serde(default)]
    pub stylesheet: String,
}

impl SiteManifest {
    /// Parse from JSON
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    fn theme(&self, slug: &str) -> Option<&ThemeInfo> {
        self.themes.iter().find(|theme| theme.id == slug)
    }
}

impl ExtensionRegistry for SiteManifest {
    fn active_extensions(&self) -> Vec<String> {
        self.active_extensions.clone()
    }

    fn extension(&self, path: &str) -> Option<ExtensionInfo> {
        self.extensions.iter().find(|ext| ext.path == path).cloned()
    }
}

impl ThemeRegistry for SiteManifest {
    fn stylesheet(&self) -> String {
        self.stylesheet.clone()
    }

    fn template(&self) -> String {
        self.theme(&self.stylesheet)
            .and_then(|theme| theme.parent.clone())
            .unwrap_or_else(|| self.stylesheet.clone())
    }

    fn installed_themes(&self) -> Vec<ThemeInfo> {
        self.themes.clone()
    }

    fn resolve(&self, slug: &str, _active: &dyn ActiveThemeQuery) -> Option<ThemeInfo> {
        self.theme(slug).cloned()
    }
}
