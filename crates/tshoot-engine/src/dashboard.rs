//! Data handed to the renderer while troubleshooting

use crate::action::Action;
use crate::context::RequestContext;
use crate::filters::DefaultThemePrompt;
use serde::Serialize;
use tshoot_store::Notice;

/// One really-active extension and its session toggle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtensionEntry {
    /// Slug
    pub slug: String,
    /// Primary file path
    pub path: String,
    /// Display name
    pub name: String,
    /// Whether it loads in this session
    pub enabled: bool,
    /// Authorized link flipping `enabled`
    pub toggle_link: String,
}

/// One installed theme
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThemeEntry {
    /// Slug
    pub id: String,
    /// Display name
    pub name: String,
    /// Whether the session renders with it
    pub active: bool,
    /// Authorized link switching to it; `None` for the active theme
    #[serde(skip_serializing_if = "Option::is_none")]
    pub switch_link: Option<String>,
}

/// Everything the troubleshooting widget shows
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardModel {
    /// Notice queue, oldest first
    pub notices: Vec<Notice>,
    /// Really-active extensions
    pub extensions: Vec<ExtensionEntry>,
    /// Installed themes
    pub themes: Vec<ThemeEntry>,
    /// Authorized link ending the session
    pub disable_link: String,
    /// Authorized link clearing the notices
    pub dismiss_link: String,
    /// Shown when no bundled default theme is installed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_theme_prompt: Option<DefaultThemePrompt>,
}

impl crate::engine::Engine {
    /// Dashboard for a troubleshooting request; `None` otherwise
    ///
    /// Links point at `current_url` with troubleshooting arguments removed.
    pub fn dashboard(
        &self,
        ctx: &RequestContext,
        current_url: &url::Url,
    ) -> Result<Option<DashboardModel>, crate::error::EngineError> {
        if !ctx.is_troubleshooting() {
            return Ok(None);
        }

        let authorizer = self.authorizer();
        let allowed = ctx.allowed_extensions();
        let real_active = ctx.unfiltered(|| self.extension_registry().active_extensions());

        let extensions = real_active
            .into_iter()
            .map(|path| {
                let slug = crate::registry::extension_slug(&path).to_string();
                let name = self
                    .extension_registry()
                    .extension(&path)
                    .map_or_else(|| slug.clone(), |info| info.name);
                let enabled = allowed.contains(&slug);
                let toggle = if enabled {
                    Action::DisableExtension(slug.clone())
                } else {
                    Action::EnableExtension(slug.clone())
                };
                ExtensionEntry {
                    toggle_link: toggle.link(authorizer, current_url, false),
                    slug,
                    path,
                    name,
                    enabled,
                }
            })
            .collect();

        let active_theme = self.theme_filter().effective_theme(ctx);
        let themes = self
            .theme_registry()
            .installed_themes()
            .into_iter()
            .map(|theme| {
                let active = theme.id == active_theme;
                ThemeEntry {
                    switch_link: (!active).then(|| {
                        Action::ChangeActiveTheme(theme.id.clone()).link(authorizer, current_url, false)
                    }),
                    id: theme.id,
                    name: theme.name,
                    active,
                }
            })
            .collect();

        Ok(Some(DashboardModel {
            notices: self.store().notices()?,
            extensions,
            themes,
            disable_link: Action::DisableTroubleshooting.link(authorizer, current_url, false),
            dismiss_link: Action::DismissNotices.link(authorizer, current_url, false),
            default_theme_prompt: self.theme_filter().default_theme_prompt(),
        }))
    }
}
