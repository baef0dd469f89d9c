//! Read-only views shaping what a troubleshooting request loads
//!
//! Filters never write to the store. Both consult the re-entrancy flags in
//! [`RequestContext`](crate::context::RequestContext) so that work they do
//! to derive their own inputs sees the real, unfiltered values.

mod extensions;
mod theme;

pub use extensions::ExtensionViewFilter;
pub use theme::{DefaultThemePrompt, ThemeViewFilter};
