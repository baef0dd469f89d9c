//! Extension view filter

use crate::context::RequestContext;
use crate::registry::extension_slug;

/// Computes the active extension list a request actually loads
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtensionViewFilter;

impl ExtensionViewFilter {
    /// Effective active list for this request
    ///
    /// Identity unless the request is troubleshooting. Otherwise keeps the
    /// entries whose slug is allowed, in input order; duplicates pass
    /// through untouched.
    #[must_use]
    pub fn effective_list(&self, full: &[String], ctx: &RequestContext) -> Vec<String> {
        if !ctx.is_troubleshooting() || ctx.extension_guard.is_set() {
            return full.to_vec();
        }

        let allowed = {
            let _guard = ctx.extension_guard.enter();
            ctx.allowed_extensions()
        };

        let effective: Vec<String> = full
            .iter()
            .filter(|path| allowed.contains(extension_slug(path)))
            .cloned()
            .collect();

        tracing::debug!(
            total = full.len(),
            loaded = effective.len(),
            "extension list filtered for troubleshooting session"
        );
        effective
    }
}
