//! Typed view over the persisted session keys
//!
//! [`OverrideStore`] is the single source of truth for a troubleshooting
//! session. Filters only read it; the transaction guard and the session
//! lifecycle are the only writers.

use crate::error::StoreError;
use crate::kv::KeyValueStore;
use crate::notice::Notice;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Persisted key names, shared with the host application's option table
pub mod keys {
    /// Hash a browser must present to be troubleshooting
    pub const DISABLE_HASH: &str = "health-check-disable-plugin-hash";
    /// Extension slugs allowed to load while troubleshooting
    pub const ALLOWED_EXTENSIONS: &str = "health-check-allowed-plugins";
    /// Theme chosen for the session
    pub const CURRENT_THEME: &str = "health-check-current-theme";
    /// Operator notice queue
    pub const NOTICES: &str = "health-check-dashboard-notices";
    /// Real active extension list captured when the session began
    pub const BACKUP_EXTENSIONS: &str = "health-check-backup-plugin-list";

    /// Every key removed when a session ends
    pub const SESSION_KEYS: [&str; 5] = [
        DISABLE_HASH,
        ALLOWED_EXTENSIONS,
        CURRENT_THEME,
        NOTICES,
        BACKUP_EXTENSIONS,
    ];
}

/// The mutable part of a session: what a transaction snapshots and restores
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overrides {
    /// Slugs permitted to load
    pub allowed_extensions: BTreeSet<String>,
    /// Replacement theme; `None` falls back to a bundled default
    pub theme: Option<String>,
}

impl Overrides {
    /// Copy with `slug` added to the allow-list
    #[must_use]
    pub fn allowing(&self, slug: &str) -> Self {
        let mut next = self.clone();
        next.allowed_extensions.insert(slug.to_string());
        next
    }

    /// Copy with `slug` removed from the allow-list
    #[must_use]
    pub fn disallowing(&self, slug: &str) -> Self {
        let mut next = self.clone();
        next.allowed_extensions.remove(slug);
        next
    }

    /// Copy with the theme override replaced
    #[must_use]
    pub fn with_theme(&self, theme: &str) -> Self {
        Self {
            allowed_extensions: self.allowed_extensions.clone(),
            theme: Some(theme.to_string()),
        }
    }
}

/// Everything the rendering layer needs, read in one pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OverrideSnapshot {
    /// Whether a session hash is persisted (the hash itself stays private)
    pub session_open: bool,
    /// Current override values
    pub overrides: Overrides,
    /// Notice queue, oldest first
    pub notices: Vec<Notice>,
}

/// Typed accessor over a [`KeyValueStore`]
#[derive(Debug, Clone)]
pub struct OverrideStore {
    kv: Arc<dyn KeyValueStore>,
}

impl OverrideStore {
    /// Wrap a backend
    #[inline]
    #[must_use]
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Underlying backend, for collaborators keeping their own keys
    #[inline]
    #[must_use]
    pub fn kv(&self) -> &Arc<dyn KeyValueStore> {
        &self.kv
    }

    fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.kv.get(key)? {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| StoreError::InvalidValue {
                    key: key.to_string(),
                    reason: e.to_string(),
                }),
        }
    }

    fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        self.kv.set(key, serde_json::to_value(value)?)
    }

    /// Persisted session hash; empty strings count as absent
    pub fn disable_hash(&self) -> Result<Option<String>, StoreError> {
        Ok(self
            .read::<String>(keys::DISABLE_HASH)?
            .filter(|hash| !hash.is_empty()))
    }

    /// Persist the session hash
    pub fn set_disable_hash(&self, hash: &str) -> Result<(), StoreError> {
        self.write(keys::DISABLE_HASH, hash)
    }

    /// Persisted allow-list
    pub fn allowed_extensions(&self) -> Result<BTreeSet<String>, StoreError> {
        Ok(self
            .read::<BTreeSet<String>>(keys::ALLOWED_EXTENSIONS)?
            .unwrap_or_default())
    }

    /// Replace the allow-list
    pub fn set_allowed_extensions(&self, allowed: &BTreeSet<String>) -> Result<(), StoreError> {
        self.write(keys::ALLOWED_EXTENSIONS, allowed)
    }

    /// Persisted theme override; empty strings count as absent
    pub fn theme_override(&self) -> Result<Option<String>, StoreError> {
        Ok(self
            .read::<String>(keys::CURRENT_THEME)?
            .filter(|theme| !theme.is_empty()))
    }

    /// Replace or clear the theme override
    pub fn set_theme_override(&self, theme: Option<&str>) -> Result<(), StoreError> {
        match theme {
            Some(theme) => self.write(keys::CURRENT_THEME, theme),
            None => self.kv.delete(keys::CURRENT_THEME),
        }
    }

    /// Both override values
    pub fn overrides(&self) -> Result<Overrides, StoreError> {
        Ok(Overrides {
            allowed_extensions: self.allowed_extensions()?,
            theme: self.theme_override()?,
        })
    }

    /// Persist both override values
    pub fn write_overrides(&self, overrides: &Overrides) -> Result<(), StoreError> {
        self.set_allowed_extensions(&overrides.allowed_extensions)?;
        self.set_theme_override(overrides.theme.as_deref())
    }

    /// Notice queue, oldest first
    pub fn notices(&self) -> Result<Vec<Notice>, StoreError> {
        Ok(self.read::<Vec<Notice>>(keys::NOTICES)?.unwrap_or_default())
    }

    /// Append a notice
    pub fn push_notice(&self, notice: Notice) -> Result<(), StoreError> {
        let mut notices = self.notices()?;
        notices.push(notice);
        self.write(keys::NOTICES, &notices)
    }

    /// Drop every notice
    pub fn clear_notices(&self) -> Result<(), StoreError> {
        self.write(keys::NOTICES, &Vec::<Notice>::new())
    }

    /// Real active extension list captured at session start
    pub fn backup_extension_list(&self) -> Result<Option<Vec<String>>, StoreError> {
        self.read(keys::BACKUP_EXTENSIONS)
    }

    /// Record the real active extension list
    pub fn set_backup_extension_list(&self, list: &[String]) -> Result<(), StoreError> {
        self.write(keys::BACKUP_EXTENSIONS, list)
    }

    /// Read everything the dashboard shows
    pub fn snapshot(&self) -> Result<OverrideSnapshot, StoreError> {
        Ok(OverrideSnapshot {
            session_open: self.disable_hash()?.is_some(),
            overrides: self.overrides()?,
            notices: self.notices()?,
        })
    }

    /// Remove every session key
    pub fn clear_session(&self) -> Result<(), StoreError> {
        for key in keys::SESSION_KEYS {
            self.kv.delete(key)?;
        }
        tracing::debug!("troubleshooting session keys cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryStore;
    use crate::notice::Severity;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn store() -> (Arc<MemoryStore>, OverrideStore) {
        let kv = Arc::new(MemoryStore::new());
        let store = OverrideStore::new(kv.clone());
        (kv, store)
    }

    #[test]
    fn test_empty_store_defaults() {
        let (_, store) = store();

        assert_eq!(store.disable_hash().unwrap(), None);
        assert!(store.allowed_extensions().unwrap().is_empty());
        assert_eq!(store.theme_override().unwrap(), None);
        assert!(store.notices().unwrap().is_empty());
        assert_eq!(store.snapshot().unwrap(), OverrideSnapshot::default());
    }

    #[test]
    fn test_empty_hash_counts_as_absent() {
        let (kv, store) = store();
        kv.set(keys::DISABLE_HASH, json!("")).unwrap();

        assert_eq!(store.disable_hash().unwrap(), None);
    }

    #[test]
    fn test_allow_list_is_a_set() {
        let (kv, store) = store();
        kv.set(keys::ALLOWED_EXTENSIONS, json!(["b", "a", "b"])).unwrap();

        let allowed = store.allowed_extensions().unwrap();
        assert_eq!(allowed.into_iter().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_wrong_shape_is_reported() {
        let (kv, store) = store();
        kv.set(keys::ALLOWED_EXTENSIONS, json!({"a": 1})).unwrap();

        assert!(matches!(
            store.allowed_extensions(),
            Err(StoreError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_write_overrides_roundtrip_clears_theme() {
        let (kv, store) = store();
        let with_theme = Overrides::default().allowing("a").with_theme("twentytwenty");
        store.write_overrides(&with_theme).unwrap();
        assert_eq!(store.overrides().unwrap(), with_theme);

        let without_theme = Overrides {
            theme: None,
            ..with_theme
        };
        store.write_overrides(&without_theme).unwrap();
        assert_eq!(store.overrides().unwrap(), without_theme);
        assert_eq!(kv.get(keys::CURRENT_THEME).unwrap(), None);
    }

    #[test]
    fn test_notices_keep_order() {
        let (_, store) = store();
        store.push_notice(Notice::info("first")).unwrap();
        store.push_notice(Notice::warning("second")).unwrap();

        let notices = store.notices().unwrap();
        assert_eq!(notices.len(), 2);
        assert_eq!(notices[0].message, "first");
        assert_eq!(notices[1].severity, Severity::Warning);

        store.clear_notices().unwrap();
        assert!(store.notices().unwrap().is_empty());
    }

    #[test]
    fn test_clear_session_removes_every_session_key() {
        let (kv, store) = store();
        store.set_disable_hash("abc").unwrap();
        store.write_overrides(&Overrides::default().allowing("a").with_theme("t")).unwrap();
        store.push_notice(Notice::info("x")).unwrap();
        store.set_backup_extension_list(&["a/a.php".to_string()]).unwrap();
        kv.set("unrelated", json!(1)).unwrap();

        store.clear_session().unwrap();

        assert_eq!(kv.keys(), vec!["unrelated".to_string()]);
    }

    #[test]
    fn test_overrides_helpers_do_not_mutate_source() {
        let base = Overrides::default().allowing("a");
        let next = base.disallowing("a").allowing("b");

        assert!(base.allowed_extensions.contains("a"));
        assert!(!next.allowed_extensions.contains("a"));
        assert!(next.allowed_extensions.contains("b"));
    }
}
