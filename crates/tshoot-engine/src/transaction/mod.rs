//! Probe-verified mutations of the override store
//!
//! There is no database transaction to lean on, so the guard does it by
//! hand: snapshot the raw stored values, write the proposed overrides,
//! run the health probe once, then keep or restore.
//!
//! ```text
//! Proposed ──▶ Probing ──┬──▶ Committed   (healthy, or forced)
//!                        └──▶ RolledBack  (unhealthy and not forced)
//! ```
//!
//! A forced commit records an info notice. A rollback records a warning
//! notice which, for actions that can be forced, links to a freshly
//! authorized "do it anyway" retry.

mod state;

pub use state::{allowed_transitions, validate_transition, TransactionState};

use crate::action::Action;
use crate::error::EngineError;
use crate::probe::{probe_is_healthy, HealthProbe};
use serde::Serialize;
use serde_json::Value;
use tshoot_auth::ActionAuthorizer;
use tshoot_store::{keys, Notice, OverrideStore, Overrides, StoreError};
use url::Url;

/// Raw values of the override keys, restored byte for byte on rollback
#[derive(Debug, Clone, PartialEq)]
struct RawSnapshot {
    allowed_extensions: Option<Value>,
    theme: Option<Value>,
}

impl RawSnapshot {
    fn take(store: &OverrideStore) -> Result<Self, StoreError> {
        Ok(Self {
            allowed_extensions: store.kv().get(keys::ALLOWED_EXTENSIONS)?,
            theme: store.kv().get(keys::CURRENT_THEME)?,
        })
    }

    fn restore(&self, store: &OverrideStore) -> Result<(), StoreError> {
        for (key, value) in [
            (keys::ALLOWED_EXTENSIONS, &self.allowed_extensions),
            (keys::CURRENT_THEME, &self.theme),
        ] {
            match value {
                Some(value) => store.kv().set(key, value.clone())?,
                None => store.kv().delete(key)?,
            }
        }
        Ok(())
    }
}

/// Result of one guarded mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionOutcome {
    /// Terminal state reached
    pub state: TransactionState,
    /// Overrides before the call
    pub before: Overrides,
    /// Overrides persisted after the call
    pub after: Overrides,
    /// Notice appended, if any
    pub notice: Option<Notice>,
}

impl TransactionOutcome {
    /// Whether the proposed value was kept
    #[inline]
    #[must_use]
    pub fn committed(&self) -> bool {
        self.state == TransactionState::Committed
    }
}

/// Wraps an override mutation in snapshot, probe and commit-or-restore
#[derive(Clone, Copy)]
pub struct TransactionGuard<'a> {
    store: &'a OverrideStore,
    probe: &'a dyn HealthProbe,
    authorizer: &'a ActionAuthorizer,
}

impl std::fmt::Debug for TransactionGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionGuard").finish_non_exhaustive()
    }
}

fn advance(state: &mut TransactionState, to: TransactionState) -> Result<(), EngineError> {
    validate_transition(*state, to)?;
    tracing::trace!(from = ?*state, ?to, "transaction transition");
    *state = to;
    Ok(())
}

impl<'a> TransactionGuard<'a> {
    /// Guard writes to `store`, verifying with `probe`
    #[must_use]
    pub fn new(
        store: &'a OverrideStore,
        probe: &'a dyn HealthProbe,
        authorizer: &'a ActionAuthorizer,
    ) -> Self {
        Self {
            store,
            probe,
            authorizer,
        }
    }

    /// Apply `transform` to the current overrides under the probe
    ///
    /// `return_url` is the page the retry link in a rollback notice points
    /// at. Only storage failures are returned as errors; an unhealthy or
    /// unreachable probe is an ordinary rollback.
    pub fn execute<F>(
        &self,
        action: &Action,
        force: bool,
        return_url: &Url,
        transform: F,
    ) -> Result<TransactionOutcome, EngineError>
    where
        F: FnOnce(&Overrides) -> Overrides,
    {
        let mut state = TransactionState::Proposed;
        let snapshot = RawSnapshot::take(self.store)?;
        let before = self.store.overrides()?;
        let proposed = transform(&before);

        advance(&mut state, TransactionState::Probing)?;
        if let Err(e) = self.store.write_overrides(&proposed) {
            // A partial write must not outlive the failed transaction
            if let Err(restore) = snapshot.restore(self.store) {
                tracing::error!(error = %restore, "cannot restore overrides after failed write");
            }
            return Err(e.into());
        }
        let healthy = probe_is_healthy(self.probe);

        if force {
            advance(&mut state, TransactionState::Committed)?;
            let notice = Notice::info(action.forced_message());
            self.store.push_notice(notice.clone())?;
            tracing::info!(action = action.name(), healthy, "forced change committed");
            return Ok(TransactionOutcome {
                state,
                before,
                after: proposed,
                notice: Some(notice),
            });
        }

        if healthy {
            advance(&mut state, TransactionState::Committed)?;
            tracing::info!(action = action.name(), "change committed");
            return Ok(TransactionOutcome {
                state,
                before,
                after: proposed,
                notice: None,
            });
        }

        snapshot.restore(self.store)?;
        advance(&mut state, TransactionState::RolledBack)?;

        let mut notice = Notice::warning(action.rollback_message());
        if action.force_param().is_some() {
            notice = notice.with_retry_url(action.link(self.authorizer, return_url, true));
        }
        self.store.push_notice(notice.clone())?;
        tracing::warn!(action = action.name(), "site failure after change; rolled back");

        Ok(TransactionOutcome {
            state,
            after: before.clone(),
            before,
            notice: Some(notice),
        })
    }
}
