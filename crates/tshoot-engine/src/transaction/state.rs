//! Transaction lifecycle states

use crate::error::EngineError;
use serde::Serialize;

/// Where a guarded mutation is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionState {
    /// Snapshot taken, nothing written
    Proposed,
    /// New value persisted, waiting on the probe
    Probing,
    /// New value kept
    Committed,
    /// Snapshot restored
    RolledBack,
}

impl TransactionState {
    /// Whether no further transition is possible
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Committed | Self::RolledBack)
    }
}

/// States reachable from `from` in one step
#[must_use]
pub fn allowed_transitions(from: TransactionState) -> &'static [TransactionState] {
    use TransactionState::{Committed, Probing, Proposed, RolledBack};
    match from {
        Proposed => &[Probing],
        Probing => &[Committed, RolledBack],
        Committed | RolledBack => &[],
    }
}

/// Reject a transition the lifecycle does not allow
pub fn validate_transition(from: TransactionState, to: TransactionState) -> Result<(), EngineError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(EngineError::IllegalTransition { from, to })
    }
}
