//! Operator notices
//!
//! Audit trail of automatic actions taken during a session: forced changes
//! and rollbacks. Appended in order, displayed oldest first, cleared as a
//! whole.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// How prominently a notice is shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Record of an operator-forced change
    Info,
    /// Neutral message
    Notice,
    /// A change was rolled back
    Warning,
}

/// One entry in the notice queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    /// Display severity
    pub severity: Severity,
    /// Human readable description
    pub message: String,
    /// "Do it anyway" link for rolled back actions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_url: Option<String>,
    /// UTC time, minute resolution (`YYYY-MM-DD HH:MM`)
    pub time: String,
}

impl Notice {
    /// Create a notice stamped with the current time
    #[must_use]
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            retry_url: None,
            time: Utc::now().format("%Y-%m-%d %H:%M").to_string(),
        }
    }

    /// Informational notice
    #[inline]
    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Severity::Info, message)
    }

    /// Warning notice
    #[inline]
    #[must_use]
    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    /// Attach a retry link
    #[inline]
    #[must_use]
    pub fn with_retry_url(mut self, url: impl Into<String>) -> Self {
        self.retry_url = Some(url.into());
        self
    }
}
