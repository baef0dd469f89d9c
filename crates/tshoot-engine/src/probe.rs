//! Health probe collaborators
//!
//! The probe answers one question: is the application still serving
//! correctly? Anything other than a `"good"` report counts as broken,
//! including a probe that cannot be reached.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Status value meaning healthy
pub const HEALTHY_STATUS: &str = "good";

/// What a probe reported
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeReport {
    /// `"good"` or anything else
    pub status: String,
    /// Optional human-readable detail
    #[serde(default)]
    pub message: String,
}

impl ProbeReport {
    /// Healthy report
    #[must_use]
    pub fn good() -> Self {
        Self {
            status: HEALTHY_STATUS.to_string(),
            message: String::new(),
        }
    }

    /// Unhealthy report with a reason
    #[must_use]
    pub fn critical(message: impl Into<String>) -> Self {
        Self {
            status: "critical".to_string(),
            message: message.into(),
        }
    }

    /// Whether status is exactly `"good"`
    #[inline]
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.status == HEALTHY_STATUS
    }
}

/// Probe failures
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// Probe endpoint could not be reached
    #[error("health probe unreachable: {0}")]
    Unreachable(String),

    /// Probe answered with something that is not a report
    #[error("invalid health probe report: {0}")]
    InvalidReport(String),
}

/// Live self-test of the application
#[cfg_attr(test, mockall::automock)]
pub trait HealthProbe: Send + Sync {
    /// Run once; no retries
    fn probe(&self) -> Result<ProbeReport, ProbeError>;
}

/// Collapse a probe call to healthy or not, logging why not
pub fn probe_is_healthy(probe: &dyn HealthProbe) -> bool {
    match probe.probe() {
        Ok(report) if report.is_healthy() => true,
        Ok(report) => {
            tracing::warn!(status = %report.status, message = %report.message, "health probe reported a problem");
            false
        }
        Err(e) => {
            tracing::warn!(error = %e, "health probe failed; assuming broken");
            false
        }
    }
}

/// Probe that GETs a URL answering with a JSON [`ProbeReport`]
#[derive(Debug)]
pub struct HttpProbe {
    url: url::Url,
    client: reqwest::blocking::Client,
}

impl HttpProbe {
    /// Build a probe for `url`; `timeout` bounds the single attempt
    pub fn new(url: url::Url, timeout: Duration) -> Result<Self, ProbeError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProbeError::Unreachable(e.to_string()))?;
        Ok(Self { url, client })
    }

    /// Target URL
    #[must_use]
    pub fn url(&self) -> &url::Url {
        &self.url
    }
}

impl HealthProbe for HttpProbe {
    fn probe(&self) -> Result<ProbeReport, ProbeError> {
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .map_err(|e| ProbeError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Ok(ProbeReport::critical(format!("probe answered HTTP {status}")));
        }

        response
            .json::<ProbeReport>()
            .map_err(|e| ProbeError::InvalidReport(e.to_string()))
    }
}

/// Probe with a fixed answer
#[derive(Debug, Clone, Copy)]
pub struct StaticProbe(pub bool);

impl HealthProbe for StaticProbe {
    fn probe(&self) -> Result<ProbeReport, ProbeError> {
        Ok(if self.0 {
            ProbeReport::good()
        } else {
            ProbeReport::critical("configured as broken")
        })
    }
}
