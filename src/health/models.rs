// Health check data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Classified transport failure of a health probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeErrorKind {
    Timeout,
    ConnectFailure,
    Other,
}

/// Why a probe got no HTTP status back
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeFailure {
    pub kind: ProbeErrorKind,
    pub message: String,
}

impl ProbeFailure {
    pub fn timeout() -> Self {
        Self {
            kind: ProbeErrorKind::Timeout,
            message: "Timeout".to_string(),
        }
    }

    pub fn connect(message: impl Into<String>) -> Self {
        Self {
            kind: ProbeErrorKind::ConnectFailure,
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self {
            kind: ProbeErrorKind::Other,
            message: message.into(),
        }
    }
}

/// Outcome of one health probe; failures are values, not errors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthProbeResult {
    pub healthy: bool,
    pub status_code: Option<u16>,
    pub error: Option<ProbeFailure>,
    pub checked_at: DateTime<Utc>,
}

impl HealthProbeResult {
    /// Only an exact 200 counts as healthy
    pub fn from_status(status_code: u16) -> Self {
        Self {
            healthy: status_code == 200,
            status_code: Some(status_code),
            error: None,
            checked_at: Utc::now(),
        }
    }

    pub fn from_failure(failure: ProbeFailure) -> Self {
        Self {
            healthy: false,
            status_code: None,
            error: Some(failure),
            checked_at: Utc::now(),
        }
    }

    pub fn error_kind(&self) -> Option<ProbeErrorKind> {
        self.error.as_ref().map(|failure| failure.kind)
    }
}

/// Health summary for a registered service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceHealth {
    Healthy,
    Unhealthy,
    /// No health URL can be built for the service
    Unknown,
}

impl ServiceHealth {
    pub fn label(&self) -> &'static str {
        match self {
            ServiceHealth::Healthy => "healthy",
            ServiceHealth::Unhealthy => "unhealthy",
            ServiceHealth::Unknown => "unknown",
        }
    }
}

/// Tuning for the health monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthSettings {
    /// Upper bound for a single probe
    pub timeout: Duration,
    /// How long a probe result is served from cache
    pub cache_ttl: Duration,
    pub max_concurrent_probes: usize,
    pub cache_capacity: usize,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(2),
            cache_ttl: Duration::from_secs(60),
            max_concurrent_probes: 8,
            cache_capacity: 1024,
        }
    }
}

/// Health of one registered service, as shown on a dashboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceHealthReport {
    pub name: String,
    pub health_url: Option<String>,
    pub health: ServiceHealth,
    pub probe: Option<HealthProbeResult>,
}
