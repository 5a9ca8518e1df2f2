// Registry data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maturity level of a registered service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    /// Seen in the supervisor, not recognised as a web service
    Raw,
    /// Auto-detected as a web service, not yet configured
    Discovered,
    /// Confirmed and detailed by a user; never changed by a scan
    Configured,
}

impl ServiceStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ServiceStatus::Raw => "raw",
            ServiceStatus::Discovered => "discovered",
            ServiceStatus::Configured => "configured",
        }
    }
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Persisted registry entry, identified by its unit name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub health_endpoint: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    pub status: ServiceStatus,
    pub supervisor_state: String,
    #[serde(default)]
    pub last_scanned_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ServiceRecord {
    /// A unit found by a scan that does not look like a web service
    pub fn raw(name: impl Into<String>, supervisor_state: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            description: None,
            port: None,
            health_endpoint: None,
            base_url: None,
            status: ServiceStatus::Raw,
            supervisor_state: supervisor_state.into(),
            last_scanned_at: Some(now),
            created_at: now,
            updated_at: now,
        }
    }

    /// A unit found by a scan that owns a web port
    pub fn discovered(
        name: impl Into<String>,
        supervisor_state: impl Into<String>,
        description: impl Into<String>,
        port: u16,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            description: Some(description.into()),
            port: Some(port),
            status: ServiceStatus::Discovered,
            ..Self::raw(name, supervisor_state, now)
        }
    }

    /// A service registered by a user rather than found by a scan
    pub fn configured(name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            status: ServiceStatus::Configured,
            last_scanned_at: None,
            ..Self::raw(name, "unknown", now)
        }
    }
}

/// User-controlled fields to change on an existing record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServicePatch {
    pub description: Option<String>,
    pub port: Option<u16>,
    pub health_endpoint: Option<String>,
    pub base_url: Option<String>,
    pub status: Option<ServiceStatus>,
}

impl ServicePatch {
    /// Apply the provided fields to `record`
    pub fn apply(&self, record: &mut ServiceRecord, now: DateTime<Utc>) {
        if let Some(description) = &self.description {
            record.description = Some(description.clone());
        }
        if let Some(port) = self.port {
            record.port = Some(port);
        }
        if let Some(endpoint) = &self.health_endpoint {
            record.health_endpoint = Some(endpoint.clone());
        }
        if let Some(base_url) = &self.base_url {
            record.base_url = Some(base_url.clone());
        }
        if let Some(status) = self.status {
            record.status = status;
        }
        record.updated_at = now;
    }
}

/// One mutation produced by a scan cycle
#[derive(Debug, Clone, PartialEq)]
pub enum RecordChange {
    /// Register a unit seen for the first time
    Create(ServiceRecord),
    /// Refresh run state and scan time of a known unit, nothing else
    Refresh {
        name: String,
        supervisor_state: String,
        scanned_at: DateTime<Utc>,
    },
}

impl RecordChange {
    pub fn name(&self) -> &str {
        match self {
            RecordChange::Create(record) => &record.name,
            RecordChange::Refresh { name, .. } => name,
        }
    }
}

/// Registry listing filter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum StatusFilter {
    #[default]
    All,
    Raw,
    Discovered,
    Configured,
}

impl StatusFilter {
    pub fn matches(&self, status: ServiceStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Raw => status == ServiceStatus::Raw,
            StatusFilter::Discovered => status == ServiceStatus::Discovered,
            StatusFilter::Configured => status == ServiceStatus::Configured,
        }
    }
}

/// Statistics for one reconciliation cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStats {
    pub total_scanned: usize,
    pub new_discovered: usize,
    pub updated: usize,
    pub new_raw: usize,
}
