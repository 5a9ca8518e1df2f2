// Health monitoring of registered services

pub mod cache;
pub mod models;
pub mod monitor;
pub mod probe;


pub use cache::HealthCache;
pub use models::{
    HealthProbeResult, HealthSettings, ProbeErrorKind, ProbeFailure, ServiceHealth, ServiceHealthReport,
};
pub use monitor::{build_health_url, HealthMonitor};
pub use probe::{HealthProbe, HttpProbe};
