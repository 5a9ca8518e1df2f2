// Error types for svcreg

use std::time::Duration;
use thiserror::Error;

/// Result type alias using anyhow::Error
pub type Result<T> = anyhow::Result<T>;

/// Failures querying the OS for units, process ids or listening sockets.
///
/// Every variant means discovery is unavailable for the current scan.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryError {
    #[error("'{program}' is not installed or not on PATH")]
    MissingTool { program: String },

    #[error("Permission denied running '{program}'")]
    PermissionDenied { program: String },

    #[error("Failed to spawn '{program}': {message}")]
    Spawn { program: String, message: String },

    #[error("'{program}' exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("'{program}' did not finish within {timeout:?}")]
    TimedOut { program: String, timeout: Duration },
}

impl DiscoveryError {
    /// Missing binaries and permission problems will not fix themselves on retry
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            DiscoveryError::MissingTool { .. } | DiscoveryError::PermissionDenied { .. }
        )
    }
}

/// Registry store failures
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Service '{name}' already exists")]
    Conflict { name: String },

    #[error("Service '{name}' not found")]
    NotFound { name: String },

    #[error("Registry IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Registry serialization error: {0}")]
    Serialize(#[from] serde_yaml::Error),

    #[error("Registry file is corrupt: {0}")]
    Corrupt(String),
}

/// Reasons a reconciliation cycle can abort
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Service discovery unavailable: {0}")]
    DiscoveryUnavailable(#[from] DiscoveryError),

    #[error("Failed to commit scan results: {0}")]
    Store(#[from] StoreError),
}
