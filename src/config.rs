// Configuration management

use crate::discovery::{CommandRunner, RetryPolicy};
use crate::error::Result;
use crate::health::HealthSettings;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Registry file; defaults to the user data directory
    pub registry_path: Option<PathBuf>,
    pub systemctl_path: String,
    pub ss_path: String,
    pub command_timeout_secs: u64,
    pub command_retries: usize,
    pub health_timeout_ms: u64,
    pub health_cache_ttl_secs: u64,
    pub max_concurrent_probes: usize,
    pub health_cache_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            registry_path: None,
            systemctl_path: "systemctl".to_string(),
            ss_path: "ss".to_string(),
            command_timeout_secs: 10,
            command_retries: 2,
            health_timeout_ms: 2000,
            health_cache_ttl_secs: 60,
            max_concurrent_probes: 8,
            health_cache_capacity: 1024,
        }
    }
}

impl Config {
    /// Get default config path: ~/.config/svcreg/config.yaml
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        Ok(config_dir.join("svcreg").join("config.yaml"))
    }

    /// Get default registry path: ~/.local/share/svcreg/registry.yaml
    pub fn default_registry_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        Ok(data_dir.join("svcreg").join("registry.yaml"))
    }

    /// Load config from path, falling back to defaults if not found
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(path) => path,
            None => Self::default_path()?,
        };

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_yaml::from_str(&contents)?;
            tracing::debug!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            // Return defaults if no config file exists
            Ok(Self::default())
        }
    }

    /// Save config to path
    pub fn save(&self, path: PathBuf) -> Result<()> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn registry_path(&self) -> Result<PathBuf> {
        match &self.registry_path {
            Some(path) => Ok(path.clone()),
            None => Self::default_registry_path(),
        }
    }

    pub fn command_runner(&self) -> CommandRunner {
        let retry = RetryPolicy {
            max_attempts: self.command_retries.max(1),
            ..RetryPolicy::default()
        };
        CommandRunner::new(Duration::from_secs(self.command_timeout_secs), retry)
    }

    pub fn health_settings(&self) -> HealthSettings {
        HealthSettings {
            timeout: Duration::from_millis(self.health_timeout_ms),
            cache_ttl: Duration::from_secs(self.health_cache_ttl_secs),
            max_concurrent_probes: self.max_concurrent_probes,
            cache_capacity: self.health_cache_capacity,
        }
    }
}
