// Service unit listing via systemctl

use crate::discovery::{CommandRunner, SystemUnit};
use crate::error::DiscoveryError;
use async_trait::async_trait;

const SERVICE_SUFFIX: &str = ".service";

/// Source of service units and their main process ids
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UnitLister: Send + Sync {
    /// List every service unit known to the supervisor
    async fn list_units(&self) -> Result<Vec<SystemUnit>, DiscoveryError>;

    /// Main process id of a unit, or None when it has no running main process
    async fn main_pid(&self, unit_name: &str) -> Result<Option<u32>, DiscoveryError>;
}

/// `UnitLister` backed by the systemctl binary
#[derive(Debug, Clone)]
pub struct SystemctlUnits {
    program: String,
    runner: CommandRunner,
}

impl SystemctlUnits {
    pub fn new(program: impl Into<String>, runner: CommandRunner) -> Self {
        Self {
            program: program.into(),
            runner,
        }
    }
}

#[async_trait]
impl UnitLister for SystemctlUnits {
    async fn list_units(&self) -> Result<Vec<SystemUnit>, DiscoveryError> {
        let output = self
            .runner
            .run(
                &self.program,
                &["list-units", "--type=service", "--all", "--no-pager", "--plain"],
            )
            .await?;

        let units = parse_unit_list(&output);
        tracing::debug!("systemctl reported {} service units", units.len());
        Ok(units)
    }

    async fn main_pid(&self, unit_name: &str) -> Result<Option<u32>, DiscoveryError> {
        let output = self
            .runner
            .run(&self.program, &["show", unit_name, "--property=MainPID"])
            .await?;

        Ok(parse_main_pid(&output))
    }
}

/// Parse `systemctl list-units --plain` output.
///
/// Columns are UNIT LOAD ACTIVE SUB DESCRIPTION...; the header, the legend
/// and anything that is not a `.service` unit are skipped.
pub fn parse_unit_list(output: &str) -> Vec<SystemUnit> {
    output
        .lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 4 {
                return None;
            }

            let name = parts[0];
            if name == "UNIT" || !name.ends_with(SERVICE_SUFFIX) {
                return None;
            }

            Some(SystemUnit {
                name: name.to_string(),
                run_state: parts[2].to_string(),
                description: parts[4..].join(" "),
            })
        })
        .collect()
}

/// Parse `systemctl show --property=MainPID`; a zero pid means no process
pub fn parse_main_pid(output: &str) -> Option<u32> {
    output
        .lines()
        .find_map(|line| line.trim().strip_prefix("MainPID="))
        .and_then(|value| value.trim().parse::<u32>().ok())
        .filter(|pid| *pid > 0)
}
