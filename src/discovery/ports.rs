// Listening socket discovery via ss, web port classification and pid resolution

use crate::discovery::{CommandRunner, PortBinding};
use crate::error::DiscoveryError;
use async_trait::async_trait;
use std::ops::RangeInclusive;

/// Ports conventionally served by web servers
const WEB_PORTS: [u16; 2] = [80, 443];

/// Port ranges conventionally used by web applications and dev servers
const WEB_PORT_RANGES: [RangeInclusive<u16>; 5] = [
    3000..=3999,
    4000..=4999,
    5000..=5999,
    8000..=8999,
    9000..=9999,
];

/// Source of listening TCP sockets
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PortScanner: Send + Sync {
    async fn list_listening_ports(&self) -> Result<Vec<PortBinding>, DiscoveryError>;
}

/// `PortScanner` backed by `ss -tlnp`
#[derive(Debug, Clone)]
pub struct SsPorts {
    program: String,
    runner: CommandRunner,
}

impl SsPorts {
    pub fn new(program: impl Into<String>, runner: CommandRunner) -> Self {
        Self {
            program: program.into(),
            runner,
        }
    }
}

#[async_trait]
impl PortScanner for SsPorts {
    async fn list_listening_ports(&self) -> Result<Vec<PortBinding>, DiscoveryError> {
        let output = self.runner.run(&self.program, &["-tlnp"]).await?;
        let bindings = parse_ss_output(&output);
        tracing::debug!("ss reported {} listening sockets with an owner", bindings.len());
        Ok(bindings)
    }
}

/// Parse `ss -tlnp` output into port/pid pairs.
///
/// Lines without a numeric `:port` token or an owning pid in `users:(...)`
/// (headers, sockets we lack permission to attribute) are skipped.
pub fn parse_ss_output(output: &str) -> Vec<PortBinding> {
    output
        .lines()
        .filter_map(|line| {
            let port = local_port(line)?;
            let pid = owner_pid(line)?;
            Some(PortBinding::new(port, pid))
        })
        .collect()
}

/// The last whitespace-separated token ending in `:<digits>`
fn local_port(line: &str) -> Option<u16> {
    line.split_whitespace()
        .filter_map(|token| {
            let (_, port) = token.rsplit_once(':')?;
            if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            port.parse::<u16>().ok()
        })
        .last()
}

/// Pid of the first process in the `users:(("name",pid=N,fd=M),...)` field
fn owner_pid(line: &str) -> Option<u32> {
    let users = &line[line.find("users:(")?..];
    // Anchor on the closing quote of the process name, which may contain `pid=`
    let start = users.find("\",pid=")? + "\",pid=".len();
    let digits: String = users[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Whether a port is conventionally used by a web service.
///
/// This is a coarse heuristic over fixed ranges and must be treated as a hint.
pub fn is_web_port(port: u16) -> bool {
    WEB_PORTS.contains(&port) || WEB_PORT_RANGES.iter().any(|range| range.contains(&port))
}

/// Bindings owned by `pid`, in scan order
pub fn ports_for_pid(bindings: &[PortBinding], pid: u32) -> Vec<PortBinding> {
    bindings
        .iter()
        .filter(|binding| binding.owner_pid == pid)
        .copied()
        .collect()
}
