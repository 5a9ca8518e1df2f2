// Transient discovery data, valid for one scan cycle

use serde::{Deserialize, Serialize};

/// A service unit as reported by the supervisor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemUnit {
    pub name: String,
    /// Active state column, e.g. active/inactive/failed
    pub run_state: String,
    pub description: String,
}

impl SystemUnit {
    pub fn new(name: impl Into<String>, run_state: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            run_state: run_state.into(),
            description: description.into(),
        }
    }
}

/// A TCP socket in LISTEN state and the process that owns it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortBinding {
    pub port: u16,
    pub owner_pid: u32,
}

impl PortBinding {
    pub fn new(port: u16, owner_pid: u32) -> Self {
        Self { port, owner_pid }
    }
}
