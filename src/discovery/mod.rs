// Host service discovery: supervisor units and listening sockets

pub mod command;
pub mod models;
pub mod ports;
pub mod units;

#[cfg(test)]
mod tests;

pub use command::{CommandRunner, RetryPolicy};
pub use models::{PortBinding, SystemUnit};
pub use ports::{is_web_port, parse_ss_output, ports_for_pid, PortScanner, SsPorts};
pub use units::{parse_main_pid, parse_unit_list, SystemctlUnits, UnitLister};

#[cfg(test)]
pub use ports::MockPortScanner;
#[cfg(test)]
pub use units::MockUnitLister;
