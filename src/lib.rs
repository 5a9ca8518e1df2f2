// Svcreg - Service registry with discovery and health monitoring
// Library root

pub mod config;
pub mod discovery;
pub mod error;
pub mod health;
pub mod registry;
