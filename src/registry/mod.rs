// Service registry: persisted records and the reconciliation engine

pub mod engine;
pub mod models;
pub mod store;


pub use engine::ReconciliationEngine;
pub use models::{RecordChange, ScanStats, ServicePatch, ServiceRecord, ServiceStatus, StatusFilter};
pub use store::{FileStore, MemoryStore, RecordTable, RegistryStore};
