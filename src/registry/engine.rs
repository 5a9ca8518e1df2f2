// Reconciliation of supervisor units and listening sockets into the registry

use crate::discovery::{is_web_port, ports_for_pid, PortBinding, PortScanner, SystemUnit, UnitLister};
use crate::error::{ScanError, StoreError};
use crate::registry::{RecordChange, RegistryStore, ScanStats, ServiceRecord, StatusFilter};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Which statistic a planned change was counted under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tally {
    Updated,
    NewDiscovered,
    NewRaw,
}

#[derive(Debug)]
struct PlannedChange {
    change: RecordChange,
    tally: Tally,
}

/// Merges one snapshot of units and sockets into the registry per scan
pub struct ReconciliationEngine {
    units: Arc<dyn UnitLister>,
    ports: Arc<dyn PortScanner>,
    store: Arc<dyn RegistryStore>,
}

impl ReconciliationEngine {
    pub fn new(
        units: Arc<dyn UnitLister>,
        ports: Arc<dyn PortScanner>,
        store: Arc<dyn RegistryStore>,
    ) -> Self {
        Self { units, ports, store }
    }

    /// Run exactly one reconciliation cycle.
    ///
    /// Nothing is written unless the whole cycle succeeds. Existing records only
    /// get their supervisor state and scan time refreshed; new units become
    /// DISCOVERED when their main process owns a web port and RAW otherwise.
    pub async fn scan(&self) -> Result<ScanStats, ScanError> {
        tracing::info!("Starting service scan");
        let now = Utc::now();

        let units = self.units.list_units().await?;

        let bindings = match self.ports.list_listening_ports().await {
            Ok(bindings) => bindings,
            Err(e) => {
                tracing::warn!("Port scan failed, classifying new units without port evidence: {}", e);
                Vec::new()
            }
        };

        let mut planned = Vec::with_capacity(units.len());
        for unit in &units {
            planned.push(self.plan(unit, &bindings, now).await?);
        }

        self.commit(&mut planned).await?;

        let mut stats = ScanStats {
            total_scanned: units.len(),
            ..ScanStats::default()
        };
        for plan in &planned {
            match plan.tally {
                Tally::Updated => stats.updated += 1,
                Tally::NewDiscovered => stats.new_discovered += 1,
                Tally::NewRaw => stats.new_raw += 1,
            }
        }

        tracing::info!(
            "Scan complete: {} scanned, {} new discovered, {} new raw, {} updated",
            stats.total_scanned,
            stats.new_discovered,
            stats.new_raw,
            stats.updated
        );
        Ok(stats)
    }

    /// Records matching `filter`, ordered by name
    pub async fn services(&self, filter: StatusFilter) -> Result<Vec<ServiceRecord>, StoreError> {
        self.store.list(filter).await
    }

    async fn plan(
        &self,
        unit: &SystemUnit,
        bindings: &[PortBinding],
        now: DateTime<Utc>,
    ) -> Result<PlannedChange, ScanError> {
        if self.store.find(&unit.name).await?.is_some() {
            tracing::debug!("{} already registered, refreshing state '{}'", unit.name, unit.run_state);
            return Ok(PlannedChange {
                change: refresh(unit, now),
                tally: Tally::Updated,
            });
        }

        let web_port = match self.units.main_pid(&unit.name).await? {
            Some(pid) => first_web_port(bindings, pid),
            None => None,
        };

        let planned = match web_port {
            Some(port) => {
                tracing::debug!("{} listens on web port {}, marking discovered", unit.name, port);
                PlannedChange {
                    change: RecordChange::Create(ServiceRecord::discovered(
                        &unit.name,
                        &unit.run_state,
                        &unit.description,
                        port,
                        now,
                    )),
                    tally: Tally::NewDiscovered,
                }
            }
            None => {
                tracing::debug!("{} has no web port, recording as raw", unit.name);
                PlannedChange {
                    change: RecordChange::Create(ServiceRecord::raw(&unit.name, &unit.run_state, now)),
                    tally: Tally::NewRaw,
                }
            }
        };
        Ok(planned)
    }

    /// Commit all planned changes as one write.
    ///
    /// A create that loses a race against another writer becomes a refresh; a
    /// refresh whose record was removed meanwhile is dropped.
    async fn commit(&self, planned: &mut Vec<PlannedChange>) -> Result<(), ScanError> {
        // Each retry turns one create into a refresh or drops one refresh
        loop {
            let changes: Vec<RecordChange> = planned.iter().map(|plan| plan.change.clone()).collect();

            match self.store.commit(&changes).await {
                Ok(()) => return Ok(()),
                Err(StoreError::Conflict { name }) => {
                    tracing::info!("{} was registered concurrently, treating as update", name);
                    let plan = planned
                        .iter_mut()
                        .find(|plan| matches!(&plan.change, RecordChange::Create(r) if r.name == name))
                        .ok_or(StoreError::Conflict { name })?;

                    if let RecordChange::Create(record) = &plan.change {
                        plan.change = RecordChange::Refresh {
                            name: record.name.clone(),
                            supervisor_state: record.supervisor_state.clone(),
                            scanned_at: record.updated_at,
                        };
                    }
                    plan.tally = Tally::Updated;
                }
                Err(StoreError::NotFound { name }) => {
                    tracing::warn!("{} was removed during the scan, skipping refresh", name);
                    let before = planned.len();
                    planned.retain(|plan| {
                        !matches!(&plan.change, RecordChange::Refresh { name: n, .. } if *n == name)
                    });
                    if planned.len() == before {
                        return Err(StoreError::NotFound { name }.into());
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn refresh(unit: &SystemUnit, now: DateTime<Utc>) -> RecordChange {
    RecordChange::Refresh {
        name: unit.name.clone(),
        supervisor_state: unit.run_state.clone(),
        scanned_at: now,
    }
}

/// First web port owned by `pid`, in scan order.
///
/// Processes bound to several web ports are rare and their order carries no
/// meaning, so the first match wins.
fn first_web_port(bindings: &[PortBinding], pid: u32) -> Option<u16> {
    ports_for_pid(bindings, pid)
        .into_iter()
        .map(|binding| binding.port)
        .find(|port| is_web_port(*port))
}
