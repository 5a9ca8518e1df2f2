// Registry persistence: in-memory and YAML file stores

use crate::error::StoreError;
use crate::registry::{RecordChange, ServicePatch, ServiceRecord, StatusFilter};
use async_trait::async_trait;
use chrono::Utc;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

const REGISTRY_FORMAT_VERSION: u32 = 1;

/// Persistent registry of service records with a unique name per record
#[async_trait]
pub trait RegistryStore: Send + Sync {
    async fn find(&self, name: &str) -> Result<Option<ServiceRecord>, StoreError>;

    /// Records matching `filter`, ordered by name
    async fn list(&self, filter: StatusFilter) -> Result<Vec<ServiceRecord>, StoreError>;

    /// Apply all changes atomically: either every change lands or none does.
    ///
    /// Fails with `Conflict` when a create targets an existing name and with
    /// `NotFound` when a refresh targets a missing one.
    async fn commit(&self, changes: &[RecordChange]) -> Result<(), StoreError>;

    async fn insert(&self, record: ServiceRecord) -> Result<(), StoreError>;

    async fn update(&self, name: &str, patch: &ServicePatch) -> Result<ServiceRecord, StoreError>;

    async fn remove(&self, name: &str) -> Result<ServiceRecord, StoreError>;
}

/// Name-keyed record table shared by the store implementations
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordTable {
    records: BTreeMap<String, ServiceRecord>,
}

impl RecordTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ServiceRecord> {
        self.records.get(name)
    }

    pub fn list(&self, filter: StatusFilter) -> Vec<ServiceRecord> {
        self.records
            .values()
            .filter(|record| filter.matches(record.status))
            .cloned()
            .collect()
    }

    pub fn insert(&mut self, record: ServiceRecord) -> Result<(), StoreError> {
        if self.records.contains_key(&record.name) {
            return Err(StoreError::Conflict { name: record.name });
        }
        self.records.insert(record.name.clone(), record);
        Ok(())
    }

    pub fn apply(&mut self, change: &RecordChange) -> Result<(), StoreError> {
        match change {
            RecordChange::Create(record) => self.insert(record.clone()),
            RecordChange::Refresh {
                name,
                supervisor_state,
                scanned_at,
            } => {
                let record = self
                    .records
                    .get_mut(name)
                    .ok_or_else(|| StoreError::NotFound { name: name.clone() })?;
                record.supervisor_state = supervisor_state.clone();
                record.last_scanned_at = Some(*scanned_at);
                record.updated_at = *scanned_at;
                Ok(())
            }
        }
    }

    /// Copy of this table with `changes` applied, or the first failure
    pub fn with_changes(&self, changes: &[RecordChange]) -> Result<Self, StoreError> {
        let mut next = self.clone();
        for change in changes {
            next.apply(change)?;
        }
        Ok(next)
    }

    pub fn update(&mut self, name: &str, patch: &ServicePatch) -> Result<ServiceRecord, StoreError> {
        let record = self
            .records
            .get_mut(name)
            .ok_or_else(|| StoreError::NotFound { name: name.to_string() })?;
        patch.apply(record, Utc::now());
        Ok(record.clone())
    }

    pub fn remove(&mut self, name: &str) -> Result<ServiceRecord, StoreError> {
        self.records
            .remove(name)
            .ok_or_else(|| StoreError::NotFound { name: name.to_string() })
    }
}

/// Registry kept only in process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    table: RwLock<RecordTable>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = ServiceRecord>) -> Result<Self, StoreError> {
        let mut table = RecordTable::default();
        for record in records {
            table.insert(record)?;
        }
        Ok(Self {
            table: RwLock::new(table),
        })
    }
}

#[async_trait]
impl RegistryStore for MemoryStore {
    async fn find(&self, name: &str) -> Result<Option<ServiceRecord>, StoreError> {
        Ok(self.table.read().await.get(name).cloned())
    }

    async fn list(&self, filter: StatusFilter) -> Result<Vec<ServiceRecord>, StoreError> {
        Ok(self.table.read().await.list(filter))
    }

    async fn commit(&self, changes: &[RecordChange]) -> Result<(), StoreError> {
        let mut table = self.table.write().await;
        *table = table.with_changes(changes)?;
        Ok(())
    }

    async fn insert(&self, record: ServiceRecord) -> Result<(), StoreError> {
        self.table.write().await.insert(record)
    }

    async fn update(&self, name: &str, patch: &ServicePatch) -> Result<ServiceRecord, StoreError> {
        self.table.write().await.update(name, patch)
    }

    async fn remove(&self, name: &str) -> Result<ServiceRecord, StoreError> {
        self.table.write().await.remove(name)
    }
}

/// On-disk registry document
#[derive(Debug, Serialize, Deserialize)]
struct RegistryFile {
    version: u32,
    #[serde(default)]
    services: Vec<ServiceRecord>,
}

/// Registry persisted as a YAML document.
///
/// Every mutation runs under an exclusive lock on a sibling `.lock` file,
/// starts from the registry as it is on disk at that moment, writes the
/// candidate table to a sibling temp file and renames it into place. Memory is
/// only updated once the rename succeeded.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    table: RwLock<RecordTable>,
}

impl FileStore {
    /// Open the registry at `path`; a missing file is an empty registry
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let table = load_table(&path).await?;
        tracing::debug!("Loaded {} services from {}", table.len(), path.display());

        Ok(Self {
            path,
            table: RwLock::new(table),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, table: &RecordTable) -> Result<(), StoreError> {
        let document = RegistryFile {
            version: REGISTRY_FORMAT_VERSION,
            services: table.list(StatusFilter::All),
        };
        let yaml = serde_yaml::to_string(&document)?;

        let tmp_path = sibling_path(&self.path, ".tmp");
        tokio::fs::write(&tmp_path, yaml).await?;
        if let Err(e) = tokio::fs::rename(&tmp_path, &self.path).await {
            tokio::fs::remove_file(&tmp_path).await.ok();
            return Err(e.into());
        }
        Ok(())
    }

    /// Take the cross-process write lock, blocking until other writers finish
    async fn lock(&self) -> Result<std::fs::File, StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let lock_path = sibling_path(&self.path, ".lock");
        let file = tokio::task::spawn_blocking(move || -> std::io::Result<std::fs::File> {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .truncate(false)
                .read(true)
                .write(true)
                .open(&lock_path)?;
            file.lock_exclusive()?;
            Ok(file)
        })
        .await
        .map_err(|e| StoreError::Io(std::io::Error::other(e)))??;

        Ok(file)
    }

    /// Reload under lock, build the next table, persist it, then publish it in memory
    async fn mutate<T, F>(&self, change: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut RecordTable) -> Result<T, StoreError> + Send,
        T: Send,
    {
        let mut table = self.table.write().await;
        let lock = self.lock().await?;

        // Another process may have written since this store was opened
        let result = async {
            let mut next = load_table(&self.path).await?;
            let value = change(&mut next)?;
            self.persist(&next).await?;
            Ok::<_, StoreError>((next, value))
        }
        .await;

        if let Err(e) = FileExt::unlock(&lock) {
            tracing::warn!("Failed to release registry lock: {}", e);
        }

        let (next, value) = result?;
        *table = next;
        Ok(value)
    }
}

#[async_trait]
impl RegistryStore for FileStore {
    async fn find(&self, name: &str) -> Result<Option<ServiceRecord>, StoreError> {
        Ok(self.table.read().await.get(name).cloned())
    }

    async fn list(&self, filter: StatusFilter) -> Result<Vec<ServiceRecord>, StoreError> {
        Ok(self.table.read().await.list(filter))
    }

    async fn commit(&self, changes: &[RecordChange]) -> Result<(), StoreError> {
        self.mutate(|table| {
            *table = table.with_changes(changes)?;
            Ok(())
        })
        .await
    }

    async fn insert(&self, record: ServiceRecord) -> Result<(), StoreError> {
        self.mutate(|table| table.insert(record)).await
    }

    async fn update(&self, name: &str, patch: &ServicePatch) -> Result<ServiceRecord, StoreError> {
        self.mutate(|table| table.update(name, patch)).await
    }

    async fn remove(&self, name: &str) -> Result<ServiceRecord, StoreError> {
        self.mutate(|table| table.remove(name)).await
    }
}

async fn load_table(path: &Path) -> Result<RecordTable, StoreError> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(RecordTable::default()),
        Err(e) => return Err(e.into()),
    };

    if contents.trim().is_empty() {
        return Ok(RecordTable::default());
    }

    let document: RegistryFile = serde_yaml::from_str(&contents)?;
    if document.version != REGISTRY_FORMAT_VERSION {
        return Err(StoreError::Corrupt(format!(
            "unsupported registry version {} in {}",
            document.version,
            path.display()
        )));
    }

    let mut table = RecordTable::default();
    for record in document.services {
        table.insert(record).map_err(|e| {
            StoreError::Corrupt(format!("{} ({})", e, path.display()))
        })?;
    }
    Ok(table)
}

fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| "registry.yaml".into());
    name.push(suffix);
    path.with_file_name(name)
}
