//! Key-value storage
//!
//! Values are opaque strings, addressed by a key inside a scope. The global
//! scope is shared by every workspace on the machine; the workspace scope
//! belongs to one workspace session.
//!
//! Every write publishes a [`StorageChange`]. Changes made by somebody else
//! (another window writing the same files) are published with
//! `external: true` once they are observed: when this handle next writes the
//! same scope, on [`JsonFileStorage::reload`], or from [`JsonFileStorage::poll`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Storage-specific errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed storage file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Where a value lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageScope {
    /// Shared across all workspaces
    Global,
    /// Private to the current workspace session
    Workspace,
}

/// Whether a value is user data (may roam) or machine-local state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageTarget {
    User,
    Machine,
}

/// Notification that a key changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageChange {
    pub key: String,
    pub scope: StorageScope,
    /// Written by another process rather than through this handle
    pub external: bool,
}

/// The storage collaborator
pub trait Storage: Send + Sync {
    /// Read a value
    fn get(&self, key: &str, scope: StorageScope) -> Option<String>;

    /// Write a value
    fn store(
        &self,
        key: &str,
        value: &str,
        scope: StorageScope,
        target: StorageTarget,
    ) -> Result<(), StorageError>;

    /// Delete a value
    fn remove(&self, key: &str, scope: StorageScope) -> Result<(), StorageError>;

    /// Stream of change notifications
    fn subscribe(&self) -> broadcast::Receiver<StorageChange>;
}

const CHANGE_CAPACITY: usize = 64;

type Table = BTreeMap<String, String>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-process storage, nothing touches the disk
pub struct MemoryStorage {
    tables: Mutex<HashMap<StorageScope, Table>>,
    changes: broadcast::Sender<StorageChange>,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            tables: Mutex::new(HashMap::new()),
            changes,
        }
    }

    /// Write a value as if another window had done it
    pub fn store_external(&self, key: &str, value: &str, scope: StorageScope) {
        lock(&self.tables)
            .entry(scope)
            .or_default()
            .insert(key.to_string(), value.to_string());
        self.publish(key, scope, true);
    }

    fn publish(&self, key: &str, scope: StorageScope, external: bool) {
        // No receivers is fine
        let _ = self.changes.send(StorageChange {
            key: key.to_string(),
            scope,
            external,
        });
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str, scope: StorageScope) -> Option<String> {
        lock(&self.tables)
            .get(&scope)
            .and_then(|table| table.get(key).cloned())
    }

    fn store(
        &self,
        key: &str,
        value: &str,
        scope: StorageScope,
        _target: StorageTarget,
    ) -> Result<(), StorageError> {
        lock(&self.tables)
            .entry(scope)
            .or_default()
            .insert(key.to_string(), value.to_string());
        self.publish(key, scope, false);
        Ok(())
    }

    fn remove(&self, key: &str, scope: StorageScope) -> Result<(), StorageError> {
        let removed = lock(&self.tables)
            .get_mut(&scope)
            .and_then(|table| table.remove(key))
            .is_some();
        if removed {
            self.publish(key, scope, false);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.changes.subscribe()
    }
}

/// Storage backed by two JSON files, one per scope
pub struct JsonFileStorage {
    global_path: PathBuf,
    workspace_path: PathBuf,
    tables: Mutex<HashMap<StorageScope, Table>>,
    changes: broadcast::Sender<StorageChange>,
}

impl JsonFileStorage {
    /// Open (or lazily create) the storage files
    pub fn open(global_path: PathBuf, workspace_path: PathBuf) -> Result<Self, StorageError> {
        let mut tables = HashMap::new();
        tables.insert(StorageScope::Global, read_table(&global_path)?);
        tables.insert(StorageScope::Workspace, read_table(&workspace_path)?);

        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Ok(Self {
            global_path,
            workspace_path,
            tables: Mutex::new(tables),
            changes,
        })
    }

    fn path_for(&self, scope: StorageScope) -> &Path {
        match scope {
            StorageScope::Global => &self.global_path,
            StorageScope::Workspace => &self.workspace_path,
        }
    }

    /// Re-read both files and publish every key another process changed.
    pub fn reload(&self) -> Result<Vec<StorageChange>, StorageError> {
        let mut changed = Vec::new();

        for scope in [StorageScope::Global, StorageScope::Workspace] {
            let on_disk = read_table(self.path_for(scope))?;
            let mut tables = lock(&self.tables);
            let cached = tables.entry(scope).or_default();

            changed.extend(external_changes(cached, &on_disk, scope, None));
            *cached = on_disk;
        }

        self.publish_external(&changed);
        Ok(changed)
    }

    /// Call [`Self::reload`] every `period` until the storage is dropped.
    ///
    /// Nothing notices another process's writes otherwise.
    pub fn poll(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let storage = Arc::downgrade(self);

        tokio::spawn(async move {
            let mut ticks = tokio::time::interval(period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticks.tick().await;
                let Some(storage) = storage.upgrade() else {
                    break;
                };
                if let Err(e) = storage.reload() {
                    warn!("Failed to reload storage: {}", e);
                }
            }
        })
    }

    fn publish_external(&self, changed: &[StorageChange]) {
        for change in changed {
            debug!("External storage change: {:?} {}", change.scope, change.key);
            let _ = self.changes.send(change.clone());
        }
    }

    /// Apply one key change on top of what is on disk now, so keys other
    /// processes wrote since we last looked survive the flush.
    fn write_key(
        &self,
        key: &str,
        value: Option<&str>,
        scope: StorageScope,
    ) -> Result<bool, StorageError> {
        let (external, written) = {
            let mut tables = lock(&self.tables);
            let cached = tables.entry(scope).or_default();

            let mut merged = match read_table(self.path_for(scope)) {
                Ok(on_disk) => on_disk,
                Err(e) => {
                    warn!("Overwriting unreadable storage file: {}", e);
                    cached.clone()
                }
            };
            let external = external_changes(cached, &merged, scope, Some(key));

            let previous = match value {
                Some(value) => merged.insert(key.to_string(), value.to_string()),
                None => merged.remove(key),
            };
            // Removing a key nobody has is not a write
            let written = value.is_some() || previous.is_some();
            if written {
                self.flush(scope, &merged)?;
            }
            *cached = merged;
            (external, written)
        };

        self.publish_external(&external);
        if written {
            let _ = self.changes.send(StorageChange {
                key: key.to_string(),
                scope,
                external: false,
            });
        }
        Ok(written)
    }

    fn flush(&self, scope: StorageScope, table: &Table) -> Result<(), StorageError> {
        let path = self.path_for(scope);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StorageError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let content = serde_json::to_string_pretty(table).map_err(|source| StorageError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, content).map_err(|source| StorageError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl Storage for JsonFileStorage {
    fn get(&self, key: &str, scope: StorageScope) -> Option<String> {
        lock(&self.tables)
            .get(&scope)
            .and_then(|table| table.get(key).cloned())
    }

    fn store(
        &self,
        key: &str,
        value: &str,
        scope: StorageScope,
        _target: StorageTarget,
    ) -> Result<(), StorageError> {
        self.write_key(key, Some(value), scope)?;
        Ok(())
    }

    fn remove(&self, key: &str, scope: StorageScope) -> Result<(), StorageError> {
        self.write_key(key, None, scope)?;
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.changes.subscribe()
    }
}

/// Keys whose value differs between `cached` and `on_disk`, except `skip`
fn external_changes(
    cached: &Table,
    on_disk: &Table,
    scope: StorageScope,
    skip: Option<&str>,
) -> Vec<StorageChange> {
    let mut keys: Vec<&String> = cached.keys().chain(on_disk.keys()).collect();
    keys.sort();
    keys.dedup();

    keys.into_iter()
        .filter(|key| Some(key.as_str()) != skip)
        .filter(|key| cached.get(*key) != on_disk.get(*key))
        .map(|key| StorageChange {
            key: key.clone(),
            scope,
            external: true,
        })
        .collect()
}

/// Read a table, a missing file is an empty table
fn read_table(path: &Path) -> Result<Table, StorageError> {
    if !path.exists() {
        return Ok(Table::new());
    }

    let content = std::fs::read_to_string(path).map_err(|source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    if content.trim().is_empty() {
        return Ok(Table::new());
    }

    serde_json::from_str(&content).map_err(|source| {
        warn!("Unreadable storage file {:?}", path);
        StorageError::Json {
            path: path.to_path_buf(),
            source,
        }
    })
}
