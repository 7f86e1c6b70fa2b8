//! Trusted location table
//!
//! Storage: global scope, key `content.trust.model.key`
//!
//! ```json
//! {"uriTrustInfo":[{"uri":"/home/me/src","trusted":true}]}
//! ```
//!
//! Trust is additive. Only trusted entries survive a load, and a location
//! with no entry at or above it is untrusted.

use crate::error::Result;
use crate::identity::PathIdentity;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use trust_core::{Storage, StorageScope, StorageTarget};

/// Global storage key of the trusted location table
pub const WORKSPACE_TRUST_STORAGE_KEY: &str = "content.trust.model.key";

/// One stored location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustedPathEntry {
    pub uri: PathBuf,
    #[serde(default)]
    pub trusted: bool,
}

/// The persisted table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustInfo {
    #[serde(default)]
    pub uri_trust_info: Vec<TrustedPathEntry>,
}

/// Result of a lookup: the deciding entry, or the queried path when none
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustUriInfo {
    pub trusted: bool,
    pub uri: PathBuf,
}

/// Owns the trusted location table and its persistence
pub struct TrustStore {
    storage: Arc<dyn Storage>,
    identity: Arc<dyn PathIdentity>,
    info: TrustInfo,
}

impl TrustStore {
    pub fn new(storage: Arc<dyn Storage>, identity: Arc<dyn PathIdentity>) -> Self {
        let mut store = Self {
            storage,
            identity,
            info: TrustInfo::default(),
        };
        store.info = store.load();
        store
    }

    /// Read the table from storage. Absent or unreadable data is an empty table.
    pub fn load(&self) -> TrustInfo {
        let raw = self
            .storage
            .get(WORKSPACE_TRUST_STORAGE_KEY, StorageScope::Global);

        let mut info = match raw.as_deref() {
            Some(raw) if !raw.is_empty() => match serde_json::from_str::<TrustInfo>(raw) {
                Ok(info) => info,
                Err(e) => {
                    warn!("Ignoring malformed trust data: {}", e);
                    TrustInfo::default()
                }
            },
            _ => TrustInfo::default(),
        };

        info.uri_trust_info.retain(|entry| entry.trusted);
        info
    }

    /// Write the table back to storage
    pub fn save(&self) -> Result<()> {
        let serialized = serde_json::to_string(&self.info)?;
        self.storage.store(
            WORKSPACE_TRUST_STORAGE_KEY,
            &serialized,
            StorageScope::Global,
            StorageTarget::Machine,
        )?;
        debug!("Saved {} trusted locations", self.info.uri_trust_info.len());
        Ok(())
    }

    /// Pick up a table another window wrote. Returns whether it differed.
    pub fn reload(&mut self) -> bool {
        let loaded = self.load();
        if loaded == self.info {
            return false;
        }
        self.info = loaded;
        true
    }

    pub fn info(&self) -> &TrustInfo {
        &self.info
    }

    /// Most specific stored entry at or above `path`
    pub fn lookup(&self, path: &Path) -> TrustUriInfo {
        let mut result = TrustUriInfo {
            trusted: false,
            uri: path.to_path_buf(),
        };
        let mut max_length = None;

        for entry in &self.info.uri_trust_info {
            if !self.identity.is_equal_or_parent(path, &entry.uri) {
                continue;
            }

            let length = entry.uri.as_os_str().len();
            if max_length.map_or(true, |max| length > max) {
                max_length = Some(length);
                result = TrustUriInfo {
                    trusted: entry.trusted,
                    uri: entry.uri.clone(),
                };
            }
        }

        result
    }

    /// Add or remove exact entries. Returns whether the table changed.
    pub fn set_trust(&mut self, paths: &[PathBuf], trusted: bool) -> bool {
        let mut changed = false;

        for path in paths {
            if trusted {
                let exists = self
                    .info
                    .uri_trust_info
                    .iter()
                    .any(|entry| self.identity.is_equal(&entry.uri, path));
                if !exists {
                    self.info.uri_trust_info.push(TrustedPathEntry {
                        uri: path.clone(),
                        trusted: true,
                    });
                    changed = true;
                }
            } else {
                let before = self.info.uri_trust_info.len();
                let identity = &self.identity;
                self.info
                    .uri_trust_info
                    .retain(|entry| !identity.is_equal(&entry.uri, path));
                if before != self.info.uri_trust_info.len() {
                    changed = true;
                }
            }
        }

        changed
    }

    /// Replace the whole table with `paths`, all trusted
    pub fn set_all(&mut self, paths: &[PathBuf]) {
        let mut entries: Vec<TrustedPathEntry> = Vec::with_capacity(paths.len());

        for path in paths {
            let clean = self.identity.remove_trailing_separator(path);
            if entries
                .iter()
                .any(|entry| self.identity.is_equal(&entry.uri, &clean))
            {
                continue;
            }
            entries.push(TrustedPathEntry {
                uri: clean,
                trusted: true,
            });
        }

        self.info.uri_trust_info = entries;
    }

    pub fn trusted_folders(&self) -> Vec<PathBuf> {
        self.info
            .uri_trust_info
            .iter()
            .map(|entry| entry.uri.clone())
            .collect()
    }
}
