//! Per-workspace trust flags
//!
//! Kept as one JSON object in workspace-scoped storage. Unlike the trusted
//! location table these flags never leave the workspace they belong to.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use trust_core::{Storage, StorageScope, StorageTarget};

/// Workspace storage key of the flags object
pub const WORKSPACE_TRUST_STATE_KEY: &str = "memento/workspaceTrust";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrustMemento {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    is_trusted: Option<bool>,

    #[serde(default)]
    accepts_out_of_workspace_files: bool,
}

/// Session trust flags of the current workspace
pub struct WorkspaceTrustState {
    storage: Arc<dyn Storage>,
    memento: TrustMemento,
}

impl WorkspaceTrustState {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        let memento = storage
            .get(WORKSPACE_TRUST_STATE_KEY, StorageScope::Workspace)
            .and_then(|raw| match serde_json::from_str(&raw) {
                Ok(memento) => Some(memento),
                Err(e) => {
                    warn!("Ignoring malformed workspace trust state: {}", e);
                    None
                }
            })
            .unwrap_or_default();

        Self { storage, memento }
    }

    /// `None` until a decision has been recorded for this workspace
    pub fn is_trusted(&self) -> Option<bool> {
        self.memento.is_trusted
    }

    /// Record trust. Anything short of trusted also withdraws the
    /// out-of-workspace files grant.
    pub fn set_is_trusted(&mut self, value: Option<bool>) -> Result<()> {
        self.memento.is_trusted = value;
        if value != Some(true) {
            self.memento.accepts_out_of_workspace_files = false;
        }
        self.save()
    }

    pub fn accepts_out_of_workspace_files(&self) -> bool {
        self.memento.accepts_out_of_workspace_files
    }

    pub fn set_accepts_out_of_workspace_files(&mut self, value: bool) -> Result<()> {
        self.memento.accepts_out_of_workspace_files = value;
        self.save()
    }

    fn save(&self) -> Result<()> {
        let serialized = serde_json::to_string(&self.memento)?;
        self.storage.store(
            WORKSPACE_TRUST_STATE_KEY,
            &serialized,
            StorageScope::Workspace,
            StorageTarget::Machine,
        )?;
        Ok(())
    }
}
