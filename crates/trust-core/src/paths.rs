//! Standard paths used by the trust tools

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Standard workspace-trust paths
pub struct Paths {
    /// Data directory (~/.local/share/workspace-trust)
    pub data: PathBuf,
    /// Config directory (~/.config/workspace-trust)
    pub config: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

impl Paths {
    pub fn new() -> Self {
        let data = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("workspace-trust");

        let config = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("workspace-trust");

        Self { data, config }
    }

    /// Rooted somewhere other than the user's home (tests, portable installs)
    pub fn with_root(root: &Path) -> Self {
        Self {
            data: root.join("data"),
            config: root.join("config"),
        }
    }

    /// Global (all workspaces) storage file
    pub fn global_storage(&self) -> PathBuf {
        self.data.join("storage.json")
    }

    /// Storage file for one workspace session
    pub fn workspace_storage(&self, workspace_id: &str) -> PathBuf {
        self.data
            .join("workspaces")
            .join(format!("{}.json", workspace_id))
    }

    /// Settings file holding the trust configuration
    pub fn settings(&self) -> PathBuf {
        self.config.join("settings.yaml")
    }

    /// Where untitled (never saved) workspace files are kept
    pub fn untitled_workspaces_home(&self) -> PathBuf {
        self.data.join("Workspaces")
    }
}

/// Stable identifier for a workspace made of the given locations.
///
/// The empty workspace gets the fixed id `empty`.
pub fn workspace_id(locations: &[PathBuf]) -> String {
    if locations.is_empty() {
        return "empty".to_string();
    }

    let mut hasher = Sha256::new();
    for location in locations {
        hasher.update(location.to_string_lossy().as_bytes());
        hasher.update([0u8]);
    }
    format!("ws_{}", hex::encode(&hasher.finalize()[..8]))
}
