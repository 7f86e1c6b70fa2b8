//! Workspace topology as seen by the trust subsystem

use crate::identity::PathIdentity;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

/// Shape of the open workspace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkbenchState {
    /// No folder open
    Empty,
    /// A single folder without a workspace file
    Folder,
    /// A workspace file with any number of folders
    Workspace,
}

/// The open folders and the workspace file that lists them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Workspace {
    pub folders: Vec<PathBuf>,
    pub configuration: Option<PathBuf>,
}

impl Workspace {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn folder(path: impl Into<PathBuf>) -> Self {
        Self {
            folders: vec![path.into()],
            configuration: None,
        }
    }

    pub fn multi_root(configuration: impl Into<PathBuf>, folders: Vec<PathBuf>) -> Self {
        Self {
            folders,
            configuration: Some(configuration.into()),
        }
    }

    pub fn state(&self) -> WorkbenchState {
        if self.configuration.is_some() {
            WorkbenchState::Workspace
        } else if self.folders.is_empty() {
            WorkbenchState::Empty
        } else {
            WorkbenchState::Folder
        }
    }

    /// The folder, when exactly one folder is open without a workspace file
    pub fn single_folder(&self) -> Option<&Path> {
        match self.state() {
            WorkbenchState::Folder => self.folders.first().map(PathBuf::as_path),
            _ => None,
        }
    }
}

/// The workspace-topology collaborator
pub trait WorkspaceContext: Send + Sync {
    fn workspace(&self) -> Workspace;

    fn workbench_state(&self) -> WorkbenchState {
        self.workspace().state()
    }
}

/// A workspace the host swaps out by hand
#[derive(Debug, Default)]
pub struct StaticWorkspace {
    current: RwLock<Workspace>,
}

impl StaticWorkspace {
    pub fn new(workspace: Workspace) -> Self {
        Self {
            current: RwLock::new(workspace),
        }
    }

    /// Replace the open workspace; the caller then notifies the trust manager
    pub fn set(&self, workspace: Workspace) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = workspace;
    }
}

impl WorkspaceContext for StaticWorkspace {
    fn workspace(&self) -> Workspace {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Facts about the running process
#[derive(Debug, Clone, Default)]
pub struct TrustEnvironment {
    /// Set when running extension tests
    pub extension_tests_location: Option<PathBuf>,

    /// Where untitled workspace files are kept until saved
    pub untitled_workspaces_home: PathBuf,
}

impl TrustEnvironment {
    pub fn new(untitled_workspaces_home: impl Into<PathBuf>) -> Self {
        Self {
            extension_tests_location: None,
            untitled_workspaces_home: untitled_workspaces_home.into(),
        }
    }

    /// An untitled workspace file is scratch state, not user content
    pub fn is_untitled_workspace(&self, configuration: &Path, identity: &dyn PathIdentity) -> bool {
        !self.untitled_workspaces_home.as_os_str().is_empty()
            && identity.is_equal_or_parent(configuration, &self.untitled_workspaces_home)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::ExtPath;

    #[test]
    fn test_workbench_state() {
        assert_eq!(Workspace::empty().state(), WorkbenchState::Empty);
        assert_eq!(Workspace::folder("/a").state(), WorkbenchState::Folder);
        assert_eq!(
            Workspace::multi_root("/w.code-workspace", vec![]).state(),
            WorkbenchState::Workspace
        );
    }

    #[test]
    fn test_single_folder() {
        assert_eq!(Workspace::folder("/a").single_folder(), Some(Path::new("/a")));
        assert_eq!(
            Workspace::multi_root("/w.code-workspace", vec![PathBuf::from("/a")]).single_folder(),
            None
        );
        assert_eq!(Workspace::empty().single_folder(), None);
    }

    #[test]
    fn test_untitled_workspace() {
        let env = TrustEnvironment::new("/data/Workspaces");
        let ext = ExtPath::case_sensitive();
        assert!(env.is_untitled_workspace(Path::new("/data/Workspaces/1/workspace.json"), &ext));
        assert!(!env.is_untitled_workspace(Path::new("/home/me/w.code-workspace"), &ext));
    }

    #[test]
    fn test_static_workspace_swap() {
        let ctx = StaticWorkspace::new(Workspace::empty());
        assert_eq!(ctx.workbench_state(), WorkbenchState::Empty);

        ctx.set(Workspace::folder("/a"));
        assert_eq!(ctx.workbench_state(), WorkbenchState::Folder);
    }
}
