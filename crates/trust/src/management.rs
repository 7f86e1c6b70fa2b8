//! Workspace trust management
//!
//! Owns the trusted location table and the session flags, recomputes trust
//! whenever either of them or the workspace changes, and runs transitions.
//!
//! Ordering on every change:
//! 1. the table or flag is written to storage
//! 2. trust is recomputed from what was written
//! 3. if it flipped, the session flag is updated, participants are awaited
//!    and only then `trust changed` is broadcast

use crate::config::ConfigurationService;
use crate::error::Result;
use crate::evaluator::{Evaluation, TrustEvaluator};
use crate::identity::PathIdentity;
use crate::state::WorkspaceTrustState;
use crate::store::{TrustStore, TrustUriInfo, WORKSPACE_TRUST_STORAGE_KEY};
use crate::transition::{ParticipantHandle, TransitionCoordinator, TrustTransitionParticipant};
use crate::workspace::{TrustEnvironment, WorkbenchState, WorkspaceContext};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use trust_core::{Storage, StorageChange, StorageScope};

const EVENT_CAPACITY: usize = 16;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Collaborators the trust manager is built from
#[derive(Clone)]
pub struct TrustContext {
    pub config: Arc<dyn ConfigurationService>,
    pub environment: TrustEnvironment,
    pub storage: Arc<dyn Storage>,
    pub identity: Arc<dyn PathIdentity>,
    pub workspace: Arc<dyn WorkspaceContext>,
}

/// The workspace trust service
pub struct WorkspaceTrustManager {
    context: TrustContext,
    store: Mutex<TrustStore>,
    state: Mutex<WorkspaceTrustState>,
    transitions: TransitionCoordinator,
    trust_changed: broadcast::Sender<bool>,
    trusted_folders_changed: broadcast::Sender<()>,
}

impl WorkspaceTrustManager {
    /// Load the stored table and settle the initial trust without running
    /// any transition.
    pub fn new(context: TrustContext) -> Result<Self> {
        let store = TrustStore::new(context.storage.clone(), context.identity.clone());
        let state = WorkspaceTrustState::new(context.storage.clone());
        let (trust_changed, _) = broadcast::channel(EVENT_CAPACITY);
        let (trusted_folders_changed, _) = broadcast::channel(EVENT_CAPACITY);

        let manager = Self {
            context,
            store: Mutex::new(store),
            state: Mutex::new(state),
            transitions: TransitionCoordinator::new(),
            trust_changed,
            trusted_folders_changed,
        };

        let initial = manager.evaluate();
        debug!("Initial workspace trust: {:?}", initial);
        lock(&manager.state).set_is_trusted(Some(initial.trusted))?;

        Ok(manager)
    }

    fn evaluator(&self) -> TrustEvaluator<'_> {
        TrustEvaluator::new(
            self.context.config.as_ref(),
            &self.context.environment,
            self.context.workspace.as_ref(),
            self.context.identity.as_ref(),
        )
    }

    /// Trust of the workspace as it would be computed right now
    pub fn evaluate(&self) -> Evaluation {
        let session_trust = lock(&self.state).is_trusted();
        let store = lock(&self.store);
        self.evaluator().evaluate(&store, session_trust)
    }

    /// Locations whose trust makes up the workspace's trust
    pub fn workspace_locations(&self) -> Vec<PathBuf> {
        self.evaluator().workspace_locations()
    }

    pub fn workbench_state(&self) -> WorkbenchState {
        self.context.workspace.workbench_state()
    }

    pub fn is_workspace_trusted(&self) -> bool {
        lock(&self.state).is_trusted().unwrap_or(false)
    }

    /// Receive every trust flip, after its participants have run
    pub fn subscribe_trust_changes(&self) -> broadcast::Receiver<bool> {
        self.trust_changed.subscribe()
    }

    /// Receive a notification whenever the trusted location table is saved
    /// or reloaded
    pub fn subscribe_trusted_folders_changes(&self) -> broadcast::Receiver<()> {
        self.trusted_folders_changed.subscribe()
    }

    pub fn add_transition_participant(
        &self,
        participant: Arc<dyn TrustTransitionParticipant>,
    ) -> ParticipantHandle {
        self.transitions.add_participant(participant)
    }

    pub fn accepts_out_of_workspace_files(&self) -> bool {
        lock(&self.state).accepts_out_of_workspace_files()
    }

    pub fn set_accepts_out_of_workspace_files(&self, value: bool) -> Result<()> {
        lock(&self.state).set_accepts_out_of_workspace_files(value)
    }

    pub fn get_uri_trust_info(&self, path: &Path) -> TrustUriInfo {
        lock(&self.store).lookup(path)
    }

    pub fn get_trusted_folders(&self) -> Vec<PathBuf> {
        lock(&self.store).trusted_folders()
    }

    /// Trust or untrust exact locations. Persists and recomputes only when
    /// the table actually changed.
    pub async fn set_uris_trust(&self, paths: &[PathBuf], trusted: bool) -> Result<()> {
        {
            // Saved under the same lock so a concurrent reload cannot drop it
            let mut store = lock(&self.store);
            if !store.set_trust(paths, trusted) {
                debug!("Trust of {:?} already {}", paths, trusted);
                return Ok(());
            }
            store.save()?;
        }

        info!("Set trust of {:?} to {}", paths, trusted);
        self.trust_info_saved().await
    }

    /// Replace the trusted location table. Always persists.
    pub async fn set_trusted_folders(&self, paths: &[PathBuf]) -> Result<()> {
        {
            let mut store = lock(&self.store);
            store.set_all(paths);
            store.save()?;
        }

        info!("Replaced trusted folders ({} given)", paths.len());
        self.trust_info_saved().await
    }

    /// Trust or untrust the open workspace as a whole
    pub async fn set_workspace_trust(&self, trusted: bool) -> Result<()> {
        if self.context.workspace.workbench_state() == WorkbenchState::Empty {
            let previous = self.is_workspace_trusted();
            lock(&self.state).set_is_trusted(Some(trusted))?;
            return self.settle(previous).await;
        }

        let locations = self.workspace_locations();
        self.set_uris_trust(&locations, trusted).await
    }

    /// Parent folder trust is only offered for a single folder
    pub fn can_set_parent_folder_trust(&self) -> bool {
        self.context.workspace.workspace().single_folder().is_some()
    }

    /// Trust or untrust the folder containing the single open folder
    pub async fn set_parent_folder_trust(&self, trusted: bool) -> Result<()> {
        let workspace = self.context.workspace.workspace();
        let Some(parent) = workspace.single_folder().and_then(Path::parent) else {
            return Ok(());
        };

        self.set_uris_trust(&[parent.to_path_buf()], trusted).await
    }

    /// Whether the user may change the workspace's trust from here.
    ///
    /// A trusted workspace can only be untrusted when it is a single folder
    /// that is trusted directly, not through a trusted parent.
    pub fn can_set_workspace_trust(&self) -> bool {
        let workspace = self.context.workspace.workspace();
        if workspace.state() == WorkbenchState::Empty {
            return true;
        }

        if !self.is_workspace_trusted() {
            return true;
        }

        let Some(folder) = workspace.single_folder() else {
            return false;
        };

        let info = self.get_uri_trust_info(folder);
        if !info.trusted || !self.context.identity.is_equal(folder, &info.uri) {
            return false;
        }

        if let Some(parent) = folder.parent() {
            if self.get_uri_trust_info(parent).trusted {
                return false;
            }
        }

        true
    }

    /// React to folders being added or removed
    pub async fn handle_workspace_folders_changed(&self) -> Result<()> {
        self.update_workspace_trust().await
    }

    /// React to the workbench switching between empty, folder and workspace
    pub async fn handle_workbench_state_changed(&self) -> Result<()> {
        self.update_workspace_trust().await
    }

    /// React to a storage write. Only a trusted location table that differs
    /// from ours (another window saved it) triggers anything.
    pub async fn handle_storage_change(&self, change: &StorageChange) -> Result<()> {
        if change.key != WORKSPACE_TRUST_STORAGE_KEY || change.scope != StorageScope::Global {
            return Ok(());
        }

        let changed = lock(&self.store).reload();
        if !changed {
            return Ok(());
        }

        info!("Trusted folders changed in another window");
        let _ = self.trusted_folders_changed.send(());
        self.update_workspace_trust().await
    }

    /// Feed storage notifications into [`Self::handle_storage_change`] until
    /// the storage goes away.
    pub fn listen_for_storage_changes(self: &Arc<Self>) -> JoinHandle<()> {
        let mut changes = self.context.storage.subscribe();
        let manager = Arc::clone(self);

        tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) => {
                        if let Err(e) = manager.handle_storage_change(&change).await {
                            warn!("Failed to apply storage change: {}", e);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!("Missed {} storage notifications", missed);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    async fn trust_info_saved(&self) -> Result<()> {
        let _ = self.trusted_folders_changed.send(());
        self.update_workspace_trust().await
    }

    async fn update_workspace_trust(&self) -> Result<()> {
        let previous = self.is_workspace_trusted();
        self.settle(previous).await
    }

    /// Recompute and transition if the result differs from `previous`
    async fn settle(&self, previous: bool) -> Result<()> {
        let evaluation = self.evaluate();
        let trusted = evaluation.trusted;

        if trusted == previous {
            // Keep the recorded flag in line with what was computed
            if lock(&self.state).is_trusted() != Some(trusted) {
                lock(&self.state).set_is_trusted(Some(trusted))?;
            }
            return Ok(());
        }

        info!("Workspace trust changed to {} ({:?})", trusted, evaluation.reason);
        lock(&self.state).set_is_trusted(Some(trusted))?;

        self.transitions.participate(trusted).await?;

        let _ = self.trust_changed.send(trusted);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrustConfig;
    use crate::testing::{manager_for, RecordingParticipant};
    use crate::workspace::{StaticWorkspace, Workspace};
    use crate::TrustError;
    use std::sync::Arc;
    use std::time::Duration;
    use trust_core::{MemoryStorage, StorageTarget};

    fn p(path: &str) -> PathBuf {
        PathBuf::from(path)
    }

    #[tokio::test]
    async fn test_empty_window_starts_restricted() {
        let (manager, _, _) = manager_for(Workspace::empty());
        assert!(!manager.is_workspace_trusted());
    }

    #[tokio::test]
    async fn test_empty_window_set_trust_fires_once() {
        let (manager, _, _) = manager_for(Workspace::empty());
        let mut changes = manager.subscribe_trust_changes();

        manager.set_workspace_trust(true).await.unwrap();
        assert!(manager.is_workspace_trusted());
        assert_eq!(changes.try_recv().unwrap(), true);
        assert!(changes.try_recv().is_err());

        // Same value again is not a transition
        manager.set_workspace_trust(true).await.unwrap();
        assert!(changes.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_disabled_feature_is_trusted() {
        let storage = Arc::new(MemoryStorage::new());
        let mut config = TrustConfig::default();
        config.set_trust_enabled(Some(false));
        let manager = WorkspaceTrustManager::new(TrustContext {
            config: Arc::new(config),
            environment: TrustEnvironment::new("/data/Workspaces"),
            storage,
            identity: Arc::new(crate::identity::ExtPath::case_sensitive()),
            workspace: Arc::new(StaticWorkspace::new(Workspace::empty())),
        })
        .unwrap();

        assert!(manager.is_workspace_trusted());

        // Untrusting an empty window cannot override a disabled feature
        let mut changes = manager.subscribe_trust_changes();
        manager.set_workspace_trust(false).await.unwrap();
        assert!(manager.is_workspace_trusted());
        assert!(changes.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_folder_trust_round_trip() {
        let (manager, _, _) = manager_for(Workspace::folder("/src/app"));
        let mut changes = manager.subscribe_trust_changes();
        let mut folders = manager.subscribe_trusted_folders_changes();
        assert!(!manager.is_workspace_trusted());

        manager.set_workspace_trust(true).await.unwrap();
        assert!(manager.is_workspace_trusted());
        assert_eq!(manager.get_trusted_folders(), vec![p("/src/app")]);
        assert_eq!(changes.try_recv().unwrap(), true);
        assert!(folders.try_recv().is_ok());

        manager.set_workspace_trust(false).await.unwrap();
        assert!(!manager.is_workspace_trusted());
        assert!(manager.get_trusted_folders().is_empty());
        assert_eq!(changes.try_recv().unwrap(), false);
    }

    #[tokio::test]
    async fn test_repeat_trust_saves_once() {
        let (manager, storage, _) = manager_for(Workspace::folder("/src/app"));
        let mut writes = storage.subscribe();

        manager.set_uris_trust(&[p("/p")], true).await.unwrap();
        manager.set_uris_trust(&[p("/p")], true).await.unwrap();

        let mut table_writes = 0;
        while let Ok(change) = writes.try_recv() {
            if change.key == WORKSPACE_TRUST_STORAGE_KEY {
                table_writes += 1;
            }
        }
        assert_eq!(table_writes, 1);
        assert_eq!(manager.get_trusted_folders(), vec![p("/p")]);
    }

    #[tokio::test]
    async fn test_set_trusted_folders_always_saves() {
        let (manager, _, _) = manager_for(Workspace::folder("/src/app"));
        let mut folders = manager.subscribe_trusted_folders_changes();

        manager.set_trusted_folders(&[]).await.unwrap();
        assert!(folders.try_recv().is_ok());

        manager
            .set_trusted_folders(&[p("/src/"), p("/src"), p("/tmp")])
            .await
            .unwrap();
        assert_eq!(manager.get_trusted_folders(), vec![p("/src"), p("/tmp")]);
        assert!(manager.is_workspace_trusted());
    }

    #[tokio::test]
    async fn test_multi_root_needs_every_root() {
        let workspace = Workspace::multi_root("/src/all.code-workspace", vec![p("/src/a"), p("/tmp/b")]);
        let (manager, _, _) = manager_for(workspace);

        manager.set_uris_trust(&[p("/src")], true).await.unwrap();
        assert!(!manager.is_workspace_trusted());

        manager.set_uris_trust(&[p("/tmp/b")], true).await.unwrap();
        assert!(manager.is_workspace_trusted());
    }

    #[tokio::test]
    async fn test_participants_finish_before_change_event() {
        let (manager, _, _) = manager_for(Workspace::folder("/src/app"));
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut changes = manager.subscribe_trust_changes();

        manager.add_transition_participant(Arc::new(RecordingParticipant::named("p", log.clone())));

        manager.set_workspace_trust(true).await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["p:true".to_string()]);
        assert_eq!(changes.try_recv().unwrap(), true);
    }

    #[tokio::test]
    async fn test_failing_participant_suppresses_event() {
        let (manager, _, _) = manager_for(Workspace::folder("/src/app"));
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut changes = manager.subscribe_trust_changes();
        manager.add_transition_participant(Arc::new(RecordingParticipant::failing("bad", log)));

        let result = manager.set_workspace_trust(true).await;
        assert!(matches!(result, Err(TrustError::Participant(_))));
        assert!(changes.try_recv().is_err());

        // The table and the session flag were already written
        assert!(manager.is_workspace_trusted());
    }

    #[tokio::test]
    async fn test_released_participant_is_not_called() {
        let (manager, _, _) = manager_for(Workspace::folder("/src/app"));
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));

        let handle = manager.add_transition_participant(Arc::new(RecordingParticipant::named("p", log.clone())));
        handle.release();

        manager.set_workspace_trust(true).await.unwrap();
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_untrust_clears_out_of_workspace_grant() {
        let (manager, _, _) = manager_for(Workspace::folder("/src/app"));
        manager.set_workspace_trust(true).await.unwrap();
        manager.set_accepts_out_of_workspace_files(true).unwrap();
        assert!(manager.accepts_out_of_workspace_files());

        manager.set_workspace_trust(false).await.unwrap();
        assert!(!manager.accepts_out_of_workspace_files());
    }

    #[tokio::test]
    async fn test_folder_change_recomputes() {
        let (manager, _, workspace) = manager_for(Workspace::folder("/src/app"));
        manager.set_uris_trust(&[p("/src")], true).await.unwrap();
        assert!(manager.is_workspace_trusted());

        let mut changes = manager.subscribe_trust_changes();
        workspace.set(Workspace::folder("/tmp/download"));
        manager.handle_workspace_folders_changed().await.unwrap();

        assert!(!manager.is_workspace_trusted());
        assert_eq!(changes.try_recv().unwrap(), false);
    }

    #[tokio::test]
    async fn test_workbench_state_change_recomputes() {
        let (manager, _, workspace) = manager_for(Workspace::folder("/src/app"));
        manager.set_uris_trust(&[p("/src")], true).await.unwrap();

        workspace.set(Workspace::empty());
        manager.handle_workbench_state_changed().await.unwrap();

        // An empty window keeps whatever the session last recorded
        assert!(manager.is_workspace_trusted());
    }

    #[tokio::test]
    async fn test_external_table_change() {
        let (manager, storage, _) = manager_for(Workspace::folder("/src/app"));
        let mut changes = manager.subscribe_trust_changes();
        let mut folders = manager.subscribe_trusted_folders_changes();

        storage.store_external(
            WORKSPACE_TRUST_STORAGE_KEY,
            r#"{"uriTrustInfo":[{"uri":"/src","trusted":true}]}"#,
            StorageScope::Global,
        );
        let change = StorageChange {
            key: WORKSPACE_TRUST_STORAGE_KEY.to_string(),
            scope: StorageScope::Global,
            external: true,
        };
        manager.handle_storage_change(&change).await.unwrap();

        assert!(manager.is_workspace_trusted());
        assert!(folders.try_recv().is_ok());
        assert_eq!(changes.try_recv().unwrap(), true);

        // Same content again is ignored
        manager.handle_storage_change(&change).await.unwrap();
        assert!(folders.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unrelated_storage_change_is_ignored() {
        let (manager, storage, _) = manager_for(Workspace::folder("/src/app"));
        let mut folders = manager.subscribe_trusted_folders_changes();

        storage
            .store("other.key", "1", StorageScope::Global, StorageTarget::User)
            .unwrap();
        let change = StorageChange {
            key: "other.key".to_string(),
            scope: StorageScope::Global,
            external: true,
        };
        manager.handle_storage_change(&change).await.unwrap();
        assert!(folders.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_storage_listener_applies_foreign_writes() {
        let (manager, storage, _) = manager_for(Workspace::folder("/src/app"));
        let manager = Arc::new(manager);
        let mut changes = manager.subscribe_trust_changes();
        let listener = manager.listen_for_storage_changes();

        storage.store_external(
            WORKSPACE_TRUST_STORAGE_KEY,
            r#"{"uriTrustInfo":[{"uri":"/src/app","trusted":true}]}"#,
            StorageScope::Global,
        );

        let flipped = tokio::time::timeout(Duration::from_secs(5), changes.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(flipped);
        assert!(manager.is_workspace_trusted());

        listener.abort();
    }

    #[tokio::test]
    async fn test_parent_folder_trust() {
        let (manager, _, _) = manager_for(Workspace::folder("/src/app"));
        assert!(manager.can_set_parent_folder_trust());

        manager.set_parent_folder_trust(true).await.unwrap();
        assert_eq!(manager.get_trusted_folders(), vec![p("/src")]);
        assert!(manager.is_workspace_trusted());

        // Trusted through the parent, so it cannot be untrusted from here
        assert!(!manager.can_set_workspace_trust());
    }

    #[tokio::test]
    async fn test_parent_folder_trust_needs_single_folder() {
        let workspace = Workspace::multi_root("/w.code-workspace", vec![p("/src/a")]);
        let (manager, _, _) = manager_for(workspace);
        assert!(!manager.can_set_parent_folder_trust());

        manager.set_parent_folder_trust(true).await.unwrap();
        assert!(manager.get_trusted_folders().is_empty());
    }

    #[tokio::test]
    async fn test_can_set_workspace_trust() {
        let (manager, _, _) = manager_for(Workspace::empty());
        assert!(manager.can_set_workspace_trust());

        let (manager, _, _) = manager_for(Workspace::folder("/src/app"));
        // Untrusted
        assert!(manager.can_set_workspace_trust());

        // Trusted directly
        manager.set_workspace_trust(true).await.unwrap();
        assert!(manager.can_set_workspace_trust());

        // Trusted multi-root workspace
        let workspace = Workspace::multi_root("/src/w.code-workspace", vec![p("/src/a")]);
        let (manager, _, _) = manager_for(workspace);
        manager.set_uris_trust(&[p("/src")], true).await.unwrap();
        assert!(manager.is_workspace_trusted());
        assert!(!manager.can_set_workspace_trust());
    }

    #[tokio::test]
    async fn test_trust_survives_restart() {
        let storage = Arc::new(MemoryStorage::new());
        let context = crate::testing::context_with(storage.clone(), Workspace::folder("/src/app"));

        let manager = WorkspaceTrustManager::new(context.clone()).unwrap();
        manager.set_workspace_trust(true).await.unwrap();
        drop(manager);

        let manager = WorkspaceTrustManager::new(context).unwrap();
        assert!(manager.is_workspace_trusted());
        assert!(manager.get_uri_trust_info(Path::new("/src/app/main.rs")).trusted);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_storage_listener_never_drops_unsaved_entries() {
        let (manager, _, _) = manager_for(Workspace::folder("/src/app"));
        let manager = Arc::new(manager);
        let listener = manager.listen_for_storage_changes();

        for i in 0..200 {
            let path = p(&format!("/trusted/{}", i));
            manager.set_uris_trust(&[path], true).await.unwrap();
        }
        assert_eq!(manager.get_trusted_folders().len(), 200);

        manager
            .set_trusted_folders(&[p("/x"), p("/y")])
            .await
            .unwrap();
        manager.set_uris_trust(&[p("/z")], true).await.unwrap();

        assert_eq!(manager.get_trusted_folders(), vec![p("/x"), p("/y"), p("/z")]);
        listener.abort();
    }
}
