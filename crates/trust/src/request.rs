//! Workspace trust requests
//!
//! The user-facing side of trust. Callers that need a trusted workspace ask
//! for it here; the UI listens for initiated requests, shows its modal and
//! reports the answer back through [`WorkspaceTrustRequests::complete_request`]
//! or [`WorkspaceTrustRequests::cancel_request`].
//!
//! Only one modal request exists at a time. Everybody asking while it is
//! open shares it and gets the same answer.
//!
//! Opening loose files from outside a trusted workspace is brokered here
//! as well, through the dialog collaborator.

use crate::error::{Result, TrustError};
use crate::management::WorkspaceTrustManager;
use crate::workspace::WorkbenchState;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};
use trust_core::{Storage, StorageScope, StorageTarget};

/// Global storage key of the remembered loose-file decision
pub const WORKSPACE_TRUST_NON_WORKSPACE_FILES_DECISION_KEY: &str =
    "security.workspace.trust.nonWorkspaceFiles";

const EVENT_CAPACITY: usize = 16;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// What to do with files from outside the trusted workspace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UriTrustResponse {
    Open = 1,
    OpenInNewWindow = 2,
    Cancel = 3,
}

impl UriTrustResponse {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Open),
            2 => Some(Self::OpenInNewWindow),
            3 => Some(Self::Cancel),
            _ => None,
        }
    }
}

/// Role of a button in the trust modal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustRequestButtonKind {
    ContinueWithTrust,
    ContinueWithoutTrust,
    Manage,
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustRequestButton {
    pub label: String,
    pub kind: TrustRequestButtonKind,
}

/// Caller's wishes for how the trust modal is presented
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustRequestOptions {
    pub message: Option<String>,
    pub buttons: Vec<TrustRequestButton>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogCheckbox {
    pub label: String,
    pub checked: bool,
}

/// A modal question for the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogPrompt {
    pub message: String,
    pub details: Vec<String>,
    pub buttons: Vec<String>,
    /// Index reported when the dialog is dismissed
    pub cancel_id: usize,
    pub checkbox: Option<DialogCheckbox>,
}

/// The user's answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialogResult {
    pub choice: usize,
    pub checkbox_checked: Option<bool>,
}

/// The modal-dialog collaborator
#[async_trait]
pub trait DialogService: Send + Sync {
    async fn show(&self, prompt: DialogPrompt) -> anyhow::Result<DialogResult>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestState {
    Pending,
    /// `None` when cancelled
    Settled(Option<bool>),
}

/// Handle on a trust request, cheap to clone
#[derive(Debug, Clone)]
pub struct TrustRequest {
    state: watch::Receiver<RequestState>,
}

impl TrustRequest {
    fn settled(outcome: Option<bool>) -> Self {
        let (_, state) = watch::channel(RequestState::Settled(outcome));
        Self { state }
    }

    /// Both handles refer to the same request
    pub fn same_request(&self, other: &TrustRequest) -> bool {
        self.state.same_channel(&other.state)
    }

    pub fn is_settled(&self) -> bool {
        matches!(*self.state.borrow(), RequestState::Settled(_))
    }

    /// Wait for the answer: `Some(trusted)`, or `None` when cancelled
    pub async fn outcome(mut self) -> Option<bool> {
        let settled = match self
            .state
            .wait_for(|state| matches!(state, RequestState::Settled(_)))
            .await
        {
            Ok(state) => Some(*state),
            Err(_) => None,
        };
        // Broker dropped without answering
        let state = settled.unwrap_or_else(|| *self.state.borrow());

        match state {
            RequestState::Settled(outcome) => outcome,
            RequestState::Pending => None,
        }
    }
}

struct PendingRequest {
    resolver: watch::Sender<RequestState>,
    request: TrustRequest,
}

/// The workspace trust request service
pub struct WorkspaceTrustRequests {
    manager: Arc<WorkspaceTrustManager>,
    dialogs: Arc<dyn DialogService>,
    storage: Arc<dyn Storage>,
    pending: Mutex<Option<PendingRequest>>,
    initiated: broadcast::Sender<Option<TrustRequestOptions>>,
}

impl WorkspaceTrustRequests {
    pub fn new(
        manager: Arc<WorkspaceTrustManager>,
        dialogs: Arc<dyn DialogService>,
        storage: Arc<dyn Storage>,
    ) -> Self {
        let (initiated, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            manager,
            dialogs,
            storage,
            pending: Mutex::new(None),
            initiated,
        }
    }

    pub fn is_trusted(&self) -> bool {
        self.manager.is_workspace_trusted()
    }

    /// Receive the options of every newly opened modal request
    pub fn subscribe_trust_requests(&self) -> broadcast::Receiver<Option<TrustRequestOptions>> {
        self.initiated.subscribe()
    }

    /// Open a modal request, or join the one already open.
    ///
    /// A trusted workspace gets an already settled request.
    pub fn begin_request(&self, options: Option<TrustRequestOptions>) -> TrustRequest {
        if self.is_trusted() {
            return TrustRequest::settled(Some(true));
        }

        let request = {
            let mut pending = lock(&self.pending);
            if let Some(existing) = pending.as_ref() {
                debug!("Joining the open trust request");
                return existing.request.clone();
            }

            let (resolver, state) = watch::channel(RequestState::Pending);
            let request = TrustRequest { state };
            *pending = Some(PendingRequest {
                resolver,
                request: request.clone(),
            });
            request
        };

        info!("Requesting workspace trust");
        let _ = self.initiated.send(options);
        request
    }

    /// Ask for trust and wait: `Some(trusted)`, or `None` when cancelled
    pub async fn request_workspace_trust(&self, options: Option<TrustRequestOptions>) -> Option<bool> {
        self.begin_request(options).outcome().await
    }

    /// Whether a modal request is open
    pub fn has_pending_request(&self) -> bool {
        lock(&self.pending).is_some()
    }

    /// Answer the open request. A decision that differs from the current
    /// trust is persisted first.
    pub async fn complete_request(&self, trusted: Option<bool>) -> Result<()> {
        let current = self.is_trusted();

        match trusted {
            Some(trusted) if trusted != current => {
                self.manager.set_workspace_trust(trusted).await?;
                self.resolve(RequestState::Settled(Some(trusted)));
            }
            _ => self.resolve(RequestState::Settled(Some(current))),
        }

        Ok(())
    }

    /// Dismiss the open request without a decision
    pub fn cancel_request(&self) {
        self.resolve(RequestState::Settled(None));
    }

    fn resolve(&self, state: RequestState) {
        if let Some(pending) = lock(&self.pending).take() {
            debug!("Trust request settled: {:?}", state);
            // Nobody waiting any more is fine
            let _ = pending.resolver.send(state);
        }
    }

    /// Decide whether files from outside the workspace may open here
    pub async fn request_open_uris(&self, uris: &[PathBuf]) -> Result<UriTrustResponse> {
        // Nothing to protect in a restricted workspace
        if !self.is_trusted() {
            return Ok(UriTrustResponse::Open);
        }

        let all_trusted = uris
            .iter()
            .all(|uri| self.manager.get_uri_trust_info(uri).trusted);
        if all_trusted {
            return Ok(UriTrustResponse::Open);
        }

        // Already asked in this workspace
        if self.manager.accepts_out_of_workspace_files() {
            return Ok(UriTrustResponse::Open);
        }

        if let Some(remembered) = self.remembered_choice() {
            return Ok(remembered);
        }

        let result = self
            .dialogs
            .show(open_files_prompt(self.manager.workbench_state()))
            .await
            .map_err(TrustError::Dialog)?;
        let remember = result.checkbox_checked.unwrap_or(false);

        let response = match result.choice {
            0 => {
                self.manager.set_accepts_out_of_workspace_files(true)?;
                UriTrustResponse::Open
            }
            1 => UriTrustResponse::OpenInNewWindow,
            _ => return Ok(UriTrustResponse::Cancel),
        };

        if remember {
            self.storage.store(
                WORKSPACE_TRUST_NON_WORKSPACE_FILES_DECISION_KEY,
                &response.code().to_string(),
                StorageScope::Global,
                StorageTarget::Machine,
            )?;
            info!("Remembered {:?} for files outside any workspace", response);
        }

        Ok(response)
    }

    /// Forget the remembered loose-file decision
    pub fn forget_open_uris_choice(&self) -> Result<()> {
        self.storage.remove(
            WORKSPACE_TRUST_NON_WORKSPACE_FILES_DECISION_KEY,
            StorageScope::Global,
        )?;
        Ok(())
    }

    fn remembered_choice(&self) -> Option<UriTrustResponse> {
        let raw = self.storage.get(
            WORKSPACE_TRUST_NON_WORKSPACE_FILES_DECISION_KEY,
            StorageScope::Global,
        )?;

        let choice = raw.trim().parse::<u8>().ok().and_then(UriTrustResponse::from_code);
        if choice.is_none() {
            warn!("Ignoring unreadable remembered choice {:?}", raw);
        }
        choice
    }
}

fn open_files_prompt(state: WorkbenchState) -> DialogPrompt {
    let context = if state == WorkbenchState::Empty {
        "You are trying to open untrusted files in a window which is trusted."
    } else {
        "You are trying to open untrusted files in a workspace which is trusted."
    };

    DialogPrompt {
        message: "Do you trust the authors of these files?".to_string(),
        details: vec![
            context.to_string(),
            "If you don't trust the authors of these files, we recommend to open them in a \
             new Restricted Mode window as the files may be malicious."
                .to_string(),
        ],
        buttons: vec![
            "Open".to_string(),
            "Open in New Restricted Mode Window".to_string(),
            "Cancel".to_string(),
        ],
        cancel_id: 2,
        checkbox: Some(DialogCheckbox {
            label: "Remember my decision for all workspaces".to_string(),
            checked: false,
        }),
    }
}
