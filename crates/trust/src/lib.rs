//! Workspace Trust - should the code in this folder be allowed to run?
//!
//! Opening a folder is not the same as trusting its authors. Tasks, debug
//! configurations, extensions and language servers all execute things the
//! folder provides. Until the user says otherwise a workspace runs in
//! Restricted Mode.
//!
//! Trust is granted per location on disk and inherited by everything below
//! it, so trusting `~/src` trusts every checkout in there. The most specific
//! stored location wins. A workspace with several roots is trusted only when
//! every root is.
//!
//! - [`store`]: the persisted table of trusted locations
//! - [`state`]: the per-workspace session flags
//! - [`evaluator`]: effective trust of the open workspace
//! - [`transition`]: participants awaited whenever trust flips
//! - [`management`]: the service tying the above together
//! - [`request`]: the user-consent protocol built on top

pub mod config;
pub mod error;
pub mod evaluator;
pub mod identity;
pub mod management;
pub mod request;
pub mod state;
pub mod store;
pub mod transition;
pub mod workspace;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{ConfigValue, ConfigurationService, TrustConfig};
pub use error::{Result, TrustError};
pub use evaluator::{Evaluation, Reason, TrustEvaluator};
pub use identity::{ExtPath, PathIdentity};
pub use management::{TrustContext, WorkspaceTrustManager};
pub use request::{
    DialogCheckbox, DialogPrompt, DialogResult, DialogService, TrustRequest,
    TrustRequestButton, TrustRequestButtonKind, TrustRequestOptions, UriTrustResponse,
    WorkspaceTrustRequests,
};
pub use state::WorkspaceTrustState;
pub use store::{TrustInfo, TrustStore, TrustUriInfo, TrustedPathEntry};
pub use transition::{ParticipantHandle, TransitionCoordinator, TrustTransitionParticipant};
pub use workspace::{StaticWorkspace, TrustEnvironment, WorkbenchState, Workspace, WorkspaceContext};
