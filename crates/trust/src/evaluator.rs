//! Trust evaluation
//!
//! Effective trust of the open workspace, computed from the settings, the
//! workspace topology, the session flag and the trusted location table.
//! Evaluation has no side effects.

use crate::config::{is_workspace_trust_enabled, ConfigurationService};
use crate::identity::PathIdentity;
use crate::store::TrustStore;
use crate::workspace::{TrustEnvironment, WorkbenchState, WorkspaceContext};
use std::path::PathBuf;

/// Outcome of an evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub trusted: bool,
    pub reason: Reason,
}

/// Why the workspace got the trust it got
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reason {
    /// Workspace trust is turned off
    FeatureDisabled,
    /// Running extension tests
    ExtensionTests,
    /// No folder open, the session flag decides
    EmptyWindow,
    /// Every workspace location is trusted
    AllLocationsTrusted,
    /// This location has no trusted entry at or above it
    UntrustedLocation(PathBuf),
}

/// Evaluates trust for the current workspace
pub struct TrustEvaluator<'a> {
    config: &'a dyn ConfigurationService,
    environment: &'a TrustEnvironment,
    workspace: &'a dyn WorkspaceContext,
    identity: &'a dyn PathIdentity,
}

impl<'a> TrustEvaluator<'a> {
    pub fn new(
        config: &'a dyn ConfigurationService,
        environment: &'a TrustEnvironment,
        workspace: &'a dyn WorkspaceContext,
        identity: &'a dyn PathIdentity,
    ) -> Self {
        Self {
            config,
            environment,
            workspace,
            identity,
        }
    }

    /// Every folder, plus the workspace file unless it is untitled
    pub fn workspace_locations(&self) -> Vec<PathBuf> {
        let workspace = self.workspace.workspace();
        let mut locations = workspace.folders;

        if let Some(configuration) = workspace.configuration {
            if !self
                .environment
                .is_untitled_workspace(&configuration, self.identity)
            {
                locations.push(configuration);
            }
        }

        locations
    }

    /// Evaluate against the stored table and the recorded session flag
    pub fn evaluate(&self, store: &TrustStore, session_trust: Option<bool>) -> Evaluation {
        if !is_workspace_trust_enabled(self.config) {
            return Evaluation {
                trusted: true,
                reason: Reason::FeatureDisabled,
            };
        }

        if self.environment.extension_tests_location.is_some() {
            return Evaluation {
                trusted: true,
                reason: Reason::ExtensionTests,
            };
        }

        if self.workspace.workbench_state() == WorkbenchState::Empty {
            // Restricted until something trusts the window
            return Evaluation {
                trusted: session_trust.unwrap_or(false),
                reason: Reason::EmptyWindow,
            };
        }

        for location in self.workspace_locations() {
            if !store.lookup(&location).trusted {
                return Evaluation {
                    trusted: false,
                    reason: Reason::UntrustedLocation(location),
                };
            }
        }

        Evaluation {
            trusted: true,
            reason: Reason::AllLocationsTrusted,
        }
    }
}
