//! Test doubles shared by the unit tests

use crate::config::TrustConfig;
use crate::identity::ExtPath;
use crate::management::{TrustContext, WorkspaceTrustManager};
use crate::request::{DialogPrompt, DialogResult, DialogService};
use crate::transition::TrustTransitionParticipant;
use crate::workspace::{StaticWorkspace, TrustEnvironment, Workspace};
use anyhow::bail;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use trust_core::MemoryStorage;

/// Appends `name:trusted` to a shared log, optionally failing afterwards
pub struct RecordingParticipant {
    name: &'static str,
    log: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

impl RecordingParticipant {
    pub fn named(name: &'static str, log: Arc<Mutex<Vec<String>>>) -> Self {
        Self { name, log, fail: false }
    }

    pub fn failing(name: &'static str, log: Arc<Mutex<Vec<String>>>) -> Self {
        Self { name, log, fail: true }
    }
}

#[async_trait]
impl TrustTransitionParticipant for RecordingParticipant {
    async fn participate(&self, trusted: bool) -> anyhow::Result<()> {
        self.log.lock().unwrap().push(format!("{}:{}", self.name, trusted));
        tokio::task::yield_now().await;

        if self.fail {
            bail!("{} refused the transition", self.name);
        }
        Ok(())
    }
}

/// Answers prompts from a queue and remembers what it was shown
#[derive(Default)]
pub struct ScriptedDialog {
    answers: Mutex<VecDeque<DialogResult>>,
    shown: Mutex<Vec<DialogPrompt>>,
}

impl ScriptedDialog {
    pub fn answering(answers: Vec<DialogResult>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            shown: Mutex::new(Vec::new()),
        }
    }

    pub fn shown(&self) -> Vec<DialogPrompt> {
        self.shown.lock().unwrap().clone()
    }
}

#[async_trait]
impl DialogService for ScriptedDialog {
    async fn show(&self, prompt: DialogPrompt) -> anyhow::Result<DialogResult> {
        self.shown.lock().unwrap().push(prompt);
        match self.answers.lock().unwrap().pop_front() {
            Some(answer) => Ok(answer),
            None => bail!("no scripted answer left"),
        }
    }
}

pub fn context_with(storage: Arc<MemoryStorage>, workspace: Workspace) -> TrustContext {
    TrustContext {
        config: Arc::new(TrustConfig::default()),
        environment: TrustEnvironment::new("/data/Workspaces"),
        storage,
        identity: Arc::new(ExtPath::case_sensitive()),
        workspace: Arc::new(StaticWorkspace::new(workspace)),
    }
}

/// A manager over fresh in-memory storage, plus handles to poke its inputs
pub fn manager_for(
    workspace: Workspace,
) -> (WorkspaceTrustManager, Arc<MemoryStorage>, Arc<StaticWorkspace>) {
    let storage = Arc::new(MemoryStorage::new());
    let topology = Arc::new(StaticWorkspace::new(workspace));

    let context = TrustContext {
        workspace: topology.clone(),
        ..context_with(storage.clone(), Workspace::empty())
    };

    let manager = WorkspaceTrustManager::new(context).unwrap();
    (manager, storage, topology)
}
