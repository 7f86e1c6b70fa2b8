//! Trust transition participants
//!
//! Subsystems that must react to a trust flip before anyone else hears about
//! it register a participant. Participants run one at a time in registration
//! order, and the trust-changed notification only goes out once all of them
//! have finished.

use crate::error::{Result, TrustError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::debug;

/// Called with the new trust value whenever trust flips
#[async_trait]
pub trait TrustTransitionParticipant: Send + Sync {
    async fn participate(&self, trusted: bool) -> anyhow::Result<()>;
}

type Registry = Mutex<Vec<(u64, Arc<dyn TrustTransitionParticipant>)>>;

fn lock(registry: &Registry) -> MutexGuard<'_, Vec<(u64, Arc<dyn TrustTransitionParticipant>)>> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Keeps a participant registered until [`ParticipantHandle::release`].
///
/// Dropping the handle leaves the participant in place.
#[derive(Debug)]
pub struct ParticipantHandle {
    id: u64,
    registry: Weak<Registry>,
}

impl ParticipantHandle {
    /// Unregister the participant
    pub fn release(self) {
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).retain(|(id, _)| *id != self.id);
            debug!("Released trust participant {}", self.id);
        }
    }
}

/// Ordered registry of participants
#[derive(Default)]
pub struct TransitionCoordinator {
    participants: Arc<Registry>,
    next_id: AtomicU64,
}

impl TransitionCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_participant(&self, participant: Arc<dyn TrustTransitionParticipant>) -> ParticipantHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.participants).push((id, participant));

        ParticipantHandle {
            id,
            registry: Arc::downgrade(&self.participants),
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.participants).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Await every participant in order. The first failure stops the run.
    pub async fn participate(&self, trusted: bool) -> Result<()> {
        // Snapshot so participants may register or release while we await
        let participants: Vec<_> = lock(&self.participants)
            .iter()
            .map(|(_, participant)| Arc::clone(participant))
            .collect();

        for participant in participants {
            participant
                .participate(trusted)
                .await
                .map_err(TrustError::Participant)?;
        }

        Ok(())
    }

    /// Drop every participant
    pub fn clear(&self) {
        lock(&self.participants).clear();
    }
}

impl Drop for TransitionCoordinator {
    fn drop(&mut self) {
        self.clear();
    }
}
