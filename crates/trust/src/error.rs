//! Errors raised by the trust subsystem

use thiserror::Error;
use trust_core::StorageError;

/// Trust-specific errors
#[derive(Error, Debug)]
pub enum TrustError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Failed to serialize trust data: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Trust transition participant failed: {0}")]
    Participant(#[source] anyhow::Error),

    #[error("Trust dialog failed: {0}")]
    Dialog(#[source] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, TrustError>;
