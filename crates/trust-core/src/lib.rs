//! Trust Core - Shared functionality for the workspace trust tools
//!
//! Standard locations on disk plus the key-value storage the trust
//! subsystem persists into.

pub mod paths;
pub mod storage;

pub use paths::Paths;
pub use storage::{
    JsonFileStorage, MemoryStorage, Storage, StorageChange, StorageError, StorageScope,
    StorageTarget,
};
