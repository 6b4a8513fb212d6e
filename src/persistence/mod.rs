//! Persistence for the timeout registry
//!
//! State is kept in memory and written out as JSON files so a restart picks up
//! where the previous process left off.

pub mod file;
pub mod snapshot;

pub use file::FileBackend;
pub use snapshot::{RestoreSummary, SnapshotStore};

/// Trait for persistence backends
pub trait PersistenceBackend: Send + Sync {
    /// Replace the blob stored under `key`
    fn write(&self, key: &str, data: &[u8]) -> Result<(), PersistenceError>;

    /// Read the blob stored under `key`, `None` if absent
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, PersistenceError>;
}

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),
}
