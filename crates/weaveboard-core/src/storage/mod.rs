//! Local persistence for per-document view state.

mod autosave;
mod file;
mod memory;

pub use autosave::{DEFAULT_SAVE_DEBOUNCE_MS, ViewStateAutoSave};
pub use file::FileViewStateStore;
pub use memory::MemoryViewStateStore;

use crate::viewport::ViewState;
use thiserror::Error;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// A key/value store for view state, keyed by document id.
///
/// Loading is best-effort: a missing entry or one that is not a JSON object
/// yields `None`, and individual malformed fields fall back to their defaults.
pub trait ViewStateStore {
    /// Load the stored view state for a document.
    fn load(&self, key: &str) -> Option<ViewState>;

    /// Persist view state for a document.
    fn save(&self, key: &str, state: &ViewState) -> StorageResult<()>;
}
