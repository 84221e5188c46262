//! File-based view-state store for native platforms.

use super::{StorageError, StorageResult, ViewStateStore};
use crate::viewport::ViewState;
use std::fs;
use std::path::{Path, PathBuf};

/// Stores each document's view state as a small JSON file.
pub struct FileViewStateStore {
    /// Directory holding the view-state files.
    base_path: PathBuf,
}

impl FileViewStateStore {
    /// Create a file store rooted at the given directory.
    ///
    /// Creates the directory if it doesn't exist.
    pub fn new(base_path: PathBuf) -> StorageResult<Self> {
        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(|e| {
                StorageError::Io(format!("Failed to create view-state directory: {}", e))
            })?;
        }
        Ok(Self { base_path })
    }

    /// Create the store in the default location.
    ///
    /// On Linux: `~/.local/share/weaveboard/view-state/`
    /// On Windows: `%LOCALAPPDATA%\weaveboard\view-state\`
    pub fn default_location() -> StorageResult<Self> {
        let base = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| StorageError::Io("Could not determine home directory".to_string()))?;

        Self::new(base.join("weaveboard").join("view-state"))
    }

    /// File path for a document key.
    fn state_path(&self, key: &str) -> PathBuf {
        // Sanitize the key to be safe for filenames
        let safe_key: String = key
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.base_path.join(format!("{}.json", safe_key))
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Remove the stored view state for a key, if any.
    pub fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.state_path(key);
        if path.exists() {
            fs::remove_file(&path).map_err(|e| {
                StorageError::Io(format!("Failed to delete {}: {}", path.display(), e))
            })?;
        }
        Ok(())
    }
}

impl ViewStateStore for FileViewStateStore {
    fn load(&self, key: &str) -> Option<ViewState> {
        let path = self.state_path(key);
        if !path.exists() {
            return None;
        }

        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                log::warn!("Failed to read {}: {}", path.display(), e);
                return None;
            }
        };

        let state = ViewState::from_json_lenient(&text);
        if state.is_none() {
            log::warn!("Discarding unreadable view state in {}", path.display());
        }
        state
    }

    fn save(&self, key: &str, state: &ViewState) -> StorageResult<()> {
        let path = self.state_path(key);
        let json = state
            .to_json()
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        fs::write(&path, json)
            .map_err(|e| StorageError::Io(format!("Failed to write {}: {}", path.display(), e)))
    }
}
