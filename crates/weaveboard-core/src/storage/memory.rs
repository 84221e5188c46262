//! In-memory view-state store.

use super::{StorageError, StorageResult, ViewStateStore};
use crate::viewport::ViewState;
use std::cell::RefCell;
use std::collections::HashMap;

/// In-memory store for testing and ephemeral use.
///
/// Entries are kept as JSON text so loading goes through the same lenient
/// parser as the file store.
#[derive(Debug, Default)]
pub struct MemoryViewStateStore {
    entries: RefCell<HashMap<String, String>>,
}

impl MemoryViewStateStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store raw text under a key, bypassing serialization.
    pub fn insert_raw(&self, key: &str, text: impl Into<String>) {
        self.entries.borrow_mut().insert(key.to_string(), text.into());
    }

    /// Raw text stored under a key.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl ViewStateStore for MemoryViewStateStore {
    fn load(&self, key: &str) -> Option<ViewState> {
        let entries = self.entries.borrow();
        let text = entries.get(key)?;
        let state = ViewState::from_json_lenient(text);
        if state.is_none() {
            log::warn!("Discarding unreadable view state for {}", key);
        }
        state
    }

    fn save(&self, key: &str, state: &ViewState) -> StorageResult<()> {
        let json = state
            .to_json()
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.entries.borrow_mut().insert(key.to_string(), json);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load() {
        let store = MemoryViewStateStore::new();
        let state = ViewState::new(2.0, 10.0, -5.0);

        store.save("doc", &state).expect("save");
        assert_eq!(store.load("doc"), Some(state));
        assert!(store.load("other").is_none());
    }

    #[test]
    fn test_garbage_is_ignored() {
        let store = MemoryViewStateStore::new();
        store.insert_raw("doc", "{{{ not json");
        assert!(store.load("doc").is_none());
    }

    #[test]
    fn test_persisted_layout() {
        let store = MemoryViewStateStore::new();
        store.save("doc", &ViewState::new(1.5, 3.0, 4.0)).expect("save");

        let raw: serde_json::Value = serde_json::from_str(&store.raw("doc").expect("stored")).expect("json");
        assert_eq!(raw["scale"], 1.5);
        assert_eq!(raw["translateX"], 3.0);
        assert_eq!(raw["translateY"], 4.0);
    }
}
