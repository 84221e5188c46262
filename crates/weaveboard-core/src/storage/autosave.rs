//! Debounced view-state persistence.
//!
//! Pan and zoom gestures change the view many times per second; the store is
//! only written once the view has been still for the debounce interval.

use super::{StorageResult, ViewStateStore};
use crate::viewport::ViewState;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Default quiet period before a dirty view state is written.
pub const DEFAULT_SAVE_DEBOUNCE_MS: u64 = 500;

/// Trailing-edge debounced writer for one document's view state.
pub struct ViewStateAutoSave {
    store: Rc<dyn ViewStateStore>,
    key: String,
    debounce: Duration,
    /// Time of the most recent unsaved change.
    dirty_since: Option<Instant>,
    last_save: Option<Instant>,
}

impl ViewStateAutoSave {
    pub fn new(store: Rc<dyn ViewStateStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            debounce: Duration::from_millis(DEFAULT_SAVE_DEBOUNCE_MS),
            dirty_since: None,
            last_save: None,
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn store(&self) -> &Rc<dyn ViewStateStore> {
        &self.store
    }

    /// Record a view change. Each call restarts the quiet period.
    pub fn mark_dirty(&mut self, now: Instant) {
        self.dirty_since = Some(now);
    }

    /// Forget pending changes, e.g. after loading the stored state.
    pub fn mark_clean(&mut self) {
        self.dirty_since = None;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty_since.is_some()
    }

    pub fn last_save(&self) -> Option<Instant> {
        self.last_save
    }

    /// Check if the view has been still long enough to save.
    pub fn should_save(&self, now: Instant) -> bool {
        match self.dirty_since {
            Some(changed) => now.saturating_duration_since(changed) >= self.debounce,
            None => false,
        }
    }

    /// Save if dirty and the quiet period has elapsed.
    /// Returns true if a save was performed.
    pub fn maybe_save(&mut self, now: Instant, state: &ViewState) -> bool {
        if !self.should_save(now) {
            return false;
        }
        self.write(now, state)
    }

    /// Save immediately if anything is pending.
    pub fn flush(&mut self, state: &ViewState) -> bool {
        if !self.is_dirty() {
            return false;
        }
        self.write(Instant::now(), state)
    }

    /// Force a save regardless of the dirty flag.
    pub fn save(&mut self, state: &ViewState) -> StorageResult<()> {
        self.store.save(&self.key, state)?;
        self.dirty_since = None;
        self.last_save = Some(Instant::now());
        Ok(())
    }

    fn write(&mut self, now: Instant, state: &ViewState) -> bool {
        match self.store.save(&self.key, state) {
            Ok(()) => {
                log::debug!("Saved view state for {}", self.key);
                self.dirty_since = None;
                self.last_save = Some(now);
                true
            }
            Err(e) => {
                // Stays dirty so the next frame retries.
                log::warn!("Failed to save view state for {}: {}", self.key, e);
                false
            }
        }
    }
}
