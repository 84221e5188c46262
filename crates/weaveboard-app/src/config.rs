//! Controller configuration.

use kurbo::Size;
use peniko::Color;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use weaveboard_core::history::DEFAULT_HISTORY_CAPACITY;
use weaveboard_core::storage::DEFAULT_SAVE_DEBOUNCE_MS;
use weaveboard_core::viewport::{DEFAULT_MAX_ZOOM, DEFAULT_MIN_ZOOM, DEFAULT_VIEWPORT_SIZE};

/// Controller configuration.
///
/// Every field is optional in JSON; missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Key under which view state is persisted.
    pub document_id: String,
    pub min_zoom: f64,
    pub max_zoom: f64,
    /// Undo/redo entries kept per stack.
    pub history_capacity: usize,
    /// Quiet period before view state is written.
    pub save_debounce_ms: u64,
    pub viewport_width: f64,
    pub viewport_height: f64,
    /// Selection overlay color as RGBA bytes.
    pub selection_color: [u8; 4],
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            document_id: "untitled".to_string(),
            min_zoom: DEFAULT_MIN_ZOOM,
            max_zoom: DEFAULT_MAX_ZOOM,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            save_debounce_ms: DEFAULT_SAVE_DEBOUNCE_MS,
            viewport_width: DEFAULT_VIEWPORT_SIZE.width,
            viewport_height: DEFAULT_VIEWPORT_SIZE.height,
            selection_color: [59, 130, 246, 255],
        }
    }
}

impl ControllerConfig {
    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize the configuration to pretty JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn with_document_id(mut self, id: impl Into<String>) -> Self {
        self.document_id = id.into();
        self
    }

    pub fn viewport_size(&self) -> Size {
        Size::new(self.viewport_width, self.viewport_height)
    }

    pub fn save_debounce(&self) -> Duration {
        Duration::from_millis(self.save_debounce_ms)
    }

    pub fn selection_color(&self) -> Color {
        let [r, g, b, a] = self.selection_color;
        Color::from_rgba8(r, g, b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = ControllerConfig::from_json(r#"{"document_id": "board-7", "max_zoom": 4.0}"#)
            .expect("valid config");

        assert_eq!(config.document_id, "board-7");
        assert_eq!(config.max_zoom, 4.0);
        assert_eq!(config.min_zoom, DEFAULT_MIN_ZOOM);
        assert_eq!(config.history_capacity, DEFAULT_HISTORY_CAPACITY);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = ControllerConfig::default().with_document_id("doc");
        let parsed = ControllerConfig::from_json(&config.to_json().expect("serialize")).expect("parse");
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(ControllerConfig::from_json("{ not json").is_err());
        assert!(ControllerConfig::from_json(r#"{"history_capacity": "lots"}"#).is_err());
    }
}
