//! Viewport module for pan/zoom transforms and persisted view state.

use crate::document::DocumentHandle;
use crate::element::ElementId;
use crate::notify::{Subscribers, Subscription};
use crate::storage::{StorageResult, ViewStateStore};
use kurbo::{Affine, Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default minimum zoom level.
pub const DEFAULT_MIN_ZOOM: f64 = 0.1;
/// Default maximum zoom level.
pub const DEFAULT_MAX_ZOOM: f64 = 10.0;
/// Screen size assumed until the host reports one.
pub const DEFAULT_VIEWPORT_SIZE: Size = Size::new(1280.0, 720.0);

/// Scale and screen-space translation of the canvas.
///
/// Serialized as `{ "scale", "translateX", "translateY" }`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    pub scale: f64,
    pub translate_x: f64,
    pub translate_y: f64,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            scale: 1.0,
            translate_x: 0.0,
            translate_y: 0.0,
        }
    }
}

impl ViewState {
    pub fn new(scale: f64, translate_x: f64, translate_y: f64) -> Self {
        Self {
            scale,
            translate_x,
            translate_y,
        }
    }

    pub fn translation(&self) -> Vec2 {
        Vec2::new(self.translate_x, self.translate_y)
    }

    /// Forward transform: canvas coordinates to screen coordinates.
    pub fn transform(&self) -> Affine {
        Affine::translate(self.translation()) * Affine::scale(self.scale)
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse stored view state field by field.
    ///
    /// Returns `None` if the text is not a JSON object. A missing, non-numeric
    /// or out-of-domain field takes its default; the rest are kept.
    pub fn from_json_lenient(text: &str) -> Option<Self> {
        let value: serde_json::Value = serde_json::from_str(text).ok()?;
        let object = value.as_object()?;
        let defaults = Self::default();

        let field = |key: &str| object.get(key).and_then(|v| v.as_f64()).filter(|v| v.is_finite());

        Some(Self {
            scale: field("scale").filter(|s| *s > 0.0).unwrap_or(defaults.scale),
            translate_x: field("translateX").unwrap_or(defaults.translate_x),
            translate_y: field("translateY").unwrap_or(defaults.translate_y),
        })
    }
}

/// Published whenever the view transform is (re)applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformChanged {
    pub view: ViewState,
    pub transform: Affine,
}

/// Viewport errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ViewportError {
    #[error("Invalid view state: {0}")]
    InvalidState(String),
    #[error("Invalid zoom bounds: min {min}, max {max}")]
    InvalidBounds { min: f64, max: f64 },
}

/// Viewport manages the view transform for the canvas.
///
/// It converts between screen coordinates (pixels) and canvas coordinates
/// (document space). Every accepted change publishes a [`TransformChanged`].
pub struct Viewport {
    document: DocumentHandle,
    state: ViewState,
    min_zoom: f64,
    max_zoom: f64,
    size: Size,
    listeners: Subscribers<TransformChanged>,
}

impl Viewport {
    /// Create a viewport with default view state and zoom bounds.
    pub fn new(document: DocumentHandle) -> Self {
        Self {
            document,
            state: ViewState::default(),
            min_zoom: DEFAULT_MIN_ZOOM,
            max_zoom: DEFAULT_MAX_ZOOM,
            size: DEFAULT_VIEWPORT_SIZE,
            listeners: Subscribers::new(),
        }
    }

    /// Replace the zoom bounds. The current scale is clamped into them.
    pub fn with_zoom_bounds(mut self, min_zoom: f64, max_zoom: f64) -> Result<Self, ViewportError> {
        if !(min_zoom.is_finite() && max_zoom.is_finite()) || min_zoom <= 0.0 || min_zoom > max_zoom {
            return Err(ViewportError::InvalidBounds {
                min: min_zoom,
                max: max_zoom,
            });
        }
        self.min_zoom = min_zoom;
        self.max_zoom = max_zoom;
        self.state.scale = self.state.scale.clamp(min_zoom, max_zoom);
        Ok(self)
    }

    pub fn zoom_bounds(&self) -> (f64, f64) {
        (self.min_zoom, self.max_zoom)
    }

    /// Current scale and translation.
    pub fn view_state(&self) -> ViewState {
        self.state
    }

    /// Replace the view state after validating it.
    pub fn set_view_state(&mut self, state: ViewState) -> Result<(), ViewportError> {
        self.validate(&state)?;
        self.state = state;
        self.update_transform();
        Ok(())
    }

    fn validate(&self, state: &ViewState) -> Result<(), ViewportError> {
        if !state.scale.is_finite() || state.scale <= 0.0 {
            return Err(ViewportError::InvalidState(format!(
                "scale must be positive and finite, got {}",
                state.scale
            )));
        }
        if state.scale < self.min_zoom || state.scale > self.max_zoom {
            return Err(ViewportError::InvalidState(format!(
                "scale {} outside [{}, {}]",
                state.scale, self.min_zoom, self.max_zoom
            )));
        }
        if !state.translate_x.is_finite() || !state.translate_y.is_finite() {
            return Err(ViewportError::InvalidState("translation must be finite".to_string()));
        }
        Ok(())
    }

    /// Get the affine transform for rendering.
    ///
    /// This transform converts canvas coordinates to screen coordinates.
    pub fn transform(&self) -> Affine {
        self.state.transform()
    }

    /// Get the inverse transform for input handling.
    ///
    /// This transform converts screen coordinates to canvas coordinates.
    pub fn inverse_transform(&self) -> Affine {
        Affine::scale(1.0 / self.state.scale) * Affine::translate(-self.state.translation())
    }

    /// Convert a screen point to canvas coordinates.
    pub fn screen_to_canvas(&self, screen_point: Point) -> Point {
        Point::new(
            (screen_point.x - self.state.translate_x) / self.state.scale,
            (screen_point.y - self.state.translate_y) / self.state.scale,
        )
    }

    /// Convert a canvas point to screen coordinates.
    pub fn canvas_to_screen(&self, canvas_point: Point) -> Point {
        Point::new(
            canvas_point.x * self.state.scale + self.state.translate_x,
            canvas_point.y * self.state.scale + self.state.translate_y,
        )
    }

    /// Pan by a delta in screen pixels.
    pub fn pan(&mut self, delta: Vec2) -> Result<(), ViewportError> {
        let next = ViewState {
            translate_x: self.state.translate_x + delta.x,
            translate_y: self.state.translate_y + delta.y,
            ..self.state
        };
        self.set_view_state(next)
    }

    /// Zoom by `factor`, keeping the given screen point fixed.
    ///
    /// The resulting scale is clamped to the zoom bounds. Returns false if the
    /// scale did not change.
    pub fn zoom_at(&mut self, screen_point: Point, factor: f64) -> Result<bool, ViewportError> {
        if !factor.is_finite() || factor <= 0.0 {
            return Err(ViewportError::InvalidState(format!("zoom factor {} is not positive", factor)));
        }
        if !screen_point.is_finite() {
            return Err(ViewportError::InvalidState("zoom anchor must be finite".to_string()));
        }

        let new_scale = (self.state.scale * factor).clamp(self.min_zoom, self.max_zoom);
        if (new_scale - self.state.scale).abs() < f64::EPSILON {
            return Ok(false);
        }

        // Canvas point under the cursor must stay under the cursor
        let anchor = self.screen_to_canvas(screen_point);
        let next = ViewState {
            scale: new_scale,
            translate_x: screen_point.x - anchor.x * new_scale,
            translate_y: screen_point.y - anchor.y * new_scale,
        };
        self.set_view_state(next)?;
        Ok(true)
    }

    /// Fit the view to show the given canvas rectangle.
    pub fn fit_to_bounds(&mut self, bounds: Rect, padding: f64) -> Result<(), ViewportError> {
        if bounds.is_zero_area() || !bounds.is_finite() {
            let scale = 1.0_f64.clamp(self.min_zoom, self.max_zoom);
            return self.center_on(bounds.center(), scale);
        }

        let padded = Size::new(
            (self.size.width - padding * 2.0).max(1.0),
            (self.size.height - padding * 2.0).max(1.0),
        );
        let scale_x = padded.width / bounds.width();
        let scale_y = padded.height / bounds.height();
        let scale = scale_x.min(scale_y).clamp(self.min_zoom, self.max_zoom);

        self.center_on(bounds.center(), scale)
    }

    /// Translate so the element's bounding-box center sits at the viewport
    /// center, keeping the current scale.
    ///
    /// An unknown id is a logged no-op; the element may have been deleted by
    /// a collaborator. Returns whether the view moved.
    pub fn recenter_on_element(&mut self, id: ElementId) -> bool {
        let Some(element) = self.document.get(id) else {
            log::info!("Cannot recenter on missing element {}", id);
            return false;
        };
        match self.center_on(element.bounds().center(), self.state.scale) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Cannot recenter on element {}: {}", id, e);
                false
            }
        }
    }

    fn center_on(&mut self, canvas_point: Point, scale: f64) -> Result<(), ViewportError> {
        let center = self.viewport_center();
        self.set_view_state(ViewState {
            scale,
            translate_x: center.x - canvas_point.x * scale,
            translate_y: center.y - canvas_point.y * scale,
        })
    }

    /// Update the on-screen size of the canvas surface.
    pub fn set_viewport_size(&mut self, size: Size) {
        if !(size.width.is_finite() && size.height.is_finite()) || size.width <= 0.0 || size.height <= 0.0 {
            log::warn!("Ignoring invalid viewport size {:?}", size);
            return;
        }
        self.size = size;
    }

    pub fn viewport_size(&self) -> Size {
        self.size
    }

    pub fn viewport_center(&self) -> Point {
        Point::new(self.size.width / 2.0, self.size.height / 2.0)
    }

    /// The canvas-space rectangle currently on screen.
    pub fn visible_canvas_rect(&self) -> Rect {
        Rect::from_points(
            self.screen_to_canvas(Point::ZERO),
            self.screen_to_canvas(Point::new(self.size.width, self.size.height)),
        )
    }

    /// Load persisted view state, falling back to defaults.
    ///
    /// A stored scale outside the zoom bounds is clamped into them. The loaded
    /// state is applied and published.
    pub fn load_local_view_state(&mut self, store: &dyn ViewStateStore, key: &str) -> ViewState {
        let loaded = match store.load(key) {
            Some(state) => state,
            None => {
                log::debug!("No stored view state for {}, using defaults", key);
                ViewState::default()
            }
        };
        let state = ViewState {
            scale: loaded.scale.clamp(self.min_zoom, self.max_zoom),
            ..loaded
        };

        if let Err(e) = self.set_view_state(state) {
            log::warn!("Stored view state for {} rejected: {}", key, e);
            self.state = ViewState {
                scale: 1.0_f64.clamp(self.min_zoom, self.max_zoom),
                ..ViewState::default()
            };
            self.update_transform();
        }
        self.state
    }

    /// Persist the current view state.
    pub fn save_local_view_state(&self, store: &dyn ViewStateStore, key: &str) -> StorageResult<()> {
        store.save(key, &self.state)
    }

    /// Publish the current transform.
    ///
    /// Idempotent: calling it again only repeats the notification.
    pub fn update_transform(&self) {
        self.listeners.emit(&TransformChanged {
            view: self.state,
            transform: self.transform(),
        });
    }

    /// Listen for transform changes.
    pub fn subscribe(&self, listener: impl FnMut(&TransformChanged) + 'static) -> Subscription {
        self.listeners.subscribe(listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crdt::CrdtDocument;
    use crate::document::{DocumentAccessor, Mutation};
    use crate::element::Element;
    use crate::storage::MemoryViewStateStore;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn viewport() -> (Rc<CrdtDocument>, Viewport) {
        let doc = Rc::new(CrdtDocument::new());
        let handle: DocumentHandle = doc.clone();
        (doc, Viewport::new(handle))
    }

    fn assert_point_eq(a: Point, b: Point) {
        assert!((a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9, "{:?} != {:?}", a, b);
    }

    #[test]
    fn test_default_view_state() {
        let (_doc, viewport) = viewport();
        assert_eq!(viewport.view_state(), ViewState::new(1.0, 0.0, 0.0));
        assert_point_eq(viewport.screen_to_canvas(Point::new(100.0, 200.0)), Point::new(100.0, 200.0));
    }

    #[test]
    fn test_screen_to_canvas_scenario() {
        let (_doc, mut viewport) = viewport();
        viewport.set_view_state(ViewState::new(2.0, 100.0, 50.0)).expect("valid");

        assert_point_eq(viewport.screen_to_canvas(Point::new(300.0, 150.0)), Point::new(100.0, 50.0));
    }

    #[test]
    fn test_roundtrip_conversion() {
        let (_doc, mut viewport) = viewport();
        for state in [
            ViewState::new(1.5, 30.0, -20.0),
            ViewState::new(0.1, -1e4, 3.25),
            ViewState::new(7.3, 0.5, 999.0),
        ] {
            viewport.set_view_state(state).expect("valid");
            let original = Point::new(123.0, -456.0);
            assert_point_eq(viewport.screen_to_canvas(viewport.canvas_to_screen(original)), original);
        }
    }

    #[test]
    fn test_transform_matches_conversion() {
        let (_doc, mut viewport) = viewport();
        viewport.set_view_state(ViewState::new(2.5, 12.0, -8.0)).expect("valid");
        let p = Point::new(40.0, 60.0);

        assert_point_eq(viewport.transform() * p, viewport.canvas_to_screen(p));
        assert_point_eq(viewport.inverse_transform() * p, viewport.screen_to_canvas(p));
    }

    #[test]
    fn test_set_view_state_rejects_invalid() {
        let (_doc, mut viewport) = viewport();
        for bad in [
            ViewState::new(0.0, 0.0, 0.0),
            ViewState::new(-1.0, 0.0, 0.0),
            ViewState::new(f64::NAN, 0.0, 0.0),
            ViewState::new(50.0, 0.0, 0.0),
            ViewState::new(1.0, f64::INFINITY, 0.0),
        ] {
            assert!(matches!(viewport.set_view_state(bad), Err(ViewportError::InvalidState(_))));
        }
        assert_eq!(viewport.view_state(), ViewState::default());
    }

    #[test]
    fn test_set_view_state_notifies() {
        let (_doc, mut viewport) = viewport();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let _sub = viewport.subscribe(move |event: &TransformChanged| sink.borrow_mut().push(event.view));

        viewport.set_view_state(ViewState::new(2.0, 1.0, 1.0)).expect("valid");
        viewport.update_transform();
        let _ = viewport.set_view_state(ViewState::new(0.0, 0.0, 0.0));

        assert_eq!(*seen.borrow(), vec![ViewState::new(2.0, 1.0, 1.0); 2]);
    }

    #[test]
    fn test_zoom_at_keeps_anchor_fixed() {
        let (_doc, mut viewport) = viewport();
        let anchor = Point::new(400.0, 300.0);
        let before = viewport.screen_to_canvas(anchor);

        assert!(viewport.zoom_at(anchor, 2.0).expect("zoom"));
        assert_point_eq(viewport.screen_to_canvas(anchor), before);
        assert!((viewport.view_state().scale - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zoom_clamp() {
        let (_doc, mut viewport) = viewport();
        viewport.zoom_at(Point::ZERO, 0.001).expect("zoom out");
        assert!((viewport.view_state().scale - DEFAULT_MIN_ZOOM).abs() < f64::EPSILON);

        viewport.zoom_at(Point::ZERO, 1e6).expect("zoom in");
        assert!((viewport.view_state().scale - DEFAULT_MAX_ZOOM).abs() < f64::EPSILON);
        assert!(!viewport.zoom_at(Point::ZERO, 2.0).expect("already at max"));
        assert!(viewport.zoom_at(Point::ZERO, 0.0).is_err());
    }

    #[test]
    fn test_pan() {
        let (_doc, mut viewport) = viewport();
        viewport.pan(Vec2::new(10.0, 20.0)).expect("pan");
        assert_eq!(viewport.view_state(), ViewState::new(1.0, 10.0, 20.0));
    }

    #[test]
    fn test_recenter_on_element() {
        let (doc, mut viewport) = viewport();
        viewport.set_viewport_size(Size::new(800.0, 600.0));
        viewport.set_view_state(ViewState::new(2.0, 0.0, 0.0)).expect("valid");
        let element = Element::new("card", Point::new(100.0, 100.0), Size::new(50.0, 50.0));
        doc.commit(Mutation::new().upsert_element(element.clone())).expect("commit");

        assert!(viewport.recenter_on_element(element.id));
        assert_point_eq(viewport.canvas_to_screen(element.center()), Point::new(400.0, 300.0));
        assert!((viewport.view_state().scale - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_recenter_on_missing_element_is_noop() {
        let (_doc, mut viewport) = viewport();
        let before = viewport.view_state();
        assert!(!viewport.recenter_on_element(uuid::Uuid::new_v4()));
        assert_eq!(viewport.view_state(), before);
    }

    #[test]
    fn test_fit_to_bounds() {
        let (_doc, mut viewport) = viewport();
        viewport.set_viewport_size(Size::new(800.0, 600.0));
        viewport.fit_to_bounds(Rect::new(0.0, 0.0, 400.0, 100.0), 0.0).expect("fit");

        assert!((viewport.view_state().scale - 2.0).abs() < 1e-9);
        let visible = viewport.visible_canvas_rect();
        assert!((visible.center().x - 200.0).abs() < 1e-9);
        assert!((visible.center().y - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_with_zoom_bounds() {
        let (doc, _) = viewport();
        let handle: DocumentHandle = doc;
        assert!(Viewport::new(handle.clone()).with_zoom_bounds(2.0, 1.0).is_err());
        assert!(Viewport::new(handle.clone()).with_zoom_bounds(0.0, 1.0).is_err());

        let viewport = Viewport::new(handle).with_zoom_bounds(2.0, 4.0).expect("bounds");
        assert!((viewport.view_state().scale - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_lenient_parse() {
        assert_eq!(
            ViewState::from_json_lenient(r#"{"scale": 2, "translateX": 5.5, "translateY": -1}"#),
            Some(ViewState::new(2.0, 5.5, -1.0))
        );
        assert_eq!(
            ViewState::from_json_lenient(r#"{"scale": -3, "translateX": "x"}"#),
            Some(ViewState::default())
        );
        assert_eq!(ViewState::from_json_lenient("[1, 2, 3]"), None);
        assert_eq!(ViewState::from_json_lenient("garbage"), None);
    }

    #[test]
    fn test_load_and_save_local_view_state() {
        let (_doc, mut viewport) = viewport();
        let store = MemoryViewStateStore::new();

        assert_eq!(viewport.load_local_view_state(&store, "doc"), ViewState::default());

        viewport.set_view_state(ViewState::new(3.0, 7.0, 9.0)).expect("valid");
        viewport.save_local_view_state(&store, "doc").expect("save");

        let (_doc, mut other) = self::viewport();
        assert_eq!(other.load_local_view_state(&store, "doc"), ViewState::new(3.0, 7.0, 9.0));
    }

    #[test]
    fn test_load_clamps_and_recovers_from_corruption() {
        let (_doc, mut viewport) = viewport();
        let store = MemoryViewStateStore::new();

        store.insert_raw("zoomed", r#"{"scale": 500, "translateX": 1, "translateY": 2}"#);
        assert_eq!(
            viewport.load_local_view_state(&store, "zoomed"),
            ViewState::new(DEFAULT_MAX_ZOOM, 1.0, 2.0)
        );

        store.insert_raw("corrupt", "\u{0}\u{1}");
        assert_eq!(viewport.load_local_view_state(&store, "corrupt"), ViewState::default());
    }
}
