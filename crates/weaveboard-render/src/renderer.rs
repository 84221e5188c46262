//! Renderer capability traits and the per-kind registry.

use kurbo::{Affine, Rect};
use peniko::Color;
use std::collections::HashMap;
use thiserror::Error;
use weaveboard_core::element::{Edge, Element, ElementId, ElementKind};

/// Renderer errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RenderError {
    #[error("No renderer registered for element kind \"{0}\"")]
    NoRenderer(ElementKind),
    #[error("Render failed: {0}")]
    RenderFailed(String),
}

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RenderError>;

/// Opaque handle a renderer returns from `mount` and receives back later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderHandle(pub u64);

/// Draws one kind of element.
pub trait ElementRenderer {
    fn mount(&mut self, element: &Element) -> RenderResult<RenderHandle>;
    fn update(&mut self, element: &Element, handle: RenderHandle) -> RenderResult<()>;
    fn unmount(&mut self, handle: RenderHandle) -> RenderResult<()>;
}

/// An edge together with the current bounds of both endpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeGeometry {
    pub edge: Edge,
    pub source: Rect,
    pub target: Rect,
}

/// Draws connectors between elements.
pub trait EdgeRenderer {
    fn mount(&mut self, geometry: &EdgeGeometry) -> RenderResult<RenderHandle>;
    fn update(&mut self, geometry: &EdgeGeometry, handle: RenderHandle) -> RenderResult<()>;
    fn unmount(&mut self, handle: RenderHandle) -> RenderResult<()>;
}

/// Selection decorations drawn above the document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Overlay {
    /// Outline around one selected element.
    Selection { element: ElementId, bounds: Rect },
    /// Box enclosing the whole multi-element selection.
    GroupBox { bounds: Rect },
    /// Marquee drag rectangle.
    Marquee { rect: Rect },
}

/// Overlay styling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayStyle {
    pub color: Color,
    pub stroke_width: f64,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            color: Color::from_rgba8(59, 130, 246, 255), // Blue
            stroke_width: 1.5,
        }
    }
}

/// Draws overlays.
pub trait OverlayRenderer {
    fn mount(&mut self, overlay: &Overlay, style: &OverlayStyle) -> RenderResult<RenderHandle>;
    fn update(&mut self, overlay: &Overlay, style: &OverlayStyle, handle: RenderHandle) -> RenderResult<()>;
    fn unmount(&mut self, handle: RenderHandle) -> RenderResult<()>;
}

/// The drawing surface as a whole.
pub trait Surface {
    /// Apply the canvas-to-screen transform to everything on the surface.
    fn set_transform(&mut self, transform: Affine) -> RenderResult<()>;
}

/// Maps element kinds to their renderers.
///
/// Kinds without a registered renderer use the fallback, if one is set.
#[derive(Default)]
pub struct RendererRegistry {
    renderers: HashMap<ElementKind, Box<dyn ElementRenderer>>,
    fallback: Option<Box<dyn ElementRenderer>>,
}

impl RendererRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a renderer for a kind, replacing any previous one.
    pub fn register(&mut self, kind: impl Into<ElementKind>, renderer: Box<dyn ElementRenderer>) {
        let kind = kind.into();
        if self.renderers.insert(kind.clone(), renderer).is_some() {
            log::debug!("Replaced renderer for kind {}", kind);
        }
    }

    pub fn with_renderer(mut self, kind: impl Into<ElementKind>, renderer: Box<dyn ElementRenderer>) -> Self {
        self.register(kind, renderer);
        self
    }

    pub fn with_fallback(mut self, renderer: Box<dyn ElementRenderer>) -> Self {
        self.fallback = Some(renderer);
        self
    }

    pub fn contains(&self, kind: &ElementKind) -> bool {
        self.renderers.contains_key(kind)
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<ElementKind> {
        let mut kinds: Vec<ElementKind> = self.renderers.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    /// The renderer responsible for a kind.
    pub fn get_mut(&mut self, kind: &ElementKind) -> RenderResult<&mut dyn ElementRenderer> {
        if let Some(renderer) = self.renderers.get_mut(kind) {
            return Ok(renderer.as_mut());
        }
        match self.fallback.as_deref_mut() {
            Some(renderer) => Ok(renderer),
            None => Err(RenderError::NoRenderer(kind.clone())),
        }
    }
}
