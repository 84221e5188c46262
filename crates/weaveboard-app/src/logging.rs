//! Renderers that only log what they would draw.
//!
//! Used by the headless binary and handy when bringing up a new host.

use kurbo::Affine;
use weaveboard_core::element::Element;
use weaveboard_render::{
    EdgeGeometry, EdgeRenderer, ElementRenderer, Overlay, OverlayRenderer, OverlayStyle,
    PipelineRenderers, RenderHandle, RenderResult, RendererRegistry, Surface,
};

/// Logs every renderer call at debug level.
#[derive(Debug, Default)]
pub struct LoggingRenderer {
    name: &'static str,
    next_handle: u64,
}

impl LoggingRenderer {
    pub fn new(name: &'static str) -> Self {
        Self { name, next_handle: 0 }
    }

    fn allocate(&mut self) -> RenderHandle {
        self.next_handle += 1;
        RenderHandle(self.next_handle)
    }
}

impl ElementRenderer for LoggingRenderer {
    fn mount(&mut self, element: &Element) -> RenderResult<RenderHandle> {
        let handle = self.allocate();
        log::debug!(
            "[{}] mount {} {} at {:?} -> {:?}",
            self.name,
            element.kind,
            element.id,
            element.bounds(),
            handle
        );
        Ok(handle)
    }

    fn update(&mut self, element: &Element, handle: RenderHandle) -> RenderResult<()> {
        log::debug!("[{}] update {:?} to {:?}", self.name, handle, element.bounds());
        Ok(())
    }

    fn unmount(&mut self, handle: RenderHandle) -> RenderResult<()> {
        log::debug!("[{}] unmount {:?}", self.name, handle);
        Ok(())
    }
}

impl EdgeRenderer for LoggingRenderer {
    fn mount(&mut self, geometry: &EdgeGeometry) -> RenderResult<RenderHandle> {
        let handle = self.allocate();
        log::debug!(
            "[{}] mount edge {} from {:?} to {:?} -> {:?}",
            self.name,
            geometry.edge.id,
            geometry.source.center(),
            geometry.target.center(),
            handle
        );
        Ok(handle)
    }

    fn update(&mut self, geometry: &EdgeGeometry, handle: RenderHandle) -> RenderResult<()> {
        log::debug!("[{}] update edge {:?} ({})", self.name, handle, geometry.edge.id);
        Ok(())
    }

    fn unmount(&mut self, handle: RenderHandle) -> RenderResult<()> {
        log::debug!("[{}] unmount edge {:?}", self.name, handle);
        Ok(())
    }
}

impl OverlayRenderer for LoggingRenderer {
    fn mount(&mut self, overlay: &Overlay, style: &OverlayStyle) -> RenderResult<RenderHandle> {
        let handle = self.allocate();
        log::debug!("[{}] mount {:?} in {:?} -> {:?}", self.name, overlay, style.color, handle);
        Ok(handle)
    }

    fn update(&mut self, overlay: &Overlay, _style: &OverlayStyle, handle: RenderHandle) -> RenderResult<()> {
        log::debug!("[{}] update {:?} to {:?}", self.name, handle, overlay);
        Ok(())
    }

    fn unmount(&mut self, handle: RenderHandle) -> RenderResult<()> {
        log::debug!("[{}] unmount overlay {:?}", self.name, handle);
        Ok(())
    }
}

impl Surface for LoggingRenderer {
    fn set_transform(&mut self, transform: Affine) -> RenderResult<()> {
        log::debug!("[{}] transform {:?}", self.name, transform.as_coeffs());
        Ok(())
    }
}

/// A full renderer set where every kind is drawn by a [`LoggingRenderer`].
pub fn logging_renderers() -> PipelineRenderers {
    PipelineRenderers {
        elements: RendererRegistry::new().with_fallback(Box::new(LoggingRenderer::new("element"))),
        edges: Box::new(LoggingRenderer::new("edge")),
        overlays: Box::new(LoggingRenderer::new("overlay")),
        surface: Box::new(LoggingRenderer::new("surface")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::{Point, Size};

    #[test]
    fn test_handles_are_sequential() {
        let mut renderer = LoggingRenderer::new("test");
        let element = Element::new("text", Point::ZERO, Size::new(1.0, 1.0));

        let first = ElementRenderer::mount(&mut renderer, &element).expect("mount");
        let second = ElementRenderer::mount(&mut renderer, &element).expect("mount");
        assert_eq!(first, RenderHandle(1));
        assert_eq!(second, RenderHandle(2));
    }

    #[test]
    fn test_logging_renderers_accept_any_kind() {
        let mut renderers = logging_renderers();
        assert!(renderers.elements.has_fallback());
        assert!(renderers.elements.get_mut(&"anything".into()).is_ok());
    }
}
