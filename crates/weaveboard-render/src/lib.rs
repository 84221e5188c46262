//! Weaveboard Render Library
//!
//! Renderer contracts and the batched rendering pipeline. Concrete renderers
//! for each element kind are supplied by the host through
//! [`RendererRegistry`].

mod batch;
mod pipeline;
mod renderer;

pub use batch::{EntityKey, OverlayKey, RenderBatch};
pub use pipeline::{FrameReport, FrameScheduler, ManualFrameScheduler, PipelineRenderers, RenderingPipeline};
pub use renderer::{
    EdgeGeometry, EdgeRenderer, ElementRenderer, Overlay, OverlayRenderer, OverlayStyle, RenderError,
    RenderHandle, RenderResult, RendererRegistry, Surface,
};
