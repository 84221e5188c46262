//! Weaveboard Application
//!
//! The controller that ties the replicated document to viewport, selection,
//! history and the rendering pipeline, plus its configuration.

mod config;
mod controller;
mod logging;

pub use config::ControllerConfig;
pub use controller::{Controller, ControllerError, ControllerResult};
pub use logging::{LoggingRenderer, logging_renderers};
