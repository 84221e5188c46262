//! CRDT integration using Loro for collaborative editing.
//!
//! This module bridges the element/edge model and Loro's CRDT document.
//!
//! # Schema
//!
//! ```text
//! LoroDoc
//! ├── "elements": LoroMap<ElementId, LoroMap>
//! └── "edges": LoroMap<EdgeId, LoroMap>
//! ```
//!
//! Each element map holds "id", "kind", "x", "y", "width", "height" and the
//! optional "group_id" and "payload" (JSON text). Each edge map holds "id",
//! "source", "target" and an optional "label".

mod convert;
mod schema;

pub use convert::{edge_from_loro, edge_to_loro, element_from_loro, element_to_loro};
pub use schema::{CrdtDocument, EDGES_KEY, ELEMENTS_KEY};

// Re-export Loro types that may be useful for collaboration
pub use loro::{ExportMode, VersionVector};
