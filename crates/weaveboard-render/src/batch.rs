//! Per-frame coalescing of pending visual changes.

use kurbo::Affine;
use std::collections::HashMap;
use weaveboard_core::document::{ChangeKind, EntityId};
use weaveboard_core::element::{EdgeId, ElementId};

/// Which overlay a change refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverlayKey {
    Selection(ElementId),
    GroupBox,
    Marquee,
}

/// Anything the pipeline mounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKey {
    Element(ElementId),
    Edge(EdgeId),
    Overlay(OverlayKey),
}

impl From<EntityId> for EntityKey {
    fn from(entity: EntityId) -> Self {
        match entity {
            EntityId::Element(id) => EntityKey::Element(id),
            EntityId::Edge(id) => EntityKey::Edge(id),
        }
    }
}

impl EntityKey {
    /// Dependents draw after the things they depend on.
    fn layer(&self) -> u8 {
        match self {
            EntityKey::Element(_) => 0,
            EntityKey::Edge(_) => 1,
            EntityKey::Overlay(_) => 2,
        }
    }
}

fn phase(kind: ChangeKind) -> u8 {
    match kind {
        ChangeKind::Deleted => 0,
        ChangeKind::Created => 1,
        ChangeKind::Updated => 2,
    }
}

/// Changes collected during one frame, at most one per entity.
#[derive(Debug, Default)]
pub struct RenderBatch {
    entries: HashMap<EntityKey, ChangeKind>,
    transform: Option<Affine>,
}

impl RenderBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a change into the batch.
    ///
    /// The latest kind wins, except that an update to an entity created in
    /// the same frame keeps it a creation.
    pub fn record(&mut self, key: EntityKey, kind: ChangeKind) {
        let merged = match (self.entries.get(&key), kind) {
            (Some(ChangeKind::Created), ChangeKind::Updated) => ChangeKind::Created,
            _ => kind,
        };
        self.entries.insert(key, merged);
    }

    /// Replace the pending surface transform. Only the last one is applied.
    pub fn set_transform(&mut self, transform: Affine) {
        self.transform = Some(transform);
    }

    pub fn get(&self, key: &EntityKey) -> Option<ChangeKind> {
        self.entries.get(key).copied()
    }

    pub fn pending_transform(&self) -> Option<Affine> {
        self.transform
    }

    /// Number of entity changes (the transform is not counted).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.transform.is_none()
    }

    /// Empty the batch, returning the transform and the entity changes in
    /// dispatch order: deletions, then creations, then updates.
    ///
    /// Deletions run dependents first (overlays, edges, elements); creations
    /// and updates run in the opposite order.
    pub fn drain(&mut self) -> (Option<Affine>, Vec<(EntityKey, ChangeKind)>) {
        let mut ops: Vec<(EntityKey, ChangeKind)> = self.entries.drain().collect();
        ops.sort_by_key(|(key, kind)| {
            let layer = if *kind == ChangeKind::Deleted { 2 - key.layer() } else { key.layer() };
            (phase(*kind), layer)
        });
        (self.transform.take(), ops)
    }
}
