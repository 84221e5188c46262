//! Canvas elements and the edges connecting them.

use kurbo::{Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an element. Globally unique across collaborators.
pub type ElementId = Uuid;
/// Unique identifier for an edge.
pub type EdgeId = Uuid;
/// Identifier shared by every member of a group.
pub type GroupId = Uuid;

/// Type tag selecting which renderer draws an element ("text", "image", ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementKind(String);

impl ElementKind {
    pub fn new(kind: impl Into<String>) -> Self {
        Self(kind.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ElementKind {
    fn from(kind: &str) -> Self {
        Self::new(kind)
    }
}

impl std::fmt::Display for ElementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A positioned item on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub id: ElementId,
    /// Top-left corner in document space.
    pub position: Point,
    pub size: Size,
    pub kind: ElementKind,
    /// Group this element belongs to. A back-reference only; groups own nothing.
    #[serde(default)]
    pub group_id: Option<GroupId>,
    /// Type-specific data, opaque to the controller.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Element {
    /// Create a new element with a fresh id and an empty payload.
    pub fn new(kind: impl Into<ElementKind>, position: Point, size: Size) -> Self {
        Self {
            id: Uuid::new_v4(),
            position,
            size,
            kind: kind.into(),
            group_id: None,
            payload: serde_json::Value::Null,
        }
    }

    pub fn with_id(mut self, id: ElementId) -> Self {
        self.id = id;
        self
    }

    pub fn with_group(mut self, group_id: GroupId) -> Self {
        self.group_id = Some(group_id);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// Axis-aligned bounding box in document space.
    pub fn bounds(&self) -> Rect {
        Rect::from_origin_size(self.position, self.size)
    }

    /// Center of the bounding box.
    pub fn center(&self) -> Point {
        self.bounds().center()
    }

    /// Return a copy moved by `delta`.
    pub fn translated(&self, delta: Vec2) -> Self {
        let mut moved = self.clone();
        moved.position += delta;
        moved
    }

    /// Check that position and size are finite and size is non-negative.
    pub fn has_valid_geometry(&self) -> bool {
        self.position.x.is_finite()
            && self.position.y.is_finite()
            && self.size.width.is_finite()
            && self.size.height.is_finite()
            && self.size.width >= 0.0
            && self.size.height >= 0.0
    }
}

/// A directed connection between two elements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub source: ElementId,
    pub target: ElementId,
    #[serde(default)]
    pub label: Option<String>,
}

impl Edge {
    pub fn new(source: ElementId, target: ElementId) -> Self {
        Self {
            id: Uuid::new_v4(),
            source,
            target,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Check if this edge touches the given element.
    pub fn touches(&self, element: ElementId) -> bool {
        self.source == element || self.target == element
    }
}

/// Generate an id for a new group.
pub fn new_group_id() -> GroupId {
    Uuid::new_v4()
}
