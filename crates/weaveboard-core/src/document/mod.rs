//! Document accessor contract shared by every component.
//!
//! The document is owned by the synchronization adapter. Components hold a
//! [`DocumentHandle`] and route every mutation through
//! [`DocumentAccessor::commit`] so replication stays consistent.

mod mutation;
mod state;

pub use mutation::{Mutation, MutationOp};
pub use state::{DocumentState, EdgeIndex, GroupIndex};

use crate::element::{Edge, EdgeId, Element, ElementId, GroupId};
use crate::notify::Subscription;
use kurbo::Rect;
use std::rc::Rc;
use thiserror::Error;

/// Shared handle to the document.
pub type DocumentHandle = Rc<dyn DocumentAccessor>;

/// Identifier of a successful commit, monotonic per adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommitId(pub u64);

/// Which entity a change refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityId {
    Element(ElementId),
    Edge(EdgeId),
}

/// What happened to an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

/// Where a change came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    Local,
    Remote,
}

/// A single entity change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeEvent {
    pub entity: EntityId,
    pub kind: ChangeKind,
    pub origin: Origin,
}

/// All changes produced by one atomic commit or remote import.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeSet {
    pub origin: Origin,
    /// Set for local commits; remote imports carry no local commit id.
    pub commit: Option<CommitId>,
    pub events: Vec<ChangeEvent>,
}

impl ChangeSet {
    /// Check if any element was created, updated or deleted.
    pub fn touches_elements(&self) -> bool {
        self.events
            .iter()
            .any(|event| matches!(event.entity, EntityId::Element(_)))
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Opaque serialized document state captured for undo/redo.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentSnapshot(Vec<u8>);

impl DocumentSnapshot {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The adapter rejected a mutation. Nothing was applied.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommitError {
    #[error("Mutation contains no operations")]
    EmptyMutation,
    #[error("Element not found: {0}")]
    ElementNotFound(ElementId),
    #[error("Edge not found: {0}")]
    EdgeNotFound(EdgeId),
    #[error("Edge {edge} references missing element {missing}")]
    DanglingEdge { edge: EdgeId, missing: ElementId },
    #[error("Element {0} has non-finite or negative geometry")]
    InvalidGeometry(ElementId),
    #[error("Replication error: {0}")]
    Replication(String),
}

/// A snapshot could not be restored.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RestoreError {
    #[error("Corrupt snapshot: {0}")]
    Corrupt(String),
    #[error("Restore commit rejected: {0}")]
    Commit(#[from] CommitError),
}

/// Callback receiving each committed change set.
pub type ChangeListener = Box<dyn FnMut(&ChangeSet)>;

/// Read/write access to the replicated document.
///
/// All methods take `&self`; implementations use interior mutability and must
/// release internal borrows before notifying listeners.
pub trait DocumentAccessor {
    /// Get an element by id.
    fn get(&self, id: ElementId) -> Option<Element>;

    /// Get all elements, in no particular order.
    fn get_all(&self) -> Vec<Element>;

    /// Get an edge by id.
    fn get_edge(&self, id: EdgeId) -> Option<Edge>;

    /// Get all edges, in no particular order.
    fn get_all_edges(&self) -> Vec<Edge>;

    /// Ids of every element carrying the given group id.
    fn group_members(&self, group: GroupId) -> Vec<ElementId>;

    /// Ids of elements whose bounds overlap `rect` with non-zero area.
    fn elements_in_rect(&self, rect: Rect) -> Vec<ElementId>;

    /// Apply a mutation atomically and notify subscribers with local origin.
    fn commit(&self, mutation: Mutation) -> Result<CommitId, CommitError>;

    /// Register a change listener.
    fn subscribe(&self, listener: ChangeListener) -> Subscription;

    /// Capture the current state as an opaque blob.
    fn snapshot(&self) -> DocumentSnapshot;

    /// Bring the document back to a captured state through a regular commit.
    fn restore(&self, snapshot: &DocumentSnapshot) -> Result<(), RestoreError>;

    /// Check if an element exists.
    fn contains(&self, id: ElementId) -> bool {
        self.get(id).is_some()
    }

    /// Edges that start or end at the given element.
    fn edges_for_element(&self, id: ElementId) -> Vec<Edge> {
        self.get_all_edges()
            .into_iter()
            .filter(|edge| edge.touches(id))
            .collect()
    }
}
