//! Weaveboard Core Library
//!
//! Platform-agnostic document model and controller components for the
//! Weaveboard collaborative canvas.

pub mod crdt;
pub mod document;
pub mod element;
pub mod history;
pub mod notify;
pub mod selection;
pub mod storage;
pub mod viewport;

pub use crdt::CrdtDocument;
pub use document::{
    ChangeEvent, ChangeKind, ChangeSet, CommitError, CommitId, DocumentAccessor, DocumentHandle,
    DocumentSnapshot, EntityId, Mutation, MutationOp, Origin, RestoreError,
};
pub use element::{Edge, EdgeId, Element, ElementId, ElementKind, GroupId};
pub use history::{DEFAULT_HISTORY_CAPACITY, HistoryEngine, HistoryEntry};
pub use notify::{Subscribers, Subscription};
pub use selection::{SelectionChanged, SelectionError, SelectionModel, SelectionSet};
pub use storage::{
    FileViewStateStore, MemoryViewStateStore, StorageError, StorageResult, ViewStateAutoSave,
    ViewStateStore,
};
pub use viewport::{TransformChanged, ViewState, Viewport, ViewportError};
