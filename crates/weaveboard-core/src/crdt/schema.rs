//! Loro document schema and the replicated document adapter.

use super::convert::{edge_from_loro, edge_to_loro, element_from_loro, element_to_loro};
use crate::document::{
    ChangeEvent, ChangeKind, ChangeListener, ChangeSet, CommitError, CommitId, DocumentAccessor,
    DocumentSnapshot, DocumentState, EdgeIndex, EntityId, GroupIndex, Mutation, Origin, RestoreError,
};
use crate::element::{Edge, EdgeId, Element, ElementId, GroupId};
use crate::notify::{Subscribers, Subscription};
use kurbo::Rect;
use loro::{ExportMode, LoroDoc, LoroMap, LoroResult, LoroValue};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

/// Key for the elements map in the document.
pub const ELEMENTS_KEY: &str = "elements";
/// Key for the edges map in the document.
pub const EDGES_KEY: &str = "edges";

/// A CRDT-backed document for collaborative editing.
///
/// Wraps a `LoroDoc` and keeps a materialized [`DocumentState`] so reads never
/// walk the CRDT. Local commits and remote imports both notify subscribers
/// with one atomic [`ChangeSet`].
pub struct CrdtDocument {
    /// The underlying Loro document.
    doc: LoroDoc,
    /// Materialized view of the Loro state.
    state: RefCell<DocumentState>,
    groups: RefCell<GroupIndex>,
    incident_edges: RefCell<EdgeIndex>,
    /// Edges present in Loro but hidden because an endpoint is missing.
    hidden_edges: RefCell<HashMap<EdgeId, Edge>>,
    listeners: Subscribers<ChangeSet>,
    next_commit: Cell<u64>,
}

impl CrdtDocument {
    /// Create a new empty CRDT document.
    pub fn new() -> Self {
        Self::from_loro(LoroDoc::new())
    }

    /// Create a CRDT document from a snapshot exported by a peer.
    pub fn from_snapshot(bytes: &[u8]) -> LoroResult<Self> {
        let doc = LoroDoc::new();
        doc.import(bytes)?;
        Ok(Self::from_loro(doc))
    }

    fn from_loro(doc: LoroDoc) -> Self {
        let (state, hidden) = materialize(&doc);
        let groups = GroupIndex::from_state(&state);
        let incident_edges = EdgeIndex::from_state(&state);
        Self {
            doc,
            state: RefCell::new(state),
            groups: RefCell::new(groups),
            incident_edges: RefCell::new(incident_edges),
            hidden_edges: RefCell::new(hidden),
            listeners: Subscribers::new(),
            next_commit: Cell::new(1),
        }
    }

    /// Peer id of this replica.
    pub fn peer_id(&self) -> u64 {
        self.doc.peer_id()
    }

    fn elements_map(&self) -> LoroMap {
        self.doc.get_map(ELEMENTS_KEY)
    }

    fn edges_map(&self) -> LoroMap {
        self.doc.get_map(EDGES_KEY)
    }

    /// Number of elements in the document.
    pub fn element_count(&self) -> usize {
        self.state.borrow().elements.len()
    }

    /// Number of edges in the document.
    pub fn edge_count(&self) -> usize {
        self.state.borrow().edges.len()
    }

    /// Export the document as a snapshot (full state).
    pub fn export_snapshot(&self) -> Vec<u8> {
        self.doc.export(ExportMode::Snapshot).unwrap_or_default()
    }

    /// Export incremental updates since a version.
    pub fn export_updates(&self, since: &loro::VersionVector) -> Vec<u8> {
        self.doc.export(ExportMode::updates(since)).unwrap_or_default()
    }

    /// Get the current version vector.
    pub fn version(&self) -> loro::VersionVector {
        self.doc.oplog_vv()
    }

    /// Apply updates received from another peer.
    ///
    /// Subscribers receive every resulting difference as one remote-origin
    /// change set.
    pub fn import_remote(&self, bytes: &[u8]) -> LoroResult<()> {
        self.doc.import(bytes)?;
        let (incoming, hidden) = materialize(&self.doc);
        *self.hidden_edges.borrow_mut() = hidden;
        let changes = DocumentState::diff(&self.state.borrow(), &incoming);
        log::debug!("Imported remote update with {} entity changes", changes.len());
        self.install(incoming, changes, Origin::Remote, None);
        Ok(())
    }

    /// Write changed entities from `staged` into the Loro maps.
    fn write_changes(&self, staged: &DocumentState, changes: &[(EntityId, ChangeKind)]) -> LoroResult<()> {
        let elements = self.elements_map();
        let edges = self.edges_map();

        for (entity, kind) in changes {
            match entity {
                EntityId::Element(id) => {
                    let key = id.to_string();
                    if *kind != ChangeKind::Created {
                        elements.delete(&key)?;
                    }
                    if let Some(element) = staged.elements.get(id) {
                        let map = elements.insert_container(&key, LoroMap::new())?;
                        element_to_loro(element, &map)?;
                    }
                }
                EntityId::Edge(id) => {
                    let key = id.to_string();
                    if *kind != ChangeKind::Created {
                        edges.delete(&key)?;
                    }
                    if let Some(edge) = staged.edges.get(id) {
                        let map = edges.insert_container(&key, LoroMap::new())?;
                        edge_to_loro(edge, &map)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Bring back hidden edges whose endpoints exist again in `staged`.
    ///
    /// Peers importing the same commit see these edges, so they are reported
    /// as created in the local change set.
    fn revive_hidden_edges(&self, staged: &mut DocumentState, changes: &mut Vec<(EntityId, ChangeKind)>) {
        let mut hidden = self.hidden_edges.borrow_mut();
        hidden.retain(|id, _| !staged.edges.contains_key(id));
        let revived: Vec<EdgeId> = hidden
            .values()
            .filter(|edge| staged.elements.contains_key(&edge.source) && staged.elements.contains_key(&edge.target))
            .map(|edge| edge.id)
            .collect();
        for id in revived {
            if let Some(edge) = hidden.remove(&id) {
                log::debug!("Edge {} visible again", id);
                staged.edges.insert(id, edge);
                changes.push((EntityId::Edge(id), ChangeKind::Created));
            }
        }
    }

    /// Swap in a new materialized state and notify subscribers.
    fn install(
        &self,
        next: DocumentState,
        changes: Vec<(EntityId, ChangeKind)>,
        origin: Origin,
        commit: Option<CommitId>,
    ) {
        {
            let mut state = self.state.borrow_mut();
            let mut groups = self.groups.borrow_mut();
            let mut incident = self.incident_edges.borrow_mut();
            for (entity, _) in &changes {
                match entity {
                    EntityId::Element(id) => groups.update(state.elements.get(id), next.elements.get(id)),
                    EntityId::Edge(id) => incident.update(state.edges.get(id), next.edges.get(id)),
                }
            }
            *state = next;
        }

        if changes.is_empty() {
            return;
        }

        let change_set = ChangeSet {
            origin,
            commit,
            events: changes
                .into_iter()
                .map(|(entity, kind)| ChangeEvent { entity, kind, origin })
                .collect(),
        };
        self.listeners.emit(&change_set);
    }
}

impl Default for CrdtDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentAccessor for CrdtDocument {
    fn get(&self, id: ElementId) -> Option<Element> {
        self.state.borrow().elements.get(&id).cloned()
    }

    fn get_all(&self) -> Vec<Element> {
        self.state.borrow().elements.values().cloned().collect()
    }

    fn get_edge(&self, id: EdgeId) -> Option<Edge> {
        self.state.borrow().edges.get(&id).cloned()
    }

    fn get_all_edges(&self) -> Vec<Edge> {
        self.state.borrow().edges.values().cloned().collect()
    }

    fn group_members(&self, group: GroupId) -> Vec<ElementId> {
        self.groups.borrow().members(group)
    }

    fn elements_in_rect(&self, rect: Rect) -> Vec<ElementId> {
        self.state
            .borrow()
            .elements
            .values()
            .filter(|element| rect.intersect(element.bounds()).area() > 0.0)
            .map(|element| element.id)
            .collect()
    }

    fn commit(&self, mutation: Mutation) -> Result<CommitId, CommitError> {
        if mutation.is_empty() {
            return Err(CommitError::EmptyMutation);
        }

        // Stage against a copy so a rejected op leaves nothing behind.
        let (mut staged, mut changes) = {
            let current = self.state.borrow();
            let mut staged = current.clone();
            let mut touched = Vec::with_capacity(mutation.len());
            for op in mutation.ops() {
                staged.apply(op, &mut touched)?;
            }
            let changes = DocumentState::changes(&current, &staged, &touched);
            (staged, changes)
        };

        self.write_changes(&staged, &changes)
            .map_err(|e| CommitError::Replication(e.to_string()))?;
        self.doc.commit();
        self.revive_hidden_edges(&mut staged, &mut changes);

        let id = CommitId(self.next_commit.get());
        self.next_commit.set(id.0 + 1);
        log::debug!("Commit {:?} applied {} entity changes", id, changes.len());

        self.install(staged, changes, Origin::Local, Some(id));
        Ok(id)
    }

    fn edges_for_element(&self, id: ElementId) -> Vec<Edge> {
        let state = self.state.borrow();
        self.incident_edges
            .borrow()
            .edges_for(id)
            .into_iter()
            .filter_map(|edge| state.edges.get(&edge).cloned())
            .collect()
    }

    fn subscribe(&self, listener: ChangeListener) -> Subscription {
        let mut listener = listener;
        self.listeners.subscribe(move |changes: &ChangeSet| listener(changes))
    }

    fn snapshot(&self) -> DocumentSnapshot {
        match serde_json::to_vec(&*self.state.borrow()) {
            Ok(bytes) => DocumentSnapshot::from_bytes(bytes),
            Err(e) => {
                log::error!("Failed to serialize document snapshot: {}", e);
                DocumentSnapshot::default()
            }
        }
    }

    fn restore(&self, snapshot: &DocumentSnapshot) -> Result<(), RestoreError> {
        let target: DocumentState = serde_json::from_slice(snapshot.as_bytes())
            .map_err(|e| RestoreError::Corrupt(e.to_string()))?;

        let mutation = self.state.borrow().mutation_to(&target);
        if mutation.is_empty() {
            return Ok(());
        }
        self.commit(mutation)?;
        Ok(())
    }
}

/// Read the full Loro state into plain data.
///
/// Concurrent edits can leave an edge whose endpoint was deleted by another
/// peer; such edges are kept out of the materialized view and returned
/// separately.
fn materialize(doc: &LoroDoc) -> (DocumentState, HashMap<EdgeId, Edge>) {
    let mut state = DocumentState::new();
    let mut hidden = HashMap::new();

    if let LoroValue::Map(elements) = doc.get_map(ELEMENTS_KEY).get_deep_value() {
        for (key, value) in elements.iter() {
            match value {
                LoroValue::Map(map) => match element_from_loro(map) {
                    Some(element) => {
                        state.elements.insert(element.id, element);
                    }
                    None => log::warn!("Skipping malformed element {}", key),
                },
                _ => log::warn!("Skipping non-map element entry {}", key),
            }
        }
    }

    if let LoroValue::Map(edges) = doc.get_map(EDGES_KEY).get_deep_value() {
        for (key, value) in edges.iter() {
            let Some(edge) = (match value {
                LoroValue::Map(map) => edge_from_loro(map),
                _ => None,
            }) else {
                log::warn!("Skipping malformed edge {}", key);
                continue;
            };
            if !state.elements.contains_key(&edge.source) || !state.elements.contains_key(&edge.target) {
                log::warn!("Hiding edge {} with a missing endpoint", edge.id);
                hidden.insert(edge.id, edge);
                continue;
            }
            state.edges.insert(edge.id, edge);
        }
    }

    (state, hidden)
}
