//! Materialized document state and its side indexes.

use super::{ChangeKind, CommitError, EntityId, Mutation, MutationOp};
use crate::element::{Edge, EdgeId, Element, ElementId, GroupId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Plain-data view of the document: every element and edge by id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentState {
    pub elements: HashMap<ElementId, Element>,
    pub edges: HashMap<EdgeId, Edge>,
}

impl DocumentState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one operation, recording every entity it touched.
    ///
    /// Element removal cascades to incident edges so no edge is ever left
    /// pointing at a missing element.
    pub fn apply(&mut self, op: &MutationOp, touched: &mut Vec<EntityId>) -> Result<(), CommitError> {
        match op {
            MutationOp::UpsertElement(element) => {
                if !element.has_valid_geometry() {
                    return Err(CommitError::InvalidGeometry(element.id));
                }
                touched.push(EntityId::Element(element.id));
                self.elements.insert(element.id, element.clone());
            }
            MutationOp::RemoveElement(id) => {
                if self.elements.remove(id).is_none() {
                    return Err(CommitError::ElementNotFound(*id));
                }
                touched.push(EntityId::Element(*id));

                let incident: Vec<EdgeId> = self
                    .edges
                    .values()
                    .filter(|edge| edge.touches(*id))
                    .map(|edge| edge.id)
                    .collect();
                for edge_id in incident {
                    self.edges.remove(&edge_id);
                    touched.push(EntityId::Edge(edge_id));
                }
            }
            MutationOp::UpsertEdge(edge) => {
                for endpoint in [edge.source, edge.target] {
                    if !self.elements.contains_key(&endpoint) {
                        return Err(CommitError::DanglingEdge {
                            edge: edge.id,
                            missing: endpoint,
                        });
                    }
                }
                touched.push(EntityId::Edge(edge.id));
                self.edges.insert(edge.id, edge.clone());
            }
            MutationOp::RemoveEdge(id) => {
                if self.edges.remove(id).is_none() {
                    return Err(CommitError::EdgeNotFound(*id));
                }
                touched.push(EntityId::Edge(*id));
            }
        }
        Ok(())
    }

    /// Classify how each touched entity differs between `old` and `new`.
    ///
    /// Entities that end up unchanged produce no entry. Duplicates in
    /// `touched` are reported once, in first-seen order.
    pub fn changes(old: &Self, new: &Self, touched: &[EntityId]) -> Vec<(EntityId, ChangeKind)> {
        let mut seen = HashSet::new();
        let mut changes = Vec::new();

        for &entity in touched {
            if !seen.insert(entity) {
                continue;
            }
            let kind = match entity {
                EntityId::Element(id) => classify(old.elements.get(&id), new.elements.get(&id)),
                EntityId::Edge(id) => classify(old.edges.get(&id), new.edges.get(&id)),
            };
            if let Some(kind) = kind {
                changes.push((entity, kind));
            }
        }
        changes
    }

    /// Every difference between two states.
    pub fn diff(old: &Self, new: &Self) -> Vec<(EntityId, ChangeKind)> {
        let touched: Vec<EntityId> = old
            .elements
            .keys()
            .chain(new.elements.keys())
            .map(|id| EntityId::Element(*id))
            .chain(old.edges.keys().chain(new.edges.keys()).map(|id| EntityId::Edge(*id)))
            .collect();
        Self::changes(old, new, &touched)
    }

    /// Build the mutation that turns `self` into `target`.
    ///
    /// Edges are removed before elements so element removal never cascades
    /// into an edge the mutation also removes explicitly.
    pub fn mutation_to(&self, target: &Self) -> Mutation {
        let mut mutation = Mutation::new();

        for id in self.edges.keys() {
            if !target.edges.contains_key(id) {
                mutation.push(MutationOp::RemoveEdge(*id));
            }
        }
        for id in self.elements.keys() {
            if !target.elements.contains_key(id) {
                mutation.push(MutationOp::RemoveElement(*id));
            }
        }
        for (id, element) in &target.elements {
            if self.elements.get(id) != Some(element) {
                mutation.push(MutationOp::UpsertElement(element.clone()));
            }
        }
        for (id, edge) in &target.edges {
            if self.edges.get(id) != Some(edge) {
                mutation.push(MutationOp::UpsertEdge(edge.clone()));
            }
        }
        mutation
    }
}

fn classify<T: PartialEq>(old: Option<&T>, new: Option<&T>) -> Option<ChangeKind> {
    match (old, new) {
        (None, Some(_)) => Some(ChangeKind::Created),
        (Some(_), None) => Some(ChangeKind::Deleted),
        (Some(a), Some(b)) if a != b => Some(ChangeKind::Updated),
        _ => None,
    }
}

/// Side index from group id to member element ids.
///
/// Lookup is O(group size); elements only carry a back-reference.
#[derive(Debug, Clone, Default)]
pub struct GroupIndex {
    members: HashMap<GroupId, HashSet<ElementId>>,
}

impl GroupIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the index from scratch.
    pub fn from_state(state: &DocumentState) -> Self {
        let mut index = Self::new();
        for element in state.elements.values() {
            index.update(None, Some(element));
        }
        index
    }

    /// Move an element's membership from its old version to its new one.
    pub fn update(&mut self, old: Option<&Element>, new: Option<&Element>) {
        if let Some(element) = old {
            if let Some(group) = element.group_id {
                if let Some(set) = self.members.get_mut(&group) {
                    set.remove(&element.id);
                    if set.is_empty() {
                        self.members.remove(&group);
                    }
                }
            }
        }
        if let Some(element) = new {
            if let Some(group) = element.group_id {
                self.members.entry(group).or_default().insert(element.id);
            }
        }
    }

    /// Members of a group; empty if the group does not exist.
    pub fn members(&self, group: GroupId) -> Vec<ElementId> {
        self.members
            .get(&group)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn group_count(&self) -> usize {
        self.members.len()
    }
}

/// Side index from element id to the edges touching it.
#[derive(Debug, Clone, Default)]
pub struct EdgeIndex {
    incident: HashMap<ElementId, HashSet<EdgeId>>,
}

impl EdgeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the index from scratch.
    pub fn from_state(state: &DocumentState) -> Self {
        let mut index = Self::new();
        for edge in state.edges.values() {
            index.update(None, Some(edge));
        }
        index
    }

    /// Replace an edge's old endpoints with its new ones.
    pub fn update(&mut self, old: Option<&Edge>, new: Option<&Edge>) {
        if let Some(edge) = old {
            for endpoint in [edge.source, edge.target] {
                if let Some(set) = self.incident.get_mut(&endpoint) {
                    set.remove(&edge.id);
                    if set.is_empty() {
                        self.incident.remove(&endpoint);
                    }
                }
            }
        }
        if let Some(edge) = new {
            for endpoint in [edge.source, edge.target] {
                self.incident.entry(endpoint).or_default().insert(edge.id);
            }
        }
    }

    /// Ids of edges starting or ending at an element.
    pub fn edges_for(&self, element: ElementId) -> Vec<EdgeId> {
        self.incident
            .get(&element)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }
}
