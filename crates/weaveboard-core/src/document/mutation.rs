//! Atomic change sets submitted to the document.

use crate::element::{Edge, EdgeId, Element, ElementId};

/// One low-level write.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOp {
    /// Insert or replace an element.
    UpsertElement(Element),
    /// Remove an element and every edge touching it.
    RemoveElement(ElementId),
    /// Insert or replace an edge. Both endpoints must exist.
    UpsertEdge(Edge),
    RemoveEdge(EdgeId),
}

/// An ordered list of operations applied all-or-nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mutation {
    ops: Vec<MutationOp>,
}

impl Mutation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_element(mut self, element: Element) -> Self {
        self.ops.push(MutationOp::UpsertElement(element));
        self
    }

    pub fn remove_element(mut self, id: ElementId) -> Self {
        self.ops.push(MutationOp::RemoveElement(id));
        self
    }

    pub fn upsert_edge(mut self, edge: Edge) -> Self {
        self.ops.push(MutationOp::UpsertEdge(edge));
        self
    }

    pub fn remove_edge(mut self, id: EdgeId) -> Self {
        self.ops.push(MutationOp::RemoveEdge(id));
        self
    }

    /// Append an operation in place.
    pub fn push(&mut self, op: MutationOp) {
        self.ops.push(op);
    }

    pub fn ops(&self) -> &[MutationOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

impl FromIterator<MutationOp> for Mutation {
    fn from_iter<I: IntoIterator<Item = MutationOp>>(iter: I) -> Self {
        Self {
            ops: iter.into_iter().collect(),
        }
    }
}
