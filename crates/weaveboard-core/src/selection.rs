//! Selection state with group atomicity and marquee selection.

use crate::document::DocumentHandle;
use crate::element::ElementId;
use crate::notify::{Subscribers, Subscription};
use kurbo::{Point, Rect};
use std::collections::HashSet;
use thiserror::Error;

/// Unordered set of selected element ids.
pub type SelectionSet = HashSet<ElementId>;

/// Published after every selection operation.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionChanged {
    /// Selected ids, sorted.
    pub selected: Vec<ElementId>,
    /// Active marquee rectangle in canvas coordinates.
    pub marquee: Option<Rect>,
}

/// Selection errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SelectionError {
    #[error("Element not found: {0}")]
    NotFound(ElementId),
    #[error("No selection box is active")]
    NoSelectionBox,
}

/// An in-progress marquee drag.
#[derive(Debug, Clone)]
struct SelectionBox {
    start: Point,
    current: Point,
    /// Selection when the drag began, restored on cancel.
    previous: SelectionSet,
}

impl SelectionBox {
    fn rect(&self) -> Rect {
        Rect::from_points(self.start, self.current)
    }
}

/// Tracks which elements are selected.
///
/// Invariant: if any member of a group is selected, every member is.
pub struct SelectionModel {
    document: DocumentHandle,
    selected: SelectionSet,
    selection_box: Option<SelectionBox>,
    listeners: Subscribers<SelectionChanged>,
}

impl SelectionModel {
    pub fn new(document: DocumentHandle) -> Self {
        Self {
            document,
            selected: SelectionSet::new(),
            selection_box: None,
            listeners: Subscribers::new(),
        }
    }

    /// Select an element together with its group siblings.
    ///
    /// Non-additive selection replaces the current set. Selecting an id that
    /// is already selected still notifies.
    pub fn select_element(&mut self, id: ElementId, additive: bool) -> Result<(), SelectionError> {
        let members = self.expand_group(id)?;
        if !additive {
            self.selected.clear();
        }
        self.selected.extend(members);
        self.notify();
        Ok(())
    }

    /// Remove an element and its group siblings from the selection.
    ///
    /// Returns false, without notifying, if the element was not selected.
    pub fn deselect_element(&mut self, id: ElementId) -> bool {
        if !self.selected.contains(&id) {
            return false;
        }
        let members = self.expand_group(id).unwrap_or_else(|_| vec![id]);
        for member in members {
            self.selected.remove(&member);
        }
        self.notify();
        true
    }

    /// Empty the selection. A no-op when nothing is selected.
    pub fn clear_selection(&mut self) {
        if self.selected.is_empty() {
            return;
        }
        self.selected.clear();
        self.notify();
    }

    pub fn is_element_selected(&self, id: ElementId) -> bool {
        self.selected.contains(&id)
    }

    /// Read-only view of the selected ids.
    pub fn selected_ids(&self) -> &SelectionSet {
        &self.selected
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Bounding box of every selected element, read fresh from the document.
    pub fn group_bbox(&self) -> Option<Rect> {
        self.selected
            .iter()
            .filter_map(|id| self.document.get(*id))
            .map(|element| element.bounds())
            .reduce(|acc, bounds| acc.union(bounds))
    }

    /// Begin a marquee drag at a canvas point.
    pub fn create_selection_box(&mut self, start: Point) {
        let previous = match self.selection_box.take() {
            // A restarted drag keeps the original pre-drag selection.
            Some(active) => active.previous,
            None => self.selected.clone(),
        };
        self.selection_box = Some(SelectionBox {
            start,
            current: start,
            previous,
        });
        self.notify();
    }

    /// Move the marquee corner and replace the selection with every element
    /// it overlaps, expanded to whole groups.
    pub fn update_selection_box(&mut self, current: Point) -> Result<(), SelectionError> {
        let rect = {
            let active = self.selection_box.as_mut().ok_or(SelectionError::NoSelectionBox)?;
            active.current = current;
            active.rect()
        };

        let mut hits = SelectionSet::new();
        for id in self.document.elements_in_rect(rect) {
            if hits.contains(&id) {
                continue;
            }
            match self.expand_group(id) {
                Ok(members) => hits.extend(members),
                Err(_) => log::debug!("Marquee hit {} vanished during query", id),
            }
        }
        self.selected = hits;
        self.notify();
        Ok(())
    }

    /// End the marquee drag, keeping the selection it produced.
    pub fn remove_selection_box(&mut self) {
        if self.selection_box.take().is_some() {
            self.notify();
        }
    }

    /// Abort the marquee drag and restore the selection from before it began.
    pub fn cancel_selection_box(&mut self) {
        let Some(active) = self.selection_box.take() else {
            return;
        };
        self.selected = active.previous;
        self.retain_existing_quietly();
        self.notify();
    }

    /// Current marquee rectangle, if a drag is active.
    pub fn selection_box_rect(&self) -> Option<Rect> {
        self.selection_box.as_ref().map(SelectionBox::rect)
    }

    /// Drop ids that no longer exist in the document.
    ///
    /// Notifies only if something was removed.
    pub fn retain_existing(&mut self) -> bool {
        let before = self.selected.len();
        self.retain_existing_quietly();
        if let Some(active) = self.selection_box.as_mut() {
            let document = &self.document;
            active.previous.retain(|id| document.contains(*id));
        }
        let changed = self.selected.len() != before;
        if changed {
            self.notify();
        }
        changed
    }

    /// Re-establish the selection invariants after the document changed.
    ///
    /// Drops deleted ids and pulls in the group siblings of every selected
    /// element, so grouping done remotely or by undo keeps groups whole.
    /// Notifies only if the set changed.
    pub fn reconcile(&mut self) -> bool {
        let before = self.selected.clone();
        self.retain_existing_quietly();
        if let Some(active) = self.selection_box.as_mut() {
            let document = &self.document;
            active.previous.retain(|id| document.contains(*id));
        }

        let mut expanded = SelectionSet::with_capacity(self.selected.len());
        for &id in &self.selected {
            if expanded.contains(&id) {
                continue;
            }
            match self.expand_group(id) {
                Ok(members) => expanded.extend(members),
                Err(_) => {
                    expanded.insert(id);
                }
            }
        }
        self.selected = expanded;

        let changed = self.selected != before;
        if changed {
            log::debug!("Selection reconciled to {} elements", self.selected.len());
            self.notify();
        }
        changed
    }

    fn retain_existing_quietly(&mut self) {
        let document = &self.document;
        self.selected.retain(|id| document.contains(*id));
    }

    /// Listen for selection changes.
    pub fn subscribe(&self, listener: impl FnMut(&SelectionChanged) + 'static) -> Subscription {
        self.listeners.subscribe(listener)
    }

    /// Build the current notification payload.
    pub fn snapshot_event(&self) -> SelectionChanged {
        let mut selected: Vec<ElementId> = self.selected.iter().copied().collect();
        selected.sort();
        SelectionChanged {
            selected,
            marquee: self.selection_box_rect(),
        }
    }

    fn notify(&self) {
        self.listeners.emit(&self.snapshot_event());
    }

    /// The element and all of its group siblings.
    fn expand_group(&self, id: ElementId) -> Result<Vec<ElementId>, SelectionError> {
        let element = self.document.get(id).ok_or(SelectionError::NotFound(id))?;
        match element.group_id {
            Some(group) => {
                let mut members = self.document.group_members(group);
                if !members.contains(&id) {
                    members.push(id);
                }
                Ok(members)
            }
            None => Ok(vec![id]),
        }
    }
}
