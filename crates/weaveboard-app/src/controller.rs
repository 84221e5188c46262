//! Composition root wiring the document to viewport, selection, history and
//! rendering.
//!
//! Local actions go through [`Controller::apply`], which records history only
//! for commits the document accepted. Remote edits reach the pipeline and the
//! selection through the document subscription and never touch history.

use crate::config::ControllerConfig;
use kurbo::{Point, Size, Vec2};
use std::cell::{Ref, RefCell};
use std::rc::{Rc, Weak};
use std::time::Instant;
use thiserror::Error;
use weaveboard_core::document::{ChangeSet, CommitError, CommitId, DocumentHandle, Mutation, MutationOp};
use weaveboard_core::element::{Edge, EdgeId, Element, ElementId, GroupId, new_group_id};
use weaveboard_core::history::HistoryEngine;
use weaveboard_core::notify::Subscription;
use weaveboard_core::selection::{SelectionChanged, SelectionError, SelectionModel};
use weaveboard_core::storage::{ViewStateAutoSave, ViewStateStore};
use weaveboard_core::viewport::{TransformChanged, ViewState, Viewport, ViewportError};
use weaveboard_render::{FrameReport, FrameScheduler, OverlayStyle, PipelineRenderers, RenderingPipeline};

/// Controller errors.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Commit(#[from] CommitError),
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error(transparent)]
    Viewport(#[from] ViewportError),
    #[error("Nothing is selected")]
    NothingSelected,
    #[error("Controller has been disposed")]
    Disposed,
}

/// Result type for controller operations.
pub type ControllerResult<T> = Result<T, ControllerError>;

pub struct Controller {
    config: ControllerConfig,
    document: DocumentHandle,
    viewport: Viewport,
    selection: Rc<RefCell<SelectionModel>>,
    history: HistoryEngine,
    pipeline: Rc<RefCell<RenderingPipeline>>,
    autosave: Rc<RefCell<ViewStateAutoSave>>,
    subscriptions: Vec<Subscription>,
    disposed: bool,
}

impl Controller {
    /// Build the controller, load the stored view state and queue the whole
    /// document for its first frame.
    pub fn new(
        document: DocumentHandle,
        renderers: PipelineRenderers,
        scheduler: Box<dyn FrameScheduler>,
        store: Rc<dyn ViewStateStore>,
        config: ControllerConfig,
    ) -> ControllerResult<Self> {
        let mut viewport =
            Viewport::new(document.clone()).with_zoom_bounds(config.min_zoom, config.max_zoom)?;
        viewport.set_viewport_size(config.viewport_size());

        let selection = Rc::new(RefCell::new(SelectionModel::new(document.clone())));
        let history = HistoryEngine::with_capacity(document.clone(), config.history_capacity);
        let style = OverlayStyle {
            color: config.selection_color(),
            ..OverlayStyle::default()
        };
        let pipeline = Rc::new(RefCell::new(
            RenderingPipeline::new(document.clone(), renderers, scheduler).with_overlay_style(style),
        ));
        let autosave = Rc::new(RefCell::new(
            ViewStateAutoSave::new(store.clone(), config.document_id.clone())
                .with_debounce(config.save_debounce()),
        ));

        let subscriptions = vec![
            subscribe_document(&document, &pipeline, &selection),
            subscribe_selection(&selection, &pipeline),
            subscribe_viewport(&viewport, &pipeline, &autosave),
        ];

        // Publishes the loaded transform to the pipeline.
        viewport.load_local_view_state(store.as_ref(), &config.document_id);
        autosave.borrow_mut().mark_clean();
        pipeline.borrow_mut().mount_all();

        log::info!(
            "Controller ready for {} with {} elements",
            config.document_id,
            document.get_all().len()
        );

        Ok(Self {
            config,
            document,
            viewport,
            selection,
            history,
            pipeline,
            autosave,
            subscriptions,
            disposed: false,
        })
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn document(&self) -> &DocumentHandle {
        &self.document
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn selection(&self) -> Ref<'_, SelectionModel> {
        self.selection.borrow()
    }

    pub fn history(&self) -> &HistoryEngine {
        &self.history
    }

    pub fn pipeline(&self) -> Ref<'_, RenderingPipeline> {
        self.pipeline.borrow()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    // --- Local actions ---

    /// Commit a local mutation as one undoable action.
    ///
    /// History is only recorded if the document accepts the mutation.
    pub fn apply(&mut self, label: &str, mutation: Mutation) -> ControllerResult<CommitId> {
        self.ensure_live()?;
        let entry = self.history.capture(label);
        let id = self.document.commit(mutation).inspect_err(|e| {
            log::warn!("Action \"{}\" rejected: {}", label, e);
        })?;
        self.history.push(entry);
        Ok(id)
    }

    /// Add an element to the document.
    pub fn add_element(&mut self, element: Element) -> ControllerResult<ElementId> {
        let id = element.id;
        self.apply("add element", Mutation::new().upsert_element(element))?;
        Ok(id)
    }

    /// Move every selected element by a canvas-space delta.
    pub fn move_selection(&mut self, delta: Vec2) -> ControllerResult<CommitId> {
        let mutation: Mutation = self
            .selected_elements()?
            .into_iter()
            .map(|element| MutationOp::UpsertElement(element.translated(delta)))
            .collect();
        self.apply("move selection", mutation)
    }

    /// Delete the selected elements and the edges attached to them.
    pub fn delete_selection(&mut self) -> ControllerResult<CommitId> {
        let mutation: Mutation = self
            .selected_elements()?
            .into_iter()
            .map(|element| MutationOp::RemoveElement(element.id))
            .collect();
        self.apply("delete selection", mutation)
    }

    /// Connect two elements with an edge.
    pub fn connect(
        &mut self,
        source: ElementId,
        target: ElementId,
        label: Option<String>,
    ) -> ControllerResult<EdgeId> {
        let mut edge = Edge::new(source, target);
        edge.label = label;
        let id = edge.id;
        self.apply("connect", Mutation::new().upsert_edge(edge))?;
        Ok(id)
    }

    /// Put every selected element into one new group.
    pub fn group_selection(&mut self) -> ControllerResult<GroupId> {
        let group = new_group_id();
        let mutation: Mutation = self
            .selected_elements()?
            .into_iter()
            .map(|element| MutationOp::UpsertElement(element.with_group(group)))
            .collect();
        self.apply("group", mutation)?;
        Ok(group)
    }

    /// Remove the selected elements from their groups.
    ///
    /// Returns how many elements were ungrouped; zero commits nothing.
    pub fn ungroup_selection(&mut self) -> ControllerResult<usize> {
        let mutation: Mutation = self
            .selected_elements()?
            .into_iter()
            .filter(|element| element.group_id.is_some())
            .map(|mut element| {
                element.group_id = None;
                MutationOp::UpsertElement(element)
            })
            .collect();
        let count = mutation.len();
        if count > 0 {
            self.apply("ungroup", mutation)?;
        }
        Ok(count)
    }

    fn selected_elements(&self) -> ControllerResult<Vec<Element>> {
        let elements: Vec<Element> = self
            .selection
            .borrow()
            .selected_ids()
            .iter()
            .filter_map(|id| self.document.get(*id))
            .collect();
        if elements.is_empty() {
            return Err(ControllerError::NothingSelected);
        }
        Ok(elements)
    }

    fn ensure_live(&self) -> ControllerResult<()> {
        if self.disposed {
            return Err(ControllerError::Disposed);
        }
        Ok(())
    }

    // --- History ---

    /// Revert the last local action. Always false once disposed.
    pub fn undo(&mut self) -> bool {
        !self.disposed && self.history.undo()
    }

    pub fn redo(&mut self) -> bool {
        !self.disposed && self.history.redo()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    // --- Selection input ---

    pub fn select_element(&mut self, id: ElementId, additive: bool) -> ControllerResult<()> {
        self.ensure_live()?;
        self.selection.borrow_mut().select_element(id, additive)?;
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        if self.disposed {
            return;
        }
        self.selection.borrow_mut().clear_selection();
    }

    /// Start a marquee drag at a screen point.
    pub fn begin_marquee(&mut self, screen_point: Point) {
        if self.disposed {
            return;
        }
        let start = self.viewport.screen_to_canvas(screen_point);
        self.selection.borrow_mut().create_selection_box(start);
    }

    pub fn update_marquee(&mut self, screen_point: Point) -> ControllerResult<()> {
        self.ensure_live()?;
        let current = self.viewport.screen_to_canvas(screen_point);
        self.selection.borrow_mut().update_selection_box(current)?;
        Ok(())
    }

    pub fn end_marquee(&mut self) {
        if self.disposed {
            return;
        }
        self.selection.borrow_mut().remove_selection_box();
    }

    /// Abort the drag and restore the selection from before it began.
    pub fn cancel_marquee(&mut self) {
        if self.disposed {
            return;
        }
        self.selection.borrow_mut().cancel_selection_box();
    }

    // --- Viewport input ---

    pub fn view_state(&self) -> ViewState {
        self.viewport.view_state()
    }

    pub fn screen_to_canvas(&self, screen_point: Point) -> Point {
        self.viewport.screen_to_canvas(screen_point)
    }

    pub fn pan(&mut self, delta: Vec2) -> ControllerResult<()> {
        self.ensure_live()?;
        self.viewport.pan(delta)?;
        Ok(())
    }

    pub fn zoom_at(&mut self, screen_point: Point, factor: f64) -> ControllerResult<bool> {
        self.ensure_live()?;
        Ok(self.viewport.zoom_at(screen_point, factor)?)
    }

    pub fn set_view_state(&mut self, state: ViewState) -> ControllerResult<()> {
        self.ensure_live()?;
        self.viewport.set_view_state(state)?;
        Ok(())
    }

    pub fn recenter_on_element(&mut self, id: ElementId) -> bool {
        !self.disposed && self.viewport.recenter_on_element(id)
    }

    pub fn set_viewport_size(&mut self, size: Size) {
        self.viewport.set_viewport_size(size);
    }

    // --- Frame loop ---

    /// Render everything queued since the last frame and write the view
    /// state once it has settled.
    pub fn on_animation_frame(&mut self, now: Instant) -> FrameReport {
        let report = self.pipeline.borrow_mut().flush();
        self.autosave
            .borrow_mut()
            .maybe_save(now, &self.viewport.view_state());
        report
    }

    /// Flush pending view state and detach from the document.
    ///
    /// Safe to call more than once; also runs on drop.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.autosave.borrow_mut().flush(&self.viewport.view_state());
        self.subscriptions.clear();
        self.disposed = true;
        log::info!("Controller for {} disposed", self.config.document_id);
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn subscribe_document(
    document: &DocumentHandle,
    pipeline: &Rc<RefCell<RenderingPipeline>>,
    selection: &Rc<RefCell<SelectionModel>>,
) -> Subscription {
    let pipeline: Weak<RefCell<RenderingPipeline>> = Rc::downgrade(pipeline);
    let selection: Weak<RefCell<SelectionModel>> = Rc::downgrade(selection);

    document.subscribe(Box::new(move |changes: &ChangeSet| {
        if let Some(pipeline) = pipeline.upgrade() {
            pipeline.borrow_mut().on_document_change(changes);
        }
        // Deletions and regrouping can both break group atomicity.
        if !changes.touches_elements() {
            return;
        }
        if let Some(selection) = selection.upgrade() {
            match selection.try_borrow_mut() {
                Ok(mut selection) => {
                    selection.reconcile();
                }
                Err(_) => log::warn!("Selection busy; reconciled on next change"),
            }
        }
    }))
}

fn subscribe_selection(
    selection: &Rc<RefCell<SelectionModel>>,
    pipeline: &Rc<RefCell<RenderingPipeline>>,
) -> Subscription {
    let pipeline = Rc::downgrade(pipeline);
    selection.borrow().subscribe(move |event: &SelectionChanged| {
        if let Some(pipeline) = pipeline.upgrade() {
            pipeline.borrow_mut().on_selection_change(event);
        }
    })
}

fn subscribe_viewport(
    viewport: &Viewport,
    pipeline: &Rc<RefCell<RenderingPipeline>>,
    autosave: &Rc<RefCell<ViewStateAutoSave>>,
) -> Subscription {
    let pipeline = Rc::downgrade(pipeline);
    let autosave = Rc::downgrade(autosave);
    viewport.subscribe(move |event: &TransformChanged| {
        if let Some(pipeline) = pipeline.upgrade() {
            pipeline.borrow_mut().on_transform_change(event);
        }
        if let Some(autosave) = autosave.upgrade() {
            autosave.borrow_mut().mark_dirty(Instant::now());
        }
    })
}
