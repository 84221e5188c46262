//! Batched, one-way rendering of document, selection and view changes.
//!
//! Notifications only mark entities dirty. Nothing is drawn until
//! [`RenderingPipeline::flush`] runs on the next animation frame, at which
//! point each dirty entity is resolved against the current document and
//! dispatched to its renderer exactly once.

use crate::batch::{EntityKey, OverlayKey, RenderBatch};
use crate::renderer::{
    EdgeGeometry, EdgeRenderer, Overlay, OverlayRenderer, OverlayStyle, RenderError, RenderHandle,
    RenderResult, RendererRegistry, Surface,
};
use kurbo::{Affine, Rect};
use std::cell::Cell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use weaveboard_core::document::{ChangeKind, ChangeSet, DocumentHandle, EntityId};
use weaveboard_core::element::{Element, ElementId, ElementKind};
use weaveboard_core::selection::SelectionChanged;
use weaveboard_core::viewport::TransformChanged;

/// Asks the host for an animation frame.
pub trait FrameScheduler {
    fn request_frame(&mut self);
}

/// Scheduler that only counts requests; the host drives frames itself.
#[derive(Debug, Clone, Default)]
pub struct ManualFrameScheduler {
    requests: Rc<Cell<usize>>,
}

impl ManualFrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames requested so far.
    pub fn requests(&self) -> usize {
        self.requests.get()
    }
}

impl FrameScheduler for ManualFrameScheduler {
    fn request_frame(&mut self) {
        self.requests.set(self.requests.get() + 1);
    }
}

/// Every renderer the pipeline dispatches to.
pub struct PipelineRenderers {
    pub elements: RendererRegistry,
    pub edges: Box<dyn EdgeRenderer>,
    pub overlays: Box<dyn OverlayRenderer>,
    pub surface: Box<dyn Surface>,
}

/// What one flush did.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FrameReport {
    pub frame: u64,
    pub unmounted: usize,
    pub mounted: usize,
    pub updated: usize,
    pub transform_applied: bool,
    /// Entities whose renderer failed; the rest of the frame still ran.
    pub failures: Vec<(EntityKey, RenderError)>,
    pub surface_error: Option<RenderError>,
}

impl FrameReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.surface_error.is_none()
    }

    /// Total renderer operations performed.
    pub fn ops(&self) -> usize {
        self.unmounted + self.mounted + self.updated
    }
}

#[derive(Debug, Clone)]
struct Mounted {
    handle: RenderHandle,
    /// Kind the element was mounted with, so it is unmounted by the same renderer.
    kind: Option<ElementKind>,
}

/// Current content for an entity key.
enum Resolved {
    Element(Element),
    Edge(EdgeGeometry),
    Overlay(Overlay),
}

pub struct RenderingPipeline {
    document: DocumentHandle,
    renderers: PipelineRenderers,
    scheduler: Box<dyn FrameScheduler>,
    style: OverlayStyle,
    batch: RenderBatch,
    frame_requested: bool,
    mounted: HashMap<EntityKey, Mounted>,
    /// Selection as last announced, used to resolve overlays.
    selected: HashSet<ElementId>,
    marquee: Option<Rect>,
    frame: u64,
}

impl RenderingPipeline {
    pub fn new(
        document: DocumentHandle,
        renderers: PipelineRenderers,
        scheduler: Box<dyn FrameScheduler>,
    ) -> Self {
        Self {
            document,
            renderers,
            scheduler,
            style: OverlayStyle::default(),
            batch: RenderBatch::new(),
            frame_requested: false,
            mounted: HashMap::new(),
            selected: HashSet::new(),
            marquee: None,
            frame: 0,
        }
    }

    pub fn with_overlay_style(mut self, style: OverlayStyle) -> Self {
        self.style = style;
        self
    }

    pub fn overlay_style(&self) -> &OverlayStyle {
        &self.style
    }

    /// Changes waiting for the next frame.
    pub fn pending(&self) -> &RenderBatch {
        &self.batch
    }

    pub fn is_mounted(&self, key: &EntityKey) -> bool {
        self.mounted.contains_key(key)
    }

    pub fn mounted_count(&self) -> usize {
        self.mounted.len()
    }

    /// Queue every entity in the document for its first render.
    pub fn mount_all(&mut self) {
        for element in self.document.get_all() {
            self.record(EntityKey::Element(element.id), ChangeKind::Created);
        }
        for edge in self.document.get_all_edges() {
            self.record(EntityKey::Edge(edge.id), ChangeKind::Created);
        }
        let selected: Vec<ElementId> = self.selected.iter().copied().collect();
        for id in selected {
            self.record(EntityKey::Overlay(OverlayKey::Selection(id)), ChangeKind::Created);
        }
        self.record(EntityKey::Overlay(OverlayKey::GroupBox), ChangeKind::Updated);
        self.record(EntityKey::Overlay(OverlayKey::Marquee), ChangeKind::Updated);
    }

    /// Queue a committed document change, local or remote.
    pub fn on_document_change(&mut self, changes: &ChangeSet) {
        let mut selection_touched = false;

        for event in &changes.events {
            self.record(event.entity.into(), event.kind);

            if let EntityId::Element(id) = event.entity {
                // Connectors follow their endpoints.
                for edge in self.document.edges_for_element(id) {
                    self.record(EntityKey::Edge(edge.id), ChangeKind::Updated);
                }
                if self.selected.contains(&id) {
                    self.record(EntityKey::Overlay(OverlayKey::Selection(id)), ChangeKind::Updated);
                    selection_touched = true;
                }
            }
        }

        if selection_touched {
            self.record(EntityKey::Overlay(OverlayKey::GroupBox), ChangeKind::Updated);
        }
    }

    /// Queue overlay changes for a new selection.
    pub fn on_selection_change(&mut self, event: &SelectionChanged) {
        let next: HashSet<ElementId> = event.selected.iter().copied().collect();

        let removed: Vec<ElementId> = self.selected.difference(&next).copied().collect();
        let added: Vec<ElementId> = next.difference(&self.selected).copied().collect();
        for id in removed {
            self.record(EntityKey::Overlay(OverlayKey::Selection(id)), ChangeKind::Deleted);
        }
        for id in added {
            self.record(EntityKey::Overlay(OverlayKey::Selection(id)), ChangeKind::Created);
        }
        if next != self.selected {
            self.record(EntityKey::Overlay(OverlayKey::GroupBox), ChangeKind::Updated);
        }
        self.selected = next;

        if event.marquee != self.marquee {
            let kind = if event.marquee.is_some() {
                ChangeKind::Updated
            } else {
                ChangeKind::Deleted
            };
            self.marquee = event.marquee;
            self.record(EntityKey::Overlay(OverlayKey::Marquee), kind);
        }
    }

    /// Queue a surface transform. Only the last one per frame is applied.
    pub fn on_transform_change(&mut self, event: &TransformChanged) {
        self.batch.set_transform(event.transform);
        self.request_frame();
    }

    fn record(&mut self, key: EntityKey, kind: ChangeKind) {
        self.batch.record(key, kind);
        self.request_frame();
    }

    fn request_frame(&mut self) {
        if !self.frame_requested {
            self.frame_requested = true;
            self.scheduler.request_frame();
        }
    }

    /// Apply everything queued since the last frame.
    pub fn flush(&mut self) -> FrameReport {
        self.frame_requested = false;
        self.frame += 1;
        let mut report = FrameReport {
            frame: self.frame,
            ..FrameReport::default()
        };

        let (transform, ops) = self.batch.drain();
        if let Some(transform) = transform {
            self.apply_transform(transform, &mut report);
        }

        // Resolve against the current document, then dispatch by phase.
        let mut unmounts = Vec::new();
        let mut mounts = Vec::new();
        let mut updates = Vec::new();
        for (key, kind) in ops {
            let resolved = self.resolve(&key);
            let mounted = self.mounted.contains_key(&key);
            match (kind, resolved) {
                (_, None) | (ChangeKind::Deleted, _) => {
                    if mounted {
                        unmounts.push(key);
                    }
                }
                (ChangeKind::Created, Some(content)) => {
                    if mounted {
                        unmounts.push(key);
                    }
                    mounts.push((key, content));
                }
                (ChangeKind::Updated, Some(content)) => {
                    if mounted {
                        updates.push((key, content));
                    } else {
                        mounts.push((key, content));
                    }
                }
            }
        }

        for key in unmounts {
            self.unmount(key, &mut report);
        }
        for (key, content) in mounts {
            self.mount(key, &content, &mut report);
        }
        for (key, content) in updates {
            self.update(key, &content, &mut report);
        }

        if !report.is_clean() {
            log::warn!(
                "Frame {} finished with {} renderer failures",
                report.frame,
                report.failures.len()
            );
        }
        report
    }

    fn apply_transform(&mut self, transform: Affine, report: &mut FrameReport) {
        match self.renderers.surface.set_transform(transform) {
            Ok(()) => report.transform_applied = true,
            Err(e) => {
                log::warn!("Failed to apply surface transform: {}", e);
                report.surface_error = Some(e);
            }
        }
    }

    fn resolve(&self, key: &EntityKey) -> Option<Resolved> {
        match *key {
            EntityKey::Element(id) => self.document.get(id).map(Resolved::Element),
            EntityKey::Edge(id) => {
                let edge = self.document.get_edge(id)?;
                let source = self.document.get(edge.source)?.bounds();
                let target = self.document.get(edge.target)?.bounds();
                Some(Resolved::Edge(EdgeGeometry { edge, source, target }))
            }
            EntityKey::Overlay(OverlayKey::Selection(id)) => {
                if !self.selected.contains(&id) {
                    return None;
                }
                let bounds = self.document.get(id)?.bounds();
                Some(Resolved::Overlay(Overlay::Selection { element: id, bounds }))
            }
            EntityKey::Overlay(OverlayKey::GroupBox) => {
                let bounds: Vec<Rect> = self
                    .selected
                    .iter()
                    .filter_map(|id| self.document.get(*id))
                    .map(|element| element.bounds())
                    .collect();
                // A single element already has its own outline.
                if bounds.len() < 2 {
                    return None;
                }
                let bounds = bounds.into_iter().reduce(|acc, b| acc.union(b))?;
                Some(Resolved::Overlay(Overlay::GroupBox { bounds }))
            }
            EntityKey::Overlay(OverlayKey::Marquee) => {
                self.marquee.map(|rect| Resolved::Overlay(Overlay::Marquee { rect }))
            }
        }
    }

    fn mount(&mut self, key: EntityKey, content: &Resolved, report: &mut FrameReport) {
        let style = self.style;
        let result = match content {
            Resolved::Element(element) => self
                .renderers
                .elements
                .get_mut(&element.kind)
                .and_then(|renderer| renderer.mount(element))
                .map(|handle| Mounted {
                    handle,
                    kind: Some(element.kind.clone()),
                }),
            Resolved::Edge(geometry) => self
                .renderers
                .edges
                .mount(geometry)
                .map(|handle| Mounted { handle, kind: None }),
            Resolved::Overlay(overlay) => self
                .renderers
                .overlays
                .mount(overlay, &style)
                .map(|handle| Mounted { handle, kind: None }),
        };

        match result {
            Ok(mounted) => {
                self.mounted.insert(key, mounted);
                report.mounted += 1;
            }
            Err(e) => fail(report, key, e),
        }
    }

    fn update(&mut self, key: EntityKey, content: &Resolved, report: &mut FrameReport) {
        let Some(mounted) = self.mounted.get(&key).cloned() else {
            return;
        };

        // A kind change moves the element to another renderer.
        if let Resolved::Element(element) = content {
            if mounted.kind.as_ref() != Some(&element.kind) {
                self.unmount(key, report);
                self.mount(key, content, report);
                return;
            }
        }

        let style = self.style;
        let result = match content {
            Resolved::Element(element) => self
                .renderers
                .elements
                .get_mut(&element.kind)
                .and_then(|renderer| renderer.update(element, mounted.handle)),
            Resolved::Edge(geometry) => self.renderers.edges.update(geometry, mounted.handle),
            Resolved::Overlay(overlay) => self.renderers.overlays.update(overlay, &style, mounted.handle),
        };

        match result {
            Ok(()) => report.updated += 1,
            Err(e) => fail(report, key, e),
        }
    }

    fn unmount(&mut self, key: EntityKey, report: &mut FrameReport) {
        // Forgotten even if the renderer fails, so a later create mounts fresh.
        let Some(mounted) = self.mounted.remove(&key) else {
            return;
        };

        let result: RenderResult<()> = match (key, &mounted.kind) {
            (EntityKey::Element(_), Some(kind)) => self
                .renderers
                .elements
                .get_mut(kind)
                .and_then(|renderer| renderer.unmount(mounted.handle)),
            (EntityKey::Element(id), None) => Err(RenderError::RenderFailed(format!(
                "element {} mounted without a kind",
                id
            ))),
            (EntityKey::Edge(_), _) => self.renderers.edges.unmount(mounted.handle),
            (EntityKey::Overlay(_), _) => self.renderers.overlays.unmount(mounted.handle),
        };

        match result {
            Ok(()) => report.unmounted += 1,
            Err(e) => fail(report, key, e),
        }
    }
}

fn fail(report: &mut FrameReport, key: EntityKey, error: RenderError) {
    log::warn!("Renderer failed for {:?}: {}", key, error);
    report.failures.push((key, error));
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::{Point, Size, Vec2};
    use std::cell::RefCell;
    use weaveboard_core::crdt::CrdtDocument;
    use weaveboard_core::document::{ChangeEvent, DocumentAccessor, Mutation, Origin};
    use weaveboard_core::element::Edge;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Mount(EntityKey),
        Update(EntityKey),
        Unmount(RenderHandle),
        Transform(Affine),
    }

    type Log = Rc<RefCell<Vec<Call>>>;

    struct Recorder {
        log: Log,
        next: u64,
        fail_kind: Option<&'static str>,
    }

    impl Recorder {
        fn new(log: &Log) -> Self {
            Self {
                log: log.clone(),
                next: 0,
                fail_kind: None,
            }
        }

        fn handle(&mut self) -> RenderHandle {
            self.next += 1;
            RenderHandle(self.next)
        }
    }

    impl crate::renderer::ElementRenderer for Recorder {
        fn mount(&mut self, element: &Element) -> RenderResult<RenderHandle> {
            if self.fail_kind == Some(element.kind.as_str()) {
                return Err(RenderError::RenderFailed("broken".to_string()));
            }
            self.log.borrow_mut().push(Call::Mount(EntityKey::Element(element.id)));
            Ok(self.handle())
        }

        fn update(&mut self, element: &Element, _handle: RenderHandle) -> RenderResult<()> {
            self.log.borrow_mut().push(Call::Update(EntityKey::Element(element.id)));
            Ok(())
        }

        fn unmount(&mut self, handle: RenderHandle) -> RenderResult<()> {
            self.log.borrow_mut().push(Call::Unmount(handle));
            Ok(())
        }
    }

    impl EdgeRenderer for Recorder {
        fn mount(&mut self, geometry: &EdgeGeometry) -> RenderResult<RenderHandle> {
            self.log.borrow_mut().push(Call::Mount(EntityKey::Edge(geometry.edge.id)));
            Ok(self.handle())
        }

        fn update(&mut self, geometry: &EdgeGeometry, _handle: RenderHandle) -> RenderResult<()> {
            self.log.borrow_mut().push(Call::Update(EntityKey::Edge(geometry.edge.id)));
            Ok(())
        }

        fn unmount(&mut self, handle: RenderHandle) -> RenderResult<()> {
            self.log.borrow_mut().push(Call::Unmount(handle));
            Ok(())
        }
    }

    fn overlay_key(overlay: &Overlay) -> EntityKey {
        EntityKey::Overlay(match overlay {
            Overlay::Selection { element, .. } => OverlayKey::Selection(*element),
            Overlay::GroupBox { .. } => OverlayKey::GroupBox,
            Overlay::Marquee { .. } => OverlayKey::Marquee,
        })
    }

    impl OverlayRenderer for Recorder {
        fn mount(&mut self, overlay: &Overlay, _style: &OverlayStyle) -> RenderResult<RenderHandle> {
            self.log.borrow_mut().push(Call::Mount(overlay_key(overlay)));
            Ok(self.handle())
        }

        fn update(&mut self, overlay: &Overlay, _style: &OverlayStyle, _handle: RenderHandle) -> RenderResult<()> {
            self.log.borrow_mut().push(Call::Update(overlay_key(overlay)));
            Ok(())
        }

        fn unmount(&mut self, handle: RenderHandle) -> RenderResult<()> {
            self.log.borrow_mut().push(Call::Unmount(handle));
            Ok(())
        }
    }

    impl Surface for Recorder {
        fn set_transform(&mut self, transform: Affine) -> RenderResult<()> {
            self.log.borrow_mut().push(Call::Transform(transform));
            Ok(())
        }
    }

    struct Fixture {
        doc: Rc<CrdtDocument>,
        pipeline: RenderingPipeline,
        log: Log,
        scheduler: ManualFrameScheduler,
    }

    fn fixture_with(fail_kind: Option<&'static str>) -> Fixture {
        let _ = env_logger::builder().is_test(true).try_init();
        let doc = Rc::new(CrdtDocument::new());
        let handle: DocumentHandle = doc.clone();
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let mut elements = Recorder::new(&log);
        elements.fail_kind = fail_kind;
        let renderers = PipelineRenderers {
            elements: RendererRegistry::new().with_fallback(Box::new(elements)),
            edges: Box::new(Recorder::new(&log)),
            overlays: Box::new(Recorder::new(&log)),
            surface: Box::new(Recorder::new(&log)),
        };
        let scheduler = ManualFrameScheduler::new();
        let pipeline = RenderingPipeline::new(handle, renderers, Box::new(scheduler.clone()));
        Fixture {
            doc,
            pipeline,
            log,
            scheduler,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(None)
    }

    fn element(x: f64) -> Element {
        Element::new("card", Point::new(x, 0.0), Size::new(10.0, 10.0))
    }

    fn local(events: &[(EntityId, ChangeKind)]) -> ChangeSet {
        ChangeSet {
            origin: Origin::Local,
            commit: None,
            events: events
                .iter()
                .map(|(entity, kind)| ChangeEvent {
                    entity: *entity,
                    kind: *kind,
                    origin: Origin::Local,
                })
                .collect(),
        }
    }

    /// Commit and forward the resulting change set, like the controller does.
    fn commit(f: &mut Fixture, mutation: Mutation) {
        let captured = Rc::new(RefCell::new(None));
        let sink = captured.clone();
        let sub = f.doc.subscribe(Box::new(move |changes: &ChangeSet| {
            *sink.borrow_mut() = Some(changes.clone());
        }));
        f.doc.commit(mutation).expect("commit");
        sub.unsubscribe();
        if let Some(changes) = captured.borrow_mut().take() {
            f.pipeline.on_document_change(&changes);
        }
    }

    fn calls(f: &Fixture) -> Vec<Call> {
        f.log.borrow_mut().drain(..).collect()
    }

    #[test]
    fn test_create_update_delete_flushes_one_delete() {
        let mut f = fixture();
        let a = element(0.0);
        commit(&mut f, Mutation::new().upsert_element(a.clone()));
        f.pipeline.flush();
        let mount_handle = RenderHandle(1);
        calls(&f);

        let id = EntityId::Element(a.id);
        f.pipeline.on_document_change(&local(&[(id, ChangeKind::Created)]));
        f.pipeline.on_document_change(&local(&[(id, ChangeKind::Updated)]));
        f.doc.commit(Mutation::new().remove_element(a.id)).expect("remove");
        f.pipeline.on_document_change(&local(&[(id, ChangeKind::Deleted)]));

        let report = f.pipeline.flush();
        assert_eq!(calls(&f), vec![Call::Unmount(mount_handle)]);
        assert_eq!(report.ops(), 1);
        assert!(!f.pipeline.is_mounted(&EntityKey::Element(a.id)));
    }

    #[test]
    fn test_created_and_deleted_within_frame_never_mounts() {
        let mut f = fixture();
        let a = element(0.0);
        commit(&mut f, Mutation::new().upsert_element(a.clone()));
        commit(&mut f, Mutation::new().remove_element(a.id));

        let report = f.pipeline.flush();
        assert!(calls(&f).is_empty());
        assert_eq!(report.ops(), 0);
    }

    #[test]
    fn test_one_frame_request_per_batch() {
        let mut f = fixture();
        commit(&mut f, Mutation::new().upsert_element(element(0.0)));
        commit(&mut f, Mutation::new().upsert_element(element(20.0)));
        assert_eq!(f.scheduler.requests(), 1);

        f.pipeline.flush();
        commit(&mut f, Mutation::new().upsert_element(element(40.0)));
        assert_eq!(f.scheduler.requests(), 2);
    }

    #[test]
    fn test_update_for_missing_entity_resolves_to_delete() {
        let mut f = fixture();
        let a = element(0.0);
        commit(&mut f, Mutation::new().upsert_element(a.clone()));
        f.pipeline.flush();
        calls(&f);

        // The element vanished before the frame; the stale update unmounts it.
        f.doc.commit(Mutation::new().remove_element(a.id)).expect("remove");
        f.pipeline.on_document_change(&local(&[(EntityId::Element(a.id), ChangeKind::Updated)]));
        f.pipeline.flush();

        assert_eq!(calls(&f), vec![Call::Unmount(RenderHandle(1))]);
    }

    #[test]
    fn test_create_for_mounted_entity_replaces() {
        let mut f = fixture();
        let a = element(0.0);
        let b = element(20.0);
        commit(&mut f, Mutation::new().upsert_element(a.clone()));
        f.pipeline.flush();
        calls(&f);

        f.pipeline.on_document_change(&local(&[(EntityId::Element(a.id), ChangeKind::Created)]));
        commit(&mut f, Mutation::new().upsert_element(b.clone()));
        f.pipeline.flush();

        let log = calls(&f);
        assert_eq!(log.len(), 3);
        assert_eq!(log[0], Call::Unmount(RenderHandle(1)));
        assert!(log[1..].contains(&Call::Mount(EntityKey::Element(a.id))));
        assert!(log[1..].contains(&Call::Mount(EntityKey::Element(b.id))));
        assert!(f.pipeline.is_mounted(&EntityKey::Element(a.id)));
    }

    #[test]
    fn test_renderer_failure_is_isolated() {
        let mut f = fixture_with(Some("broken"));
        let good = element(0.0);
        let bad = Element::new("broken", Point::new(50.0, 0.0), Size::new(10.0, 10.0));
        commit(&mut f, Mutation::new().upsert_element(good.clone()).upsert_element(bad.clone()));

        let report = f.pipeline.flush();

        assert_eq!(report.mounted, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, EntityKey::Element(bad.id));
        assert!(f.pipeline.is_mounted(&EntityKey::Element(good.id)));
        assert!(!f.pipeline.is_mounted(&EntityKey::Element(bad.id)));
    }

    #[test]
    fn test_unregistered_kind_without_fallback() {
        let doc = Rc::new(CrdtDocument::new());
        let handle: DocumentHandle = doc.clone();
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let renderers = PipelineRenderers {
            elements: RendererRegistry::new().with_renderer("card", Box::new(Recorder::new(&log))),
            edges: Box::new(Recorder::new(&log)),
            overlays: Box::new(Recorder::new(&log)),
            surface: Box::new(Recorder::new(&log)),
        };
        let mut pipeline = RenderingPipeline::new(handle, renderers, Box::new(ManualFrameScheduler::new()));
        let image = Element::new("image", Point::ZERO, Size::new(5.0, 5.0));
        let card = element(20.0);
        doc.commit(Mutation::new().upsert_element(image.clone()).upsert_element(card.clone()))
            .expect("commit");

        pipeline.mount_all();
        let report = pipeline.flush();

        assert_eq!(
            report.failures,
            vec![(EntityKey::Element(image.id), RenderError::NoRenderer("image".into()))]
        );
        assert!(pipeline.is_mounted(&EntityKey::Element(card.id)));
    }

    #[test]
    fn test_deletes_run_before_creates_and_updates() {
        let mut f = fixture();
        let a = element(0.0);
        let b = element(20.0);
        commit(&mut f, Mutation::new().upsert_element(a.clone()).upsert_element(b.clone()));
        f.pipeline.flush();
        calls(&f);

        let c = element(40.0);
        commit(
            &mut f,
            Mutation::new()
                .upsert_element(c.clone())
                .upsert_element(a.translated(Vec2::new(1.0, 0.0)))
                .remove_element(b.id),
        );
        f.pipeline.flush();

        let log = calls(&f);
        assert_eq!(log.len(), 3);
        assert!(matches!(log[0], Call::Unmount(_)));
        assert_eq!(log[1], Call::Mount(EntityKey::Element(c.id)));
        assert_eq!(log[2], Call::Update(EntityKey::Element(a.id)));
    }

    #[test]
    fn test_element_change_refreshes_edges() {
        let mut f = fixture();
        let a = element(0.0);
        let b = element(100.0);
        let edge = Edge::new(a.id, b.id);
        commit(
            &mut f,
            Mutation::new()
                .upsert_element(a.clone())
                .upsert_element(b.clone())
                .upsert_edge(edge.clone()),
        );
        f.pipeline.flush();
        calls(&f);

        commit(&mut f, Mutation::new().upsert_element(a.translated(Vec2::new(0.0, 30.0))));
        f.pipeline.flush();

        let log = calls(&f);
        assert!(log.contains(&Call::Update(EntityKey::Element(a.id))));
        assert!(log.contains(&Call::Update(EntityKey::Edge(edge.id))));
    }

    #[test]
    fn test_selection_overlays() {
        let mut f = fixture();
        let a = element(0.0);
        let b = element(100.0);
        commit(&mut f, Mutation::new().upsert_element(a.clone()).upsert_element(b.clone()));
        f.pipeline.flush();
        calls(&f);

        let mut selected = vec![a.id, b.id];
        selected.sort();
        f.pipeline.on_selection_change(&SelectionChanged {
            selected,
            marquee: None,
        });
        f.pipeline.flush();
        let log = calls(&f);
        assert!(log.contains(&Call::Mount(EntityKey::Overlay(OverlayKey::Selection(a.id)))));
        assert!(log.contains(&Call::Mount(EntityKey::Overlay(OverlayKey::Selection(b.id)))));
        assert!(log.contains(&Call::Mount(EntityKey::Overlay(OverlayKey::GroupBox))));

        // Moving a selected element refreshes its outline and the group box.
        commit(&mut f, Mutation::new().upsert_element(a.translated(Vec2::new(5.0, 5.0))));
        f.pipeline.flush();
        let log = calls(&f);
        assert!(log.contains(&Call::Update(EntityKey::Overlay(OverlayKey::Selection(a.id)))));
        assert!(log.contains(&Call::Update(EntityKey::Overlay(OverlayKey::GroupBox))));

        f.pipeline.on_selection_change(&SelectionChanged {
            selected: vec![b.id],
            marquee: None,
        });
        let report = f.pipeline.flush();
        assert_eq!(report.unmounted, 2);
        assert!(!f.pipeline.is_mounted(&EntityKey::Overlay(OverlayKey::GroupBox)));
    }

    #[test]
    fn test_marquee_overlay_lifecycle() {
        let mut f = fixture();
        let rect = Rect::new(0.0, 0.0, 10.0, 10.0);
        f.pipeline.on_selection_change(&SelectionChanged {
            selected: Vec::new(),
            marquee: Some(rect),
        });
        f.pipeline.flush();
        f.pipeline.on_selection_change(&SelectionChanged {
            selected: Vec::new(),
            marquee: Some(rect.inflate(5.0, 5.0)),
        });
        f.pipeline.flush();
        f.pipeline.on_selection_change(&SelectionChanged {
            selected: Vec::new(),
            marquee: None,
        });
        f.pipeline.flush();

        let marquee = EntityKey::Overlay(OverlayKey::Marquee);
        assert_eq!(
            calls(&f),
            vec![Call::Mount(marquee), Call::Update(marquee), Call::Unmount(RenderHandle(1))]
        );
    }

    #[test]
    fn test_transform_changes_coalesce() {
        let mut f = fixture();
        for scale in [1.5, 2.0, 3.0] {
            f.pipeline.on_transform_change(&TransformChanged {
                view: weaveboard_core::viewport::ViewState::new(scale, 0.0, 0.0),
                transform: Affine::scale(scale),
            });
        }
        assert_eq!(f.scheduler.requests(), 1);

        let report = f.pipeline.flush();
        assert!(report.transform_applied);
        assert_eq!(calls(&f), vec![Call::Transform(Affine::scale(3.0))]);
    }

    #[test]
    fn test_mount_all() {
        let mut f = fixture();
        let a = element(0.0);
        let b = element(50.0);
        f.doc
            .commit(
                Mutation::new()
                    .upsert_element(a.clone())
                    .upsert_element(b.clone())
                    .upsert_edge(Edge::new(a.id, b.id)),
            )
            .expect("commit");

        f.pipeline.mount_all();
        let report = f.pipeline.flush();

        assert_eq!(report.mounted, 3);
        assert_eq!(f.pipeline.mounted_count(), 3);
        let log = calls(&f);
        assert!(matches!(log[2], Call::Mount(EntityKey::Edge(_))));
    }
}
