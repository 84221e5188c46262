//! Headless demo: two replicas editing one board.
//!
//! Pass a JSON config path as the first argument to override defaults. Set
//! `RUST_LOG=debug` to see every renderer call.

use kurbo::{Point, Size, Vec2};
use std::rc::Rc;
use std::time::{Duration, Instant};
use weaveboard_app::{Controller, ControllerConfig, logging_renderers};
use weaveboard_core::crdt::CrdtDocument;
use weaveboard_core::document::{DocumentAccessor, DocumentHandle, Mutation};
use weaveboard_core::element::Element;
use weaveboard_core::storage::{FileViewStateStore, MemoryViewStateStore, ViewStateStore};
use weaveboard_render::ManualFrameScheduler;

#[cfg(feature = "native")]
fn main() {
    env_logger::init();
    log::info!("Starting Weaveboard demo");

    if let Err(e) = run() {
        log::error!("Demo failed: {}", e);
        std::process::exit(1);
    }
}

#[cfg(not(feature = "native"))]
fn main() {
    eprintln!("Native feature not enabled. Use `cargo run --features native`");
}

fn load_config() -> ControllerConfig {
    let Some(path) = std::env::args().nth(1) else {
        return ControllerConfig::default().with_document_id("demo-board");
    };
    match std::fs::read_to_string(&path).map(|text| ControllerConfig::from_json(&text)) {
        Ok(Ok(config)) => config,
        Ok(Err(e)) => {
            log::warn!("Invalid config {}: {}; using defaults", path, e);
            ControllerConfig::default()
        }
        Err(e) => {
            log::warn!("Cannot read config {}: {}; using defaults", path, e);
            ControllerConfig::default()
        }
    }
}

fn view_state_store() -> Rc<dyn ViewStateStore> {
    match FileViewStateStore::default_location() {
        Ok(store) => Rc::new(store),
        Err(e) => {
            log::warn!("File view-state store unavailable ({}); state will not persist", e);
            Rc::new(MemoryViewStateStore::new())
        }
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config();
    let local = Rc::new(CrdtDocument::new());
    let remote = CrdtDocument::new();
    let handle: DocumentHandle = local.clone();

    let mut controller = Controller::new(
        handle,
        logging_renderers(),
        Box::new(ManualFrameScheduler::new()),
        view_state_store(),
        config,
    )?;
    let mut now = Instant::now();

    // Local edits
    let a = controller.add_element(Element::new("sticky", Point::new(0.0, 0.0), Size::new(120.0, 80.0)))?;
    let b = controller.add_element(Element::new("sticky", Point::new(200.0, 0.0), Size::new(120.0, 80.0)))?;
    controller.connect(a, b, Some("next".to_string()))?;
    controller.select_element(a, false)?;
    controller.select_element(b, true)?;
    controller.group_selection()?;
    controller.move_selection(Vec2::new(40.0, 20.0))?;
    report_frame(&mut controller, &mut now);

    // A collaborator adds a card; it renders but is not undoable.
    remote.import_remote(&local.export_snapshot())?;
    remote.commit(Mutation::new().upsert_element(Element::new(
        "image",
        Point::new(0.0, 300.0),
        Size::new(200.0, 150.0),
    )))?;
    local.import_remote(&remote.export_updates(&local.version()))?;
    report_frame(&mut controller, &mut now);

    controller.zoom_at(Point::new(640.0, 360.0), 1.5)?;
    controller.recenter_on_element(b);
    controller.undo();
    report_frame(&mut controller, &mut now);

    log::info!(
        "Document has {} elements, {} edges; undo available: {}, redo available: {}",
        local.get_all().len(),
        local.get_all_edges().len(),
        controller.can_undo(),
        controller.can_redo()
    );
    controller.dispose();
    Ok(())
}

fn report_frame(controller: &mut Controller, now: &mut Instant) {
    *now += Duration::from_millis(16);
    let report = controller.on_animation_frame(*now);
    log::info!(
        "Frame {}: {} mounted, {} updated, {} unmounted, {} failures",
        report.frame,
        report.mounted,
        report.updated,
        report.unmounted,
        report.failures.len()
    );
}
