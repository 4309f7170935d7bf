//! Shared harness for renderer scenario tests: a scripted cell provider,
//! recording surfaces with shared op logs, and manual clock/scheduler.
#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use grid_config::GridConfig;
use grid_model::{
    Cell, CellProvider, CellRange, GridTheme, ProviderListener, ProviderUpdate, SubscriptionId,
};
use grid_render::{GridRenderer, GridRendererDeps, GridRendererOptions, GridSurfaces};
use grid_surface::{ManualClock, ManualScheduler, RecordedOp, RecordingFactory, RecordingSurface};
use grid_text::MetricTextEngine;

#[derive(Default)]
pub struct TestProvider {
    cells: RefCell<HashMap<(u32, u32), Cell>>,
    merges: RefCell<Vec<CellRange>>,
    listeners: RefCell<Vec<(SubscriptionId, ProviderListener)>>,
    next_subscription: RefCell<u64>,
    /// When set, merge queries answer through the bulk lookup instead of
    /// the per-cell probe.
    pub bulk_merges: std::cell::Cell<bool>,
}

impl TestProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_cell(&self, row: u32, col: u32, cell: Cell) {
        self.cells.borrow_mut().insert((row, col), cell);
    }

    pub fn set_text(&self, row: u32, col: u32, text: &str) {
        self.set_cell(row, col, Cell::with_text(text));
    }

    pub fn set_number(&self, row: u32, col: u32, n: f64) {
        self.set_cell(row, col, Cell::with_number(n));
    }

    pub fn add_merge(&self, range: CellRange) {
        self.merges.borrow_mut().push(range);
    }

    pub fn notify(&self, update: ProviderUpdate) {
        for (_, listener) in self.listeners.borrow().iter() {
            listener(update.clone());
        }
    }
}

impl CellProvider for TestProvider {
    fn get_cell(&self, row: u32, col: u32) -> Option<Cell> {
        self.cells.borrow().get(&(row, col)).cloned()
    }

    fn subscribe(&self, listener: ProviderListener) -> Option<SubscriptionId> {
        let mut next = self.next_subscription.borrow_mut();
        let id = SubscriptionId(*next);
        *next += 1;
        self.listeners.borrow_mut().push((id, listener));
        Some(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.listeners.borrow_mut().retain(|(sid, _)| *sid != id);
    }

    fn supports_merge_probe(&self) -> bool {
        !self.bulk_merges.get()
    }

    fn merged_range_at(&self, row: u32, col: u32) -> Option<CellRange> {
        if self.bulk_merges.get() {
            return None;
        }
        self.merges
            .borrow()
            .iter()
            .find(|m| m.contains(row, col))
            .copied()
    }

    fn merged_ranges_in(&self, range: &CellRange) -> Option<Vec<CellRange>> {
        if !self.bulk_merges.get() {
            return None;
        }
        Some(
            self.merges
                .borrow()
                .iter()
                .filter(|m| m.intersects(range))
                .copied()
                .collect(),
        )
    }
}

pub struct Harness {
    pub renderer: GridRenderer,
    pub provider: Rc<TestProvider>,
    pub clock: Rc<ManualClock>,
    pub scheduler: Rc<RefCell<ManualScheduler>>,
    pub bg_ops: grid_surface::recording::OpLog,
    pub content_ops: grid_surface::recording::OpLog,
    pub sel_ops: grid_surface::recording::OpLog,
}

impl Harness {
    /// Renderer attached at `width × height`, dpr 1, default theme.
    pub fn new(width: f64, height: f64) -> Self {
        Self::with_options(width, height, GridRendererOptions {
            config: GridConfig::default(),
            theme: GridTheme::default(),
            ..GridRendererOptions::default()
        })
    }

    pub fn with_images(
        width: f64,
        height: f64,
        resolver: Rc<dyn grid_image::ImageResolver>,
        decoder: Box<dyn grid_image::BitmapDecoder>,
    ) -> Self {
        Self::build(width, height, GridRendererOptions::default(), Some(resolver), Some(decoder))
    }

    pub fn with_options(width: f64, height: f64, options: GridRendererOptions) -> Self {
        Self::build(width, height, options, None, None)
    }

    fn build(
        width: f64,
        height: f64,
        mut options: GridRendererOptions,
        image_resolver: Option<Rc<dyn grid_image::ImageResolver>>,
        bitmap_decoder: Option<Box<dyn grid_image::BitmapDecoder>>,
    ) -> Self {
        // Assertions read perf counters, so collection is always on here.
        options.config.perf_stats = true;
        let provider = Rc::new(TestProvider::new());
        let clock = Rc::new(ManualClock::new());
        let scheduler = Rc::new(RefCell::new(ManualScheduler::new()));

        let background = RecordingSurface::new(width, height, 1.0);
        let content = RecordingSurface::new(width, height, 1.0);
        let selection = RecordingSurface::new(width, height, 1.0);
        let bg_ops = background.log();
        let content_ops = content.log();
        let sel_ops = selection.log();

        let mut renderer = GridRenderer::new(
            GridRendererDeps {
                provider: Rc::clone(&provider) as Rc<dyn CellProvider>,
                text_engine: Rc::new(MetricTextEngine::new()),
                clock: Rc::clone(&clock) as Rc<dyn grid_surface::Clock>,
                surface_factory: Box::new(RecordingFactory),
                frame_scheduler: Some(Box::new(Rc::clone(&scheduler))),
                image_resolver,
                bitmap_decoder,
            },
            options,
        );
        renderer
            .attach(GridSurfaces {
                background: Box::new(background),
                content: Box::new(content),
                selection: Box::new(selection),
            })
            .expect("recording surfaces attach");
        renderer.resize(width, height, 1.0);
        renderer.render_immediately();
        Self {
            renderer,
            provider,
            clock,
            scheduler,
            bg_ops,
            content_ops,
            sel_ops,
        }
    }

    pub fn clear_logs(&self) {
        self.bg_ops.borrow_mut().clear();
        self.content_ops.borrow_mut().clear();
        self.sel_ops.borrow_mut().clear();
    }
}

/// All ops of one log matching a predicate.
pub fn find_ops<F: Fn(&RecordedOp) -> bool>(
    log: &grid_surface::recording::OpLog,
    pred: F,
) -> Vec<RecordedOp> {
    log.borrow().iter().filter(|op| pred(op)).cloned().collect()
}
