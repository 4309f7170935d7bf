//! The renderer: state, public mutators, and geometry queries.
//!
//! Ownership model: the renderer exclusively owns the three layer surfaces,
//! the offscreen blit scratch, the dirty trackers, the scroll manager, the
//! merged-index snapshot, the image cache and the per-frame scratch
//! buffers. It holds a shared handle to the `CellProvider` plus a
//! subscription token released on `destroy`. All methods require logical
//! exclusive access (single-threaded cooperative scheduling); there are no
//! locks anywhere in the paint path.
//!
//! Mutators follow one discipline: update state immediately (axis sizes and
//! scroll alignment never wait for a frame), mark the affected layers
//! dirty, and coalesce painting into the next frame tick. After `destroy`
//! every public method is a no-op.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use ahash::AHashMap;
use grid_axis::{AxisError, VariableSizeAxis, ViewportState, VirtualScrollManager};
use grid_config::GridConfig;
use grid_image::{BitmapDecoder, ImageCache, ImageCacheConfig, ImageError, ImageResolver};
use grid_merge::MergedCellIndex;
use grid_model::{
    Cell, CellCoord, CellProvider, CellRange, GridTheme, LruCache, ProviderUpdate, PxRect,
    ReferenceHighlight, RemotePresence, SelectionState, SubscriptionId,
};
use grid_surface::{
    setup_backing_store, Bitmap, Clock, FrameScheduler, Surface, SurfaceError, SurfaceFactory,
};
use grid_text::TextLayoutEngine;
use tracing::debug;

use crate::cells::CellFlags;
use crate::dirty::DirtyRegionTracker;
use crate::perf::GridPerfStats;
use crate::quadrant::quadrants;
use crate::snap::align_to_device_pixels;
use crate::subscribe::{SubscribeOptions, ViewportListener, ViewportSubscriptionId, ViewportSubscriptions};

/// Longest run of adjacent empty columns the single-line overflow probe
/// will cross.
pub const MAX_TEXT_OVERFLOW_COLUMNS: u32 = 128;

/// Zoom clamp range.
const MIN_ZOOM: f64 = 0.1;
const MAX_ZOOM: f64 = 8.0;

/// Upper bound for auto-fit results, CSS px at zoom 1.
const AUTO_FIT_MAX: f64 = 2_000.0;

/// Inner horizontal cell padding, CSS px at zoom 1.
pub(crate) const CELL_PAD_X: f64 = 3.0;
pub(crate) const CELL_PAD_Y: f64 = 2.0;

/// The three layer surfaces, z-ordered background < content < selection.
pub struct GridSurfaces {
    pub background: Box<dyn Surface>,
    pub content: Box<dyn Surface>,
    pub selection: Box<dyn Surface>,
}

impl GridSurfaces {
    fn all_ready(&self) -> bool {
        self.background.context_ready()
            && self.content.context_ready()
            && self.selection.context_ready()
    }
}

/// Injected collaborators.
pub struct GridRendererDeps {
    pub provider: Rc<dyn CellProvider>,
    pub text_engine: Rc<dyn TextLayoutEngine>,
    pub clock: Rc<dyn Clock>,
    pub surface_factory: Box<dyn SurfaceFactory>,
    pub frame_scheduler: Option<Box<dyn FrameScheduler>>,
    pub image_resolver: Option<Rc<dyn ImageResolver>>,
    pub bitmap_decoder: Option<Box<dyn BitmapDecoder>>,
}

/// Construction-time grid shape.
#[derive(Debug, Clone)]
pub struct GridRendererOptions {
    pub row_count: u32,
    pub col_count: u32,
    pub default_row_height: f64,
    pub default_col_width: f64,
    pub config: GridConfig,
    pub theme: GridTheme,
}

impl Default for GridRendererOptions {
    fn default() -> Self {
        Self {
            row_count: 1_048_576,
            col_count: 16_384,
            default_row_height: 21.0,
            default_col_width: 100.0,
            config: GridConfig::default(),
            theme: GridTheme::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScrollAlign {
    #[default]
    Auto,
    Start,
    Center,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScrollToOptions {
    pub align: ScrollAlign,
    pub padding: f64,
}

/// Metadata of the last painted frame, used for scroll-delta blitting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct FrameMeta {
    pub viewport: ViewportState,
    pub zoom: f64,
    pub dpr: f64,
}

pub(crate) struct FillHandleMemo {
    pub range: CellRange,
    pub viewport: ViewportState,
    pub zoom: f64,
    pub rect: Option<PxRect>,
}

/// Decoder used when the host injects none: bytes always fail decode.
struct NullDecoder;

impl BitmapDecoder for NullDecoder {
    fn decode(&self, _bytes: &[u8]) -> Result<Box<dyn Bitmap>, ImageError> {
        Err(ImageError::DecodeFailed {
            reason: "no bitmap decoder injected".into(),
            recoverable: false,
        })
    }
}

pub struct GridRenderer {
    // Collaborators.
    pub(crate) provider: Rc<dyn CellProvider>,
    pub(crate) text_engine: Rc<dyn TextLayoutEngine>,
    pub(crate) clock: Rc<dyn Clock>,
    pub(crate) scheduler: Option<Box<dyn FrameScheduler>>,
    pub(crate) surface_factory: Box<dyn SurfaceFactory>,
    pub(crate) image_resolver: Option<Rc<dyn ImageResolver>>,
    pub(crate) bitmap_decoder: Box<dyn BitmapDecoder>,

    // Geometry.
    pub(crate) scroll: VirtualScrollManager,
    pub(crate) zoom: f64,
    pub(crate) dpr: f64,
    pub(crate) default_row_height: f64,
    pub(crate) default_col_width: f64,
    pub(crate) base_row_overrides: AHashMap<u32, f64>,
    pub(crate) base_col_overrides: AHashMap<u32, f64>,

    // Owned raster targets.
    pub(crate) surfaces: Option<GridSurfaces>,
    pub(crate) scratch: Option<Box<dyn Surface>>,
    pub(crate) pattern_bitmap: Option<Box<dyn Bitmap>>,
    pub(crate) pattern_tile: Option<Box<dyn Surface>>,

    // Lifecycle & scheduling.
    pub(crate) destroyed: bool,
    pub(crate) frame_pending: bool,

    // Dirty tracking, one tracker per layer, plus drain scratch buffers.
    pub(crate) dirty_background: DirtyRegionTracker,
    pub(crate) dirty_content: DirtyRegionTracker,
    pub(crate) dirty_selection: DirtyRegionTracker,
    pub(crate) region_scratch: Vec<PxRect>,
    pub(crate) selection_scratch: Vec<PxRect>,
    pub(crate) bg_scratch: Vec<PxRect>,
    pub(crate) content_scratch: Vec<PxRect>,

    // Overlay state.
    pub(crate) selection: SelectionState,
    pub(crate) range_selection: Option<CellRange>,
    pub(crate) fill_preview: Option<CellRange>,
    pub(crate) fill_handle_enabled: bool,
    pub(crate) reference_highlights: Vec<ReferenceHighlight>,
    pub(crate) remote_presences: Vec<RemotePresence>,

    pub(crate) theme: GridTheme,
    pub(crate) header_rows: Option<u32>,
    pub(crate) header_cols: Option<u32>,

    pub(crate) images: ImageCache,
    pub(crate) config: GridConfig,

    // Per-frame merged snapshot.
    pub(crate) merged: MergedCellIndex,

    // Provider subscription plumbing.
    pub(crate) provider_updates: Rc<RefCell<VecDeque<ProviderUpdate>>>,
    pub(crate) subscription: Option<SubscriptionId>,

    pub(crate) last_rendered: Option<FrameMeta>,
    pub(crate) perf: GridPerfStats,
    pub(crate) viewport_subs: ViewportSubscriptions,

    // Per-frame caches, reset at the top of every frame.
    pub(crate) cell_cache: AHashMap<(u32, u32), Option<Cell>>,
    pub(crate) cell_flags_cache: AHashMap<(u32, u32), CellFlags>,
    pub(crate) fill_handle_memo: Option<FillHandleMemo>,
    pub(crate) badge_widths: LruCache<String, f64>,
    pub(crate) number_format_cache: LruCache<u64, String>,
}

impl GridRenderer {
    pub fn new(deps: GridRendererDeps, mut options: GridRendererOptions) -> Self {
        // Degenerate defaults fall back rather than poisoning every later
        // prefix-sum lookup.
        let fallback = GridRendererOptions::default();
        if !options.default_row_height.is_finite() || options.default_row_height <= 0.0 {
            options.default_row_height = fallback.default_row_height;
        }
        if !options.default_col_width.is_finite() || options.default_col_width <= 0.0 {
            options.default_col_width = fallback.default_col_width;
        }
        let rows = VariableSizeAxis::new(options.default_row_height, options.row_count)
            .expect("sanitized default row height");
        let cols = VariableSizeAxis::new(options.default_col_width, options.col_count)
            .expect("sanitized default col width");
        let scroll = VirtualScrollManager::new(rows, cols);

        let provider_updates: Rc<RefCell<VecDeque<ProviderUpdate>>> =
            Rc::new(RefCell::new(VecDeque::new()));
        let queue = Rc::clone(&provider_updates);
        let subscription = deps
            .provider
            .subscribe(Rc::new(move |update| queue.borrow_mut().push_back(update)));

        let images = ImageCache::new(ImageCacheConfig {
            max_dimension: options.config.image_max_dimension,
            max_pixels: options.config.image_max_pixels,
            retry_ms: options.config.image_retry_ms,
            ..Default::default()
        });

        Self {
            provider: deps.provider,
            text_engine: deps.text_engine,
            clock: deps.clock,
            scheduler: deps.frame_scheduler,
            surface_factory: deps.surface_factory,
            image_resolver: deps.image_resolver,
            bitmap_decoder: deps.bitmap_decoder.unwrap_or_else(|| Box::new(NullDecoder)),
            scroll,
            zoom: 1.0,
            dpr: 1.0,
            default_row_height: options.default_row_height,
            default_col_width: options.default_col_width,
            base_row_overrides: AHashMap::new(),
            base_col_overrides: AHashMap::new(),
            surfaces: None,
            scratch: None,
            pattern_bitmap: None,
            pattern_tile: None,
            destroyed: false,
            frame_pending: false,
            dirty_background: DirtyRegionTracker::new(),
            dirty_content: DirtyRegionTracker::new(),
            dirty_selection: DirtyRegionTracker::new(),
            region_scratch: Vec::new(),
            selection_scratch: Vec::new(),
            bg_scratch: Vec::new(),
            content_scratch: Vec::new(),
            selection: SelectionState::default(),
            range_selection: None,
            fill_preview: None,
            fill_handle_enabled: true,
            reference_highlights: Vec::new(),
            remote_presences: Vec::new(),
            theme: options.theme,
            header_rows: None,
            header_cols: None,
            images,
            perf: GridPerfStats::new(options.config.perf_stats),
            config: options.config,
            merged: MergedCellIndex::empty(),
            provider_updates,
            subscription,
            last_rendered: None,
            viewport_subs: ViewportSubscriptions::new(),
            cell_cache: AHashMap::new(),
            cell_flags_cache: AHashMap::new(),
            fill_handle_memo: None,
            badge_widths: LruCache::new(),
            number_format_cache: LruCache::new(),
        }
    }

    /// Attached and alive. Mutators are no-ops when this is false.
    pub(crate) fn is_ready(&self) -> bool {
        !self.destroyed && self.surfaces.is_some()
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Wire the three layer surfaces. Fails with `SurfaceError` when any
    /// context is missing; the renderer then stays uninitialized. Calling
    /// again with good surfaces recovers. Idempotent after `destroy`.
    pub fn attach(&mut self, surfaces: GridSurfaces) -> Result<(), SurfaceError> {
        if self.destroyed {
            return Ok(());
        }
        if !surfaces.all_ready() {
            return Err(SurfaceError::ContextUnavailable);
        }
        self.surfaces = Some(surfaces);
        let (w, h) = self.scroll.viewport_size();
        self.resize_backing_stores(w, h)?;
        self.mark_all_dirty();
        self.request_render();
        debug!(width = w, height = h, dpr = self.dpr, "grid renderer attached");
        Ok(())
    }

    /// Tear down: cancel the pending frame, release the provider
    /// subscription, close decoded bitmaps, drop caches and zero the
    /// surface backing stores. Every later call is a no-op.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        if let Some(s) = self.scheduler.as_mut() {
            s.cancel_frame();
        }
        self.frame_pending = false;
        if let Some(id) = self.subscription.take() {
            self.provider.unsubscribe(id);
        }
        self.images.shutdown();
        self.cell_cache.clear();
        self.cell_flags_cache.clear();
        self.badge_widths.clear();
        self.number_format_cache.clear();
        self.fill_handle_memo = None;
        self.dirty_background.clear();
        self.dirty_content.clear();
        self.dirty_selection.clear();
        self.viewport_subs.clear();
        if let Some(mut surfaces) = self.surfaces.take() {
            surfaces.background.resize(0.0, 0.0, 1.0);
            surfaces.content.resize(0.0, 0.0, 1.0);
            surfaces.selection.resize(0.0, 0.0, 1.0);
        }
        self.scratch = None;
        self.pattern_tile = None;
        self.pattern_bitmap = None;
        self.destroyed = true;
        debug!("grid renderer destroyed");
    }

    // ------------------------------------------------------------------
    // Frame scheduling
    // ------------------------------------------------------------------

    /// Coalesce painting into a single deferred frame tick. Without a frame
    /// scheduler the pending flag persists until the host pumps or paints
    /// synchronously.
    pub fn request_render(&mut self) {
        if !self.is_ready() || self.frame_pending {
            return;
        }
        self.frame_pending = true;
        if let Some(s) = self.scheduler.as_mut() {
            s.request_frame();
        }
    }

    /// Host entry point for the scheduled tick. Also delivers any due
    /// deferred viewport notifications, and picks up provider invalidations
    /// that arrived between frames (the subscription listener only
    /// enqueues; it cannot reach back into the renderer).
    pub fn pump_frame(&mut self) {
        if self.destroyed {
            return;
        }
        let updates_queued = !self.provider_updates.borrow().is_empty();
        if self.frame_pending || (updates_queued && self.surfaces.is_some()) {
            self.frame_pending = false;
            self.render_frame();
        } else {
            let vp = self.scroll.viewport();
            self.viewport_subs.pump(&vp, self.clock.now_ms(), false);
        }
    }

    /// Paint synchronously, cancelling any pending tick.
    pub fn render_immediately(&mut self) {
        if !self.is_ready() {
            return;
        }
        if self.frame_pending {
            if let Some(s) = self.scheduler.as_mut() {
                s.cancel_frame();
            }
            self.frame_pending = false;
        }
        self.render_frame();
    }

    pub fn has_pending_frame(&self) -> bool {
        self.frame_pending
    }

    // ------------------------------------------------------------------
    // Viewport mutators
    // ------------------------------------------------------------------

    pub fn resize(&mut self, width: f64, height: f64, dpr: f64) {
        if !self.is_ready() {
            return;
        }
        self.scroll.set_viewport_size(width, height);
        self.dpr = if dpr.is_finite() && dpr > 0.0 { dpr } else { self.dpr };
        let _ = self.resize_backing_stores(width, height);
        self.realign_scroll();
        self.pattern_tile = None;
        self.last_rendered = None;
        self.mark_all_dirty();
        self.notify_layout_changed();
        self.request_render();
    }

    pub fn set_frozen(&mut self, frozen_rows: u32, frozen_cols: u32) {
        if !self.is_ready() {
            return;
        }
        self.scroll.set_frozen(frozen_rows, frozen_cols);
        self.last_rendered = None;
        self.mark_all_dirty();
        self.notify_layout_changed();
        self.request_render();
    }

    /// Absolute scroll, aligned to device pixels so later blits are exact.
    pub fn set_scroll(&mut self, x: f64, y: f64) {
        if !self.is_ready() {
            return;
        }
        let ax = align_to_device_pixels(x, self.dpr);
        let ay = align_to_device_pixels(y, self.dpr);
        if self.scroll.set_scroll(ax, ay) {
            self.realign_scroll();
            self.request_render();
        }
    }

    pub fn scroll_by(&mut self, dx: f64, dy: f64) {
        let (x, y) = (self.scroll.scroll_x(), self.scroll.scroll_y());
        self.set_scroll(x + dx, y + dy);
    }

    pub fn get_scroll(&self) -> (f64, f64) {
        (self.scroll.scroll_x(), self.scroll.scroll_y())
    }

    pub fn get_zoom(&self) -> f64 {
        self.zoom
    }

    /// Change zoom, keeping the sheet point under `anchor` (viewport px)
    /// stationary. Axis overrides are rescaled from the base (zoom-1) sizes
    /// immediately.
    pub fn set_zoom(&mut self, zoom: f64, anchor: Option<(f64, f64)>) {
        if !self.is_ready() || !zoom.is_finite() {
            return;
        }
        let zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        if zoom == self.zoom {
            return;
        }
        let old_zoom = self.zoom;
        let vp = self.scroll.viewport();
        let (ax, ay) = anchor.unwrap_or((vp.frozen_width, vp.frozen_height));
        // Sheet position (zoom-independent space) currently under the anchor.
        let sheet_x = (vp.scroll_x + ax) / old_zoom;
        let sheet_y = (vp.scroll_y + ay) / old_zoom;

        self.zoom = zoom;
        self.rebuild_axes();

        let new_scroll_x = sheet_x * zoom - ax;
        let new_scroll_y = sheet_y * zoom - ay;
        self.scroll.set_scroll(
            align_to_device_pixels(new_scroll_x.max(0.0), self.dpr),
            align_to_device_pixels(new_scroll_y.max(0.0), self.dpr),
        );
        self.pattern_tile = None;
        self.last_rendered = None;
        self.mark_all_dirty();
        self.notify_layout_changed();
        self.request_render();
    }

    // ------------------------------------------------------------------
    // Axis sizing
    // ------------------------------------------------------------------

    pub fn set_row_height(&mut self, row: u32, height: f64) -> Result<(), AxisError> {
        if !self.is_ready() {
            return Ok(());
        }
        let zoom = self.zoom;
        self.scroll.rows_mut().set_size(row, height * zoom)?;
        Self::store_base(&mut self.base_row_overrides, row, height, self.default_row_height);
        self.after_axis_change();
        Ok(())
    }

    pub fn set_col_width(&mut self, col: u32, width: f64) -> Result<(), AxisError> {
        if !self.is_ready() {
            return Ok(());
        }
        let zoom = self.zoom;
        self.scroll.cols_mut().set_size(col, width * zoom)?;
        Self::store_base(&mut self.base_col_overrides, col, width, self.default_col_width);
        self.after_axis_change();
        Ok(())
    }

    pub fn reset_row_height(&mut self, row: u32) {
        if !self.is_ready() {
            return;
        }
        self.scroll.rows_mut().delete_size(row);
        self.base_row_overrides.remove(&row);
        self.after_axis_change();
    }

    pub fn reset_col_width(&mut self, col: u32) {
        if !self.is_ready() {
            return;
        }
        self.scroll.cols_mut().delete_size(col);
        self.base_col_overrides.remove(&col);
        self.after_axis_change();
    }

    /// Bulk override replacement. With `reset_unspecified` the supplied maps
    /// become the entire override set; otherwise they merge over existing
    /// overrides. Applying a set identical to the current one marks nothing
    /// dirty. Returns whether anything changed.
    pub fn apply_axis_size_overrides(
        &mut self,
        rows: Option<&[(u32, f64)]>,
        cols: Option<&[(u32, f64)]>,
        reset_unspecified: bool,
    ) -> Result<bool, AxisError> {
        if !self.is_ready() {
            return Ok(false);
        }
        let next_rows = Self::merge_base(
            &self.base_row_overrides,
            rows,
            reset_unspecified,
            self.default_row_height,
        )?;
        let next_cols = Self::merge_base(
            &self.base_col_overrides,
            cols,
            reset_unspecified,
            self.default_col_width,
        )?;
        if next_rows == self.base_row_overrides && next_cols == self.base_col_overrides {
            return Ok(false);
        }
        self.base_row_overrides = next_rows;
        self.base_col_overrides = next_cols;
        self.rebuild_axes();
        self.after_axis_change();
        Ok(true)
    }

    /// Fit a column to its visible content. Measures display text through
    /// the layout engine at zoom 1.
    pub fn auto_fit_col(&mut self, col: u32, max_width: Option<f64>) {
        if !self.is_ready() {
            return;
        }
        let vp = self.scroll.viewport();
        let mut best: f64 = 0.0;
        for row in Self::visible_rows_iter(&vp) {
            if let Some(cell) = self.fetch_cell(row, col) {
                let text = cell.display_text();
                if text.is_empty() {
                    continue;
                }
                let font = crate::text_paint::resolve_font(&cell, 1.0);
                let m = self.text_engine.measure(&text, &font);
                best = best.max(m.width);
            }
        }
        if best <= 0.0 {
            return;
        }
        let width = (best + CELL_PAD_X * 2.0 + 1.0).min(max_width.unwrap_or(AUTO_FIT_MAX));
        let _ = self.set_col_width(col, width);
    }

    /// Fit a row to its visible content, honoring wrap at current widths.
    pub fn auto_fit_row(&mut self, row: u32, max_height: Option<f64>) {
        if !self.is_ready() {
            return;
        }
        let vp = self.scroll.viewport();
        let zoom = self.zoom;
        let mut best: f64 = 0.0;
        let cols: Vec<u32> = Self::visible_cols_iter(&vp).collect();
        for col in cols {
            if let Some(cell) = self.fetch_cell(row, col) {
                let text = cell.display_text();
                if text.is_empty() {
                    continue;
                }
                let col_width = self.scroll.cols().get_size(col) / zoom;
                let height = crate::text_paint::measure_cell_height(
                    self.text_engine.as_ref(),
                    &cell,
                    &text,
                    col_width - CELL_PAD_X * 2.0,
                );
                best = best.max(height);
            }
        }
        if best <= 0.0 {
            return;
        }
        let height = (best + CELL_PAD_Y * 2.0).min(max_height.unwrap_or(AUTO_FIT_MAX));
        let _ = self.set_row_height(row, height);
    }

    // ------------------------------------------------------------------
    // Selection & overlays
    // ------------------------------------------------------------------

    pub fn set_selection(&mut self, selection: SelectionState) {
        if !self.is_ready() {
            return;
        }
        self.selection = self.snap_selection(selection);
        self.fill_handle_memo = None;
        self.mark_selection_dirty();
    }

    pub fn set_selection_range(&mut self, range: CellRange) {
        self.set_selection_ranges(vec![range], 0, range.anchor());
    }

    pub fn set_selection_ranges(
        &mut self,
        ranges: Vec<CellRange>,
        active_index: usize,
        active: CellCoord,
    ) {
        if !self.is_ready() {
            return;
        }
        let state = SelectionState::from_ranges(ranges, active_index, active);
        self.set_selection(state);
    }

    pub fn add_selection_range(&mut self, range: CellRange) {
        if !self.is_ready() {
            return;
        }
        let mut state = self.selection.clone();
        state.push_range(range);
        self.set_selection(state);
    }

    /// Hot-path mutator used during drag: replaces the active range in
    /// place. Returns `false` (and stays clean) when nothing changed.
    pub fn set_active_selection_range(&mut self, range: CellRange) -> bool {
        if !self.is_ready() {
            return false;
        }
        if !self.selection.set_active_range(range) {
            return false;
        }
        self.fill_handle_memo = None;
        self.mark_selection_dirty();
        true
    }

    pub fn set_range_selection(&mut self, range: Option<CellRange>) {
        if !self.is_ready() || self.range_selection == range {
            return;
        }
        self.range_selection = range;
        self.mark_selection_dirty();
    }

    pub fn set_fill_preview_range(&mut self, range: Option<CellRange>) {
        if !self.is_ready() || self.fill_preview == range {
            return;
        }
        self.fill_preview = range;
        self.mark_selection_dirty();
    }

    pub fn set_fill_handle_enabled(&mut self, enabled: bool) {
        if !self.is_ready() || self.fill_handle_enabled == enabled {
            return;
        }
        self.fill_handle_enabled = enabled;
        self.fill_handle_memo = None;
        self.mark_selection_dirty();
    }

    pub fn set_reference_highlights(&mut self, highlights: Vec<ReferenceHighlight>) {
        if !self.is_ready() || self.reference_highlights == highlights {
            return;
        }
        self.reference_highlights = highlights;
        self.mark_selection_dirty();
    }

    pub fn set_remote_presences(&mut self, presences: Vec<RemotePresence>) {
        if !self.is_ready() || self.remote_presences == presences {
            return;
        }
        self.remote_presences = presences;
        self.mark_selection_dirty();
    }

    pub fn get_selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn get_selection_ranges(&self) -> &[CellRange] {
        self.selection.ranges()
    }

    pub fn get_selection_range(&self) -> CellRange {
        *self.selection.active_range()
    }

    // ------------------------------------------------------------------
    // Theme, headers, pattern, images
    // ------------------------------------------------------------------

    pub fn set_theme(&mut self, theme: GridTheme) {
        if !self.is_ready() || self.theme == theme {
            return;
        }
        self.theme = theme;
        self.mark_all_dirty();
        self.request_render();
    }

    /// Explicit header region override; `None` falls back to the frozen
    /// counts (one header row/col when any are frozen).
    pub fn set_headers(&mut self, header_rows: Option<u32>, header_cols: Option<u32>) {
        if !self.is_ready() {
            return;
        }
        if self.header_rows == header_rows && self.header_cols == header_cols {
            return;
        }
        self.header_rows = header_rows;
        self.header_cols = header_cols;
        self.mark_all_dirty();
        self.request_render();
    }

    pub fn set_background_pattern_image(&mut self, image: Option<Box<dyn Bitmap>>) {
        if !self.is_ready() {
            return;
        }
        self.pattern_bitmap = image;
        self.pattern_tile = None;
        self.mark_background_dirty();
        self.request_render();
    }

    pub fn invalidate_image(&mut self, id: &str) {
        if !self.is_ready() {
            return;
        }
        self.images.invalidate(id);
        self.mark_content_dirty();
        self.request_render();
    }

    pub fn clear_image_cache(&mut self) {
        if !self.is_ready() {
            return;
        }
        self.images.clear();
        self.mark_content_dirty();
        self.request_render();
    }

    // ------------------------------------------------------------------
    // Hit testing & geometry queries
    // ------------------------------------------------------------------

    /// Map a viewport pixel to the cell beneath it, snapped to the merge
    /// anchor when inside a merged range.
    pub fn pick_cell_at(&mut self, x: f64, y: f64) -> Option<CellCoord> {
        if self.destroyed {
            return None;
        }
        let vp = self.scroll.viewport();
        if x < 0.0 || y < 0.0 || x >= vp.width || y >= vp.height {
            return None;
        }
        let q = quadrants(&vp)
            .into_iter()
            .find(|q| q.rect.contains_point(x, y))?;
        let rows = self.scroll.rows();
        let cols = self.scroll.cols();
        let sheet_x = x + q.scroll_x;
        let sheet_y = y + q.scroll_y;
        if sheet_x >= cols.total_size() || sheet_y >= rows.total_size() {
            return None;
        }
        let row = rows.index_at(sheet_y, q.rows.start, q.rows.end.saturating_sub(1));
        let col = cols.index_at(sheet_x, q.cols.start, q.cols.end.saturating_sub(1));
        Some(self.resolve_merge_anchor(row, col))
    }

    /// Viewport rect of a cell (the merge rect when the cell is merged).
    pub fn get_cell_rect(&mut self, row: u32, col: u32) -> Option<PxRect> {
        if self.destroyed {
            return None;
        }
        let anchor = self.resolve_merge_anchor(row, col);
        let range = self
            .lookup_merge(anchor.row, anchor.col)
            .unwrap_or_else(|| CellRange::single(anchor.row, anchor.col));
        let rects = self.get_range_rects(&range);
        rects.into_iter().reduce(|a, b| a.union(&b))
    }

    /// Visible rectangles of a range, split across quadrants: at most four,
    /// pairwise disjoint, clipped to the viewport.
    pub fn get_range_rects(&mut self, range: &CellRange) -> Vec<PxRect> {
        if self.destroyed {
            return Vec::new();
        }
        let vp = self.scroll.viewport();
        let mut out = Vec::new();
        for q in quadrants(&vp) {
            let rows = range.start_row.max(q.rows.start)..range.end_row.min(q.rows.end);
            let cols = range.start_col.max(q.cols.start)..range.end_col.min(q.cols.end);
            if rows.is_empty() || cols.is_empty() {
                continue;
            }
            let y0 = self.scroll.rows().position_of(rows.start) - q.scroll_y;
            let y1 = self.scroll.rows().position_of(rows.end) - q.scroll_y;
            let x0 = self.scroll.cols().position_of(cols.start) - q.scroll_x;
            let x1 = self.scroll.cols().position_of(cols.end) - q.scroll_x;
            if let Some(rect) = PxRect::new(x0, y0, x1 - x0, y1 - y0).intersect(&q.rect) {
                out.push(rect);
            }
        }
        out
    }

    /// The fill handle square at the bottom-right of the active range.
    /// Memoized on (range, viewport, zoom).
    pub fn get_fill_handle_rect(&mut self) -> Option<PxRect> {
        if self.destroyed || !self.fill_handle_enabled {
            return None;
        }
        let range = *self.selection.active_range();
        let vp = self.scroll.viewport();
        if let Some(memo) = &self.fill_handle_memo
            && memo.range == range
            && memo.viewport == vp
            && memo.zoom == self.zoom
        {
            return memo.rect;
        }
        let rect = self.compute_fill_handle_rect(&range, &vp);
        self.fill_handle_memo = Some(FillHandleMemo {
            range,
            viewport: vp,
            zoom: self.zoom,
            rect,
        });
        rect
    }

    pub fn get_viewport_state(&mut self) -> ViewportState {
        self.scroll.viewport()
    }

    pub fn get_perf_stats(&self) -> crate::perf::GridPerfSnapshot {
        self.perf.snapshot()
    }

    /// Rows materialized in the current merged-index snapshot. Bounded by
    /// the viewport, never by merge heights.
    pub fn merged_indexed_row_count(&self) -> usize {
        self.merged.indexed_row_count()
    }

    /// Image pipeline state for an id, if the id has been requested.
    pub fn image_cache_state(&self, id: &str) -> Option<grid_image::ImageState> {
        self.images.state(id)
    }

    pub fn set_perf_stats_enabled(&mut self, enabled: bool) {
        self.perf.set_enabled(enabled);
    }

    // ------------------------------------------------------------------
    // Scrolling to cells
    // ------------------------------------------------------------------

    /// Scroll so `(row, col)` (or its merge) is visible. `Auto` scrolls
    /// minimally; oversized targets anchor their start edge. Merges that
    /// straddle a frozen boundary degrade to their scrollable portion.
    pub fn scroll_to_cell(&mut self, row: u32, col: u32, opts: ScrollToOptions) {
        if !self.is_ready() {
            return;
        }
        let vp = self.scroll.viewport();
        let mut range = self
            .lookup_merge(row, col)
            .unwrap_or_else(|| CellRange::single(row, col));
        // Degrade straddling merges to the scrollable slice.
        if range.start_row < vp.frozen_rows && range.end_row > vp.frozen_rows {
            range.start_row = vp.frozen_rows;
        }
        if range.start_col < vp.frozen_cols && range.end_col > vp.frozen_cols {
            range.start_col = vp.frozen_cols;
        }

        let target_y = if range.end_row <= vp.frozen_rows {
            None
        } else {
            let start = self.scroll.rows().position_of(range.start_row);
            let end = self.scroll.rows().position_of(range.end_row);
            Some(scroll_target(
                start,
                end,
                vp.frozen_height,
                vp.height - vp.frozen_height,
                vp.scroll_y,
                opts,
            ))
        };
        let target_x = if range.end_col <= vp.frozen_cols {
            None
        } else {
            let start = self.scroll.cols().position_of(range.start_col);
            let end = self.scroll.cols().position_of(range.end_col);
            Some(scroll_target(
                start,
                end,
                vp.frozen_width,
                vp.width - vp.frozen_width,
                vp.scroll_x,
                opts,
            ))
        };
        self.set_scroll(
            target_x.unwrap_or(vp.scroll_x),
            target_y.unwrap_or(vp.scroll_y),
        );
    }

    // ------------------------------------------------------------------
    // Viewport subscriptions
    // ------------------------------------------------------------------

    /// Fires on layout changes (axis sizes, freeze, resize, zoom) — never
    /// on scroll.
    pub fn subscribe_viewport(
        &mut self,
        listener: ViewportListener,
        options: SubscribeOptions,
    ) -> ViewportSubscriptionId {
        self.viewport_subs.subscribe(listener, options)
    }

    pub fn unsubscribe_viewport(&mut self, id: ViewportSubscriptionId) -> bool {
        self.viewport_subs.unsubscribe(id)
    }

    // ------------------------------------------------------------------
    // Internal helpers
    // ------------------------------------------------------------------

    pub(crate) fn resize_backing_stores(&mut self, w: f64, h: f64) -> Result<(), SurfaceError> {
        let dpr = self.dpr;
        let Some(surfaces) = self.surfaces.as_mut() else {
            return Ok(());
        };
        setup_backing_store(surfaces.background.as_mut(), w, h, dpr)?;
        setup_backing_store(surfaces.content.as_mut(), w, h, dpr)?;
        setup_backing_store(surfaces.selection.as_mut(), w, h, dpr)?;
        match self.scratch.as_mut() {
            Some(scratch) => setup_backing_store(scratch.as_mut(), w, h, dpr)?,
            None => {
                self.scratch = self.surface_factory.create_surface(w, h, dpr).ok();
            }
        }
        Ok(())
    }

    fn realign_scroll(&mut self) {
        let x = align_to_device_pixels(self.scroll.scroll_x(), self.dpr);
        let y = align_to_device_pixels(self.scroll.scroll_y(), self.dpr);
        self.scroll.set_scroll(x, y);
    }

    /// Rebuild both axes from base sizes × zoom.
    fn rebuild_axes(&mut self) {
        let zoom = self.zoom;
        let mut rows = VariableSizeAxis::new(
            self.default_row_height * zoom,
            self.scroll.rows().count(),
        )
        .expect("scaled default stays positive");
        rows.set_overrides(self.base_row_overrides.iter().map(|(&i, &s)| (i, s * zoom)))
            .expect("base overrides previously validated");
        let mut cols = VariableSizeAxis::new(
            self.default_col_width * zoom,
            self.scroll.cols().count(),
        )
        .expect("scaled default stays positive");
        cols.set_overrides(self.base_col_overrides.iter().map(|(&i, &s)| (i, s * zoom)))
            .expect("base overrides previously validated");
        self.scroll.replace_axes(rows, cols);
    }

    fn store_base(map: &mut AHashMap<u32, f64>, index: u32, size: f64, default: f64) {
        if (size - default).abs() <= grid_axis::SIZE_EPSILON {
            map.remove(&index);
        } else {
            map.insert(index, size);
        }
    }

    fn merge_base(
        current: &AHashMap<u32, f64>,
        updates: Option<&[(u32, f64)]>,
        reset_unspecified: bool,
        default: f64,
    ) -> Result<AHashMap<u32, f64>, AxisError> {
        // An axis with no update slice keeps its overrides untouched; with
        // `reset_unspecified` the supplied entries become the whole set.
        let Some(updates) = updates else {
            return Ok(current.clone());
        };
        let mut next = if reset_unspecified {
            AHashMap::new()
        } else {
            current.clone()
        };
        for &(index, size) in updates {
            if !size.is_finite() || size <= 0.0 {
                return Err(AxisError::InvalidSize { size });
            }
            Self::store_base(&mut next, index, size, default);
        }
        Ok(next)
    }

    fn after_axis_change(&mut self) {
        self.realign_scroll();
        self.last_rendered = None;
        self.fill_handle_memo = None;
        self.mark_all_dirty();
        self.notify_layout_changed();
        self.request_render();
    }

    pub(crate) fn notify_layout_changed(&mut self) {
        let vp = self.scroll.viewport();
        self.viewport_subs
            .notify_layout_changed(&vp, self.clock.now_ms());
    }

    pub(crate) fn viewport_rect(&mut self) -> PxRect {
        let vp = self.scroll.viewport();
        PxRect::new(0.0, 0.0, vp.width, vp.height)
    }

    pub(crate) fn mark_all_dirty(&mut self) {
        let full = self.viewport_rect();
        self.dirty_background.mark(full);
        self.dirty_content.mark(full);
        self.dirty_selection.mark(full);
    }

    pub(crate) fn mark_background_dirty(&mut self) {
        let full = self.viewport_rect();
        self.dirty_background.mark(full);
    }

    pub(crate) fn mark_content_dirty(&mut self) {
        let full = self.viewport_rect();
        self.dirty_content.mark(full);
    }

    fn mark_selection_dirty(&mut self) {
        let full = self.viewport_rect();
        self.dirty_selection.mark(full);
        self.request_render();
    }

    /// Snap the active cell of a selection to its merge anchor.
    fn snap_selection(&mut self, state: SelectionState) -> SelectionState {
        let active = state.active_cell();
        let anchor = self.resolve_merge_anchor(active.row, active.col);
        if anchor == active {
            return state;
        }
        let mut snapped = state;
        snapped.set_active_cell(anchor);
        snapped
    }

    pub(crate) fn lookup_merge(&self, row: u32, col: u32) -> Option<CellRange> {
        if self.merged.is_row_indexed(row) {
            return self.merged.range_at(row, col);
        }
        if self.provider.supports_merge_probe() {
            return self.provider.merged_range_at(row, col);
        }
        self.provider
            .merged_ranges_in(&CellRange::single(row, col))
            .and_then(|rs| rs.into_iter().find(|m| m.contains(row, col)))
    }

    pub(crate) fn resolve_merge_anchor(&self, row: u32, col: u32) -> CellCoord {
        match self.lookup_merge(row, col) {
            Some(m) => m.anchor(),
            None => CellCoord::new(row, col),
        }
    }

    /// Display text with the number-format LRU: formatting a float is the
    /// only formatting work worth memoizing across frames.
    pub(crate) fn format_cell_text(&mut self, cell: &Cell) -> String {
        if let grid_model::CellValue::Number(n) = &cell.value {
            let key = n.to_bits();
            if let Some(s) = self.number_format_cache.get(&key) {
                return s.clone();
            }
            let s = grid_model::cell::format_number(*n);
            if self.number_format_cache.len() >= 1_024 {
                self.number_format_cache.pop_oldest();
            }
            self.number_format_cache.insert(key, s.clone());
            return s;
        }
        cell.display_text().into_owned()
    }

    /// Provider fetch with the per-frame cell cache.
    pub(crate) fn fetch_cell(&mut self, row: u32, col: u32) -> Option<Cell> {
        if let Some(cached) = self.cell_cache.get(&(row, col)) {
            return cached.clone();
        }
        self.perf.add_cell_fetch();
        let cell = self.provider.get_cell(row, col);
        self.cell_cache.insert((row, col), cell.clone());
        cell
    }

    /// Header resolution: explicit override, else one header row/col per
    /// frozen axis.
    pub(crate) fn header_counts(&self, vp: &ViewportState) -> (u32, u32) {
        let rows = self
            .header_rows
            .unwrap_or(if vp.frozen_rows > 0 { 1 } else { 0 });
        let cols = self
            .header_cols
            .unwrap_or(if vp.frozen_cols > 0 { 1 } else { 0 });
        (rows, cols)
    }

    fn compute_fill_handle_rect(&mut self, range: &CellRange, vp: &ViewportState) -> Option<PxRect> {
        let size = 8.0 * self.zoom;
        // Bottom-right corner of the active range, mapped through the pane
        // that shows that corner.
        let corner_row = range.end_row - 1;
        let corner_col = range.end_col - 1;
        let q = quadrants(vp)
            .into_iter()
            .find(|q| q.rows.contains(corner_row) && q.cols.contains(corner_col))?;
        let x = self.scroll.cols().position_of(range.end_col) - q.scroll_x;
        let y = self.scroll.rows().position_of(range.end_row) - q.scroll_y;
        let rect = PxRect::new(x - size / 2.0, y - size / 2.0, size, size);
        rect.intersect(&q.rect)?;
        Some(rect)
    }

    fn visible_rows_iter(vp: &ViewportState) -> impl Iterator<Item = u32> + use<> {
        (0..vp.frozen_rows).chain(vp.main_rows.start..vp.main_rows.end)
    }

    fn visible_cols_iter(vp: &ViewportState) -> impl Iterator<Item = u32> + use<> {
        (0..vp.frozen_cols).chain(vp.main_cols.start..vp.main_cols.end)
    }
}

impl Drop for GridRenderer {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// One-axis scroll target for `scroll_to_cell`.
fn scroll_target(
    cell_start: f64,
    cell_end: f64,
    frozen_size: f64,
    window_len: f64,
    current: f64,
    opts: ScrollToOptions,
) -> f64 {
    let size = cell_end - cell_start;
    let pad = opts.padding.max(0.0);
    let at_start = cell_start - frozen_size - pad;
    let at_end = cell_end - frozen_size - window_len + pad;
    match opts.align {
        ScrollAlign::Start => at_start,
        ScrollAlign::End => at_end,
        ScrollAlign::Center => cell_start - frozen_size - (window_len - size) / 2.0,
        ScrollAlign::Auto => {
            // Oversized cells anchor their start edge.
            if size + pad * 2.0 >= window_len {
                return at_start;
            }
            let view_start = cell_start - frozen_size - current;
            let view_end = cell_end - frozen_size - current;
            if view_start < pad {
                at_start
            } else if view_end > window_len - pad {
                at_end
            } else {
                current
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scroll_target_auto_is_minimal() {
        let opts = ScrollToOptions::default();
        // Cell fully visible: no movement.
        assert_eq!(scroll_target(100.0, 120.0, 0.0, 400.0, 50.0, opts), 50.0);
        // Above the window: scroll up to its start.
        assert_eq!(scroll_target(10.0, 30.0, 0.0, 400.0, 50.0, opts), 10.0);
        // Below the window: scroll down just enough.
        assert_eq!(scroll_target(500.0, 520.0, 0.0, 400.0, 50.0, opts), 120.0);
    }

    #[test]
    fn scroll_target_oversized_anchors_start() {
        let opts = ScrollToOptions::default();
        assert_eq!(scroll_target(100.0, 700.0, 0.0, 400.0, 0.0, opts), 100.0);
    }

    #[test]
    fn scroll_target_center_and_end() {
        let center = ScrollToOptions {
            align: ScrollAlign::Center,
            padding: 0.0,
        };
        assert_eq!(scroll_target(100.0, 120.0, 0.0, 400.0, 0.0, center), -90.0);
        let end = ScrollToOptions {
            align: ScrollAlign::End,
            padding: 0.0,
        };
        assert_eq!(scroll_target(100.0, 120.0, 0.0, 400.0, 0.0, end), -280.0);
    }
}
