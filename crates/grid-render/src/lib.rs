//! Canvas grid rendering core.
//!
//! `GridRenderer` paints a virtualized, freeze-paneable, zoomable worksheet
//! onto three layered raster surfaces (background / content / selection)
//! with incremental repaint: dirty-region tracking, per-quadrant blit scroll
//! reuse, viewport-bounded merged-cell indexing, overflow-probing text
//! paint, and collapsed Excel-style borders.
//!
//! The renderer is single-threaded and frame-driven: mutators record state
//! and dirty regions, `request_render` coalesces into one deferred tick,
//! and the frame pass paints exactly the drained regions. Everything
//! ambient (cells, text shaping, decoding, surfaces, time, frame ticks) is
//! injected through the seams in the sibling crates.

pub mod borders;
pub mod cells;
pub mod dirty;
pub mod frame;
pub mod perf;
pub mod quadrant;
pub mod renderer;
pub mod selection_paint;
pub mod snap;
pub mod subscribe;
pub mod text_paint;

pub use cells::CellFlags;
pub use dirty::DirtyRegionTracker;
pub use perf::{DirtyRectCounts, GridPerfSnapshot, GridPerfStats};
pub use quadrant::{cell_range_in, quadrants, Pane, Quadrant, BOUNDARY_EPSILON};
pub use renderer::{
    GridRenderer, GridRendererDeps, GridRendererOptions, GridSurfaces, ScrollAlign,
    ScrollToOptions, MAX_TEXT_OVERFLOW_COLUMNS,
};
pub use snap::{align_to_device_pixels, crisp_line, is_device_aligned};
pub use subscribe::{SubscribeOptions, ViewportSubscriptions, ViewportSubscriptionId};
