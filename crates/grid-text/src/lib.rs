//! Text layout seam for the grid renderer.
//!
//! The renderer never shapes text itself; it hands strings or styled runs to
//! a [`TextLayoutEngine`] and paints the returned line boxes. Engines are
//! required to cache their own measurements — the renderer deliberately does
//! not memoize layout results.
//!
//! [`MetricTextEngine`] is a deterministic advance-width implementation used
//! by the test suite and as a headless fallback. It is not a shaper: cluster
//! widths come from `unicode-width` with a fixed per-font advance model, so
//! identical inputs always produce identical geometry.

pub mod engine;
pub mod metric;
pub mod width;
pub mod wrap;

pub use engine::{
    detect_base_direction, resolve_align, BaseDirection, FontSpec, FontStyle, LayoutContent,
    LayoutLine, LayoutParams, LayoutRun, LineRun, TextAlign, TextLayout, TextLayoutEngine,
    TextMetrics,
};
pub use metric::MetricTextEngine;
