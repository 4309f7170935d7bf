//! Freeze-pane quadrant decomposition.
//!
//! Each frame the viewport splits into up to four rectangular panes. Every
//! dirty region is intersected with each pane and converted to a cell
//! sub-range in that pane's coordinate system. Cell lookups subtract a small
//! epsilon from exclusive end coordinates so a row or column starting
//! exactly on the region's edge is not spuriously included.

use grid_axis::{IndexRange, VariableSizeAxis, ViewportState};
use grid_model::PxRect;

/// Epsilon subtracted from exclusive end positions before `index_at`.
pub const BOUNDARY_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pane {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

/// One pane: its viewport rect, the cell ranges it shows, and the scroll
/// basis applied when mapping sheet coordinates into the viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quadrant {
    pub pane: Pane,
    pub rect: PxRect,
    pub rows: IndexRange,
    pub cols: IndexRange,
    pub scroll_x: f64,
    pub scroll_y: f64,
}

impl Quadrant {
    /// Viewport x of a sheet-space x inside this pane.
    pub fn view_x(&self, sheet_x: f64) -> f64 {
        sheet_x - self.scroll_x
    }

    pub fn view_y(&self, sheet_y: f64) -> f64 {
        sheet_y - self.scroll_y
    }
}

/// Decompose the viewport. Empty panes are omitted.
pub fn quadrants(vp: &ViewportState) -> Vec<Quadrant> {
    let frozen_rows = IndexRange::new(0, vp.frozen_rows);
    let frozen_cols = IndexRange::new(0, vp.frozen_cols);
    let mut out = Vec::with_capacity(4);

    let mut push = |pane, rect: PxRect, rows: IndexRange, cols: IndexRange, sx, sy| {
        if rect.is_valid() && !rows.is_empty() && !cols.is_empty() {
            out.push(Quadrant {
                pane,
                rect,
                rows,
                cols,
                scroll_x: sx,
                scroll_y: sy,
            });
        }
    };

    push(
        Pane::TopLeft,
        PxRect::new(0.0, 0.0, vp.frozen_width, vp.frozen_height),
        frozen_rows,
        frozen_cols,
        0.0,
        0.0,
    );
    push(
        Pane::TopRight,
        PxRect::new(
            vp.frozen_width,
            0.0,
            vp.width - vp.frozen_width,
            vp.frozen_height,
        ),
        frozen_rows,
        vp.main_cols,
        vp.scroll_x,
        0.0,
    );
    push(
        Pane::BottomLeft,
        PxRect::new(
            0.0,
            vp.frozen_height,
            vp.frozen_width,
            vp.height - vp.frozen_height,
        ),
        vp.main_rows,
        frozen_cols,
        0.0,
        vp.scroll_y,
    );
    push(
        Pane::BottomRight,
        PxRect::new(
            vp.frozen_width,
            vp.frozen_height,
            vp.width - vp.frozen_width,
            vp.height - vp.frozen_height,
        ),
        vp.main_rows,
        vp.main_cols,
        vp.scroll_x,
        vp.scroll_y,
    );
    out
}

/// Convert a viewport rect (already intersected with the pane) into the
/// half-open cell ranges it covers within the pane.
pub fn cell_range_in(
    q: &Quadrant,
    clip: &PxRect,
    rows: &VariableSizeAxis,
    cols: &VariableSizeAxis,
) -> (IndexRange, IndexRange) {
    if q.rows.is_empty() || q.cols.is_empty() {
        return (IndexRange::default(), IndexRange::default());
    }
    let row_max = q.rows.end - 1;
    let col_max = q.cols.end - 1;

    let sheet_top = clip.y + q.scroll_y;
    let sheet_bottom = clip.bottom() + q.scroll_y - BOUNDARY_EPSILON;
    let r0 = rows.index_at(sheet_top, q.rows.start, row_max);
    let r1 = rows.index_at(sheet_bottom.max(sheet_top), r0, row_max) + 1;

    let sheet_left = clip.x + q.scroll_x;
    let sheet_right = clip.right() + q.scroll_x - BOUNDARY_EPSILON;
    let c0 = cols.index_at(sheet_left, q.cols.start, col_max);
    let c1 = cols.index_at(sheet_right.max(sheet_left), c0, col_max) + 1;

    (IndexRange::new(r0, r1), IndexRange::new(c0, c1))
}
