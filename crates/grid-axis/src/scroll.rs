//! Scroll state over two axes.
//!
//! `VirtualScrollManager` owns the row and column axes together with viewport
//! dimensions, scroll offsets, and frozen counts. The derived
//! [`ViewportState`] is recomputed lazily: mutators drop the cached snapshot
//! and the next access rebuilds it.

use crate::axis::VariableSizeAxis;
use crate::viewport::{IndexRange, ViewportState};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MaxScroll {
    pub max_scroll_x: f64,
    pub max_scroll_y: f64,
}

#[derive(Debug)]
pub struct VirtualScrollManager {
    rows: VariableSizeAxis,
    cols: VariableSizeAxis,
    viewport_width: f64,
    viewport_height: f64,
    scroll_x: f64,
    scroll_y: f64,
    frozen_rows: u32,
    frozen_cols: u32,
    cached: Option<ViewportState>,
}

impl VirtualScrollManager {
    pub fn new(rows: VariableSizeAxis, cols: VariableSizeAxis) -> Self {
        Self {
            rows,
            cols,
            viewport_width: 0.0,
            viewport_height: 0.0,
            scroll_x: 0.0,
            scroll_y: 0.0,
            frozen_rows: 0,
            frozen_cols: 0,
            cached: None,
        }
    }

    pub fn rows(&self) -> &VariableSizeAxis {
        &self.rows
    }

    pub fn cols(&self) -> &VariableSizeAxis {
        &self.cols
    }

    /// Mutable axis access. Any mutation invalidates the cached snapshot, so
    /// invalidation happens on borrow rather than tracking per-call.
    pub fn rows_mut(&mut self) -> &mut VariableSizeAxis {
        self.cached = None;
        &mut self.rows
    }

    pub fn cols_mut(&mut self) -> &mut VariableSizeAxis {
        self.cached = None;
        &mut self.cols
    }

    /// Replace both axes (zoom rescales every size).
    pub fn replace_axes(&mut self, rows: VariableSizeAxis, cols: VariableSizeAxis) {
        self.rows = rows;
        self.cols = cols;
        self.cached = None;
        self.reclamp_scroll();
    }

    pub fn scroll_x(&self) -> f64 {
        self.scroll_x
    }

    pub fn scroll_y(&self) -> f64 {
        self.scroll_y
    }

    pub fn frozen_rows(&self) -> u32 {
        self.frozen_rows
    }

    pub fn frozen_cols(&self) -> u32 {
        self.frozen_cols
    }

    pub fn viewport_size(&self) -> (f64, f64) {
        (self.viewport_width, self.viewport_height)
    }

    pub fn set_viewport_size(&mut self, width: f64, height: f64) {
        self.viewport_width = width.max(0.0);
        self.viewport_height = height.max(0.0);
        self.cached = None;
        self.reclamp_scroll();
    }

    pub fn set_frozen(&mut self, frozen_rows: u32, frozen_cols: u32) {
        self.frozen_rows = frozen_rows.min(self.rows.count());
        self.frozen_cols = frozen_cols.min(self.cols.count());
        self.cached = None;
        self.reclamp_scroll();
    }

    /// Scrollable content minus visible scrollable area, floored at zero.
    pub fn max_scroll(&self) -> MaxScroll {
        MaxScroll {
            max_scroll_x: (self.cols.total_size() - self.viewport_width).max(0.0),
            max_scroll_y: (self.rows.total_size() - self.viewport_height).max(0.0),
        }
    }

    /// Clamped absolute scroll. Returns `true` when the offset changed.
    pub fn set_scroll(&mut self, x: f64, y: f64) -> bool {
        let max = self.max_scroll();
        let nx = x.clamp(0.0, max.max_scroll_x);
        let ny = y.clamp(0.0, max.max_scroll_y);
        if nx == self.scroll_x && ny == self.scroll_y {
            return false;
        }
        self.scroll_x = nx;
        self.scroll_y = ny;
        self.cached = None;
        true
    }

    pub fn scroll_by(&mut self, dx: f64, dy: f64) -> bool {
        self.set_scroll(self.scroll_x + dx, self.scroll_y + dy)
    }

    /// Derived snapshot, rebuilt only after a mutation.
    pub fn viewport(&mut self) -> ViewportState {
        if let Some(state) = self.cached {
            return state;
        }
        let state = self.compute_viewport();
        self.cached = Some(state);
        state
    }

    fn compute_viewport(&self) -> ViewportState {
        let frozen_width = self.cols.position_of(self.frozen_cols);
        let frozen_height = self.rows.position_of(self.frozen_rows);
        let main_w = (self.viewport_width - frozen_width).max(0.0);
        let main_h = (self.viewport_height - frozen_height).max(0.0);

        let (rs, re) = self.rows.visible_range(
            frozen_height + self.scroll_y,
            main_h,
            self.frozen_rows,
            self.rows.count(),
        );
        let (cs, ce) = self.cols.visible_range(
            frozen_width + self.scroll_x,
            main_w,
            self.frozen_cols,
            self.cols.count(),
        );

        ViewportState {
            width: self.viewport_width,
            height: self.viewport_height,
            scroll_x: self.scroll_x,
            scroll_y: self.scroll_y,
            frozen_rows: self.frozen_rows,
            frozen_cols: self.frozen_cols,
            frozen_width,
            frozen_height,
            main_rows: IndexRange::new(rs, re),
            main_cols: IndexRange::new(cs, ce),
        }
    }

    fn reclamp_scroll(&mut self) {
        let max = self.max_scroll();
        let nx = self.scroll_x.clamp(0.0, max.max_scroll_x);
        let ny = self.scroll_y.clamp(0.0, max.max_scroll_y);
        if nx != self.scroll_x || ny != self.scroll_y {
            self.scroll_x = nx;
            self.scroll_y = ny;
            self.cached = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::VariableSizeAxis;

    fn manager() -> VirtualScrollManager {
        let rows = VariableSizeAxis::new(20.0, 1_000).unwrap();
        let cols = VariableSizeAxis::new(100.0, 100).unwrap();
        let mut m = VirtualScrollManager::new(rows, cols);
        m.set_viewport_size(500.0, 400.0);
        m
    }

    #[test]
    fn scroll_clamps_to_content() {
        let mut m = manager();
        let max = m.max_scroll();
        assert_eq!(max.max_scroll_x, 100.0 * 100.0 - 500.0);
        assert_eq!(max.max_scroll_y, 20.0 * 1_000.0 - 400.0);
        assert!(m.set_scroll(-50.0, 1e9));
        assert_eq!(m.scroll_x(), 0.0);
        assert_eq!(m.scroll_y(), max.max_scroll_y);
        // Setting the identical clamped value again reports no change.
        assert!(!m.set_scroll(0.0, 1e9));
    }

    #[test]
    fn viewport_ranges_follow_scroll_and_freeze() {
        let mut m = manager();
        m.set_frozen(2, 1);
        let v = m.viewport();
        assert_eq!(v.frozen_height, 40.0);
        assert_eq!(v.frozen_width, 100.0);
        // Main rows start at the first scrollable row.
        assert_eq!(v.main_rows.start, 2);
        // 360 px of scrollable height over 20 px rows → 18 rows visible.
        assert_eq!(v.main_rows.len(), 18);
        assert_eq!(v.main_cols.start, 1);
        assert_eq!(v.main_cols.len(), 4);

        m.set_scroll(0.0, 30.0);
        let v = m.viewport();
        // Top of main pane is sheet y = 40 + 30 = 70 → row 3.
        assert_eq!(v.main_rows.start, 3);
    }

    #[test]
    fn cached_snapshot_reuses_until_mutation() {
        let mut m = manager();
        let a = m.viewport();
        let b = m.viewport();
        assert_eq!(a, b);
        m.set_scroll(10.0, 0.0);
        let c = m.viewport();
        assert_ne!(a.scroll_x, c.scroll_x);
    }

    #[test]
    fn freeze_counts_clamp_to_axis_count() {
        let mut m = manager();
        m.set_frozen(5_000, 5_000);
        assert_eq!(m.frozen_rows(), 1_000);
        assert_eq!(m.frozen_cols(), 100);
    }
}
