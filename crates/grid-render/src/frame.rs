//! The frame pass.
//!
//! A frame, in order: drain provider invalidations and image completions,
//! reset the per-frame probe caches, compute the scroll delta against the
//! previously rendered snapshot, blit-reuse surviving pixels (or mark the
//! world dirty when layout/zoom/DPR changed), rebuild the merged-index
//! snapshot, drain the three dirty trackers, paint background+content
//! jointly per region and selection last, then publish perf figures and
//! pump frame-coalesced viewport subscriptions.
//!
//! A frame with zero scroll delta and no invalidations drains zero rects
//! and paints nothing.

use grid_axis::ViewportState;
use grid_merge::{expand_range_to_merged_cells, MergedCellIndex};
use grid_model::{CellRange, ProviderUpdate, PxRect};
use grid_surface::Surface;

use crate::dirty::DirtyRegionTracker;
use crate::renderer::{FrameMeta, GridRenderer};
use crate::snap::is_device_aligned;

/// Extra padding marked around blit-exposed stripes and invalidation rects
/// so border strokes reaching past cell edges repaint, CSS px at zoom 1.
const STROKE_PAD: f64 = 2.0;

/// Half-width of the ghost strips marked around freeze lines after a
/// selection-layer blit, CSS px at zoom 1.
const FREEZE_GHOST: f64 = 4.0;

impl GridRenderer {
    pub(crate) fn render_frame(&mut self) {
        if self.destroyed || self.surfaces.is_none() {
            return;
        }
        let t0 = self.clock.now_ms();

        self.drain_provider_updates();
        self.drain_image_completions();

        // Per-frame caches used by overflow probing reset first.
        self.cell_cache.clear();
        self.cell_flags_cache.clear();

        let vp = self.scroll.viewport();
        let meta = FrameMeta {
            viewport: vp,
            zoom: self.zoom,
            dpr: self.dpr,
        };

        let mut blit_used = false;
        match self.last_rendered {
            None => self.mark_all_dirty(),
            Some(last) => {
                let meta_changed = last.zoom != meta.zoom
                    || last.dpr != meta.dpr
                    || last.viewport.layout_differs(&vp);
                if meta_changed {
                    self.mark_all_dirty();
                } else {
                    let dx = last.viewport.scroll_x - vp.scroll_x;
                    let dy = last.viewport.scroll_y - vp.scroll_y;
                    if dx != 0.0 || dy != 0.0 {
                        if self.can_blit_scroll(&vp, dx, dy) {
                            self.blit_scroll(&vp, dx, dy);
                            blit_used = true;
                        } else {
                            self.mark_all_dirty();
                        }
                    }
                }
            }
        }

        self.perf.begin_frame();
        self.perf.record_blit(blit_used);
        // Fetch hint for the scrollable pane before per-cell access starts.
        if let Some(range) = CellRange::normalized(
            vp.main_rows.start,
            vp.main_rows.end,
            vp.main_cols.start,
            vp.main_cols.end,
        ) {
            self.provider.prefetch(&range);
        }
        self.rebuild_merged_index(&vp);

        // Drain all three trackers through the persistent scratch buffers.
        let mut bg_rects = std::mem::take(&mut self.bg_scratch);
        let mut content_rects = std::mem::take(&mut self.content_scratch);
        let mut sel_rects = std::mem::take(&mut self.selection_scratch);
        self.dirty_background.drain_into(&mut bg_rects);
        self.dirty_content.drain_into(&mut content_rects);
        self.dirty_selection.drain_into(&mut sel_rects);
        self.perf.record_dirty(crate::perf::DirtyRectCounts {
            background: bg_rects.len(),
            content: content_rects.len(),
            selection: sel_rects.len(),
        });

        // Background and content share the quadrant clip, so their regions
        // merge into one pass.
        let mut combined = DirtyRegionTracker::new();
        for rect in bg_rects.iter().chain(content_rects.iter()) {
            combined.mark(*rect);
        }
        let mut regions = std::mem::take(&mut self.region_scratch);
        combined.drain_into(&mut regions);

        if !regions.is_empty() || !sel_rects.is_empty() {
            let Some(mut surfaces) = self.surfaces.take() else {
                return;
            };
            for region in &regions {
                self.paint_region(&mut surfaces, region, &vp);
            }
            for region in &sel_rects {
                self.paint_selection_region(surfaces.selection.as_mut(), region, &vp);
            }
            if !sel_rects.is_empty() {
                self.paint_freeze_lines(surfaces.selection.as_mut(), &vp);
            }
            self.surfaces = Some(surfaces);
        }

        bg_rects.clear();
        content_rects.clear();
        sel_rects.clear();
        regions.clear();
        self.bg_scratch = bg_rects;
        self.content_scratch = content_rects;
        self.selection_scratch = sel_rects;
        self.region_scratch = regions;

        self.last_rendered = Some(meta);
        let now = self.clock.now_ms();
        self.perf.end_frame(now - t0);
        self.viewport_subs.pump(&vp, now, true);
    }

    // ------------------------------------------------------------------
    // Provider & image integration
    // ------------------------------------------------------------------

    fn drain_provider_updates(&mut self) {
        loop {
            let update = self.provider_updates.borrow_mut().pop_front();
            let Some(update) = update else { break };
            match update {
                ProviderUpdate::InvalidateAll => {
                    let full = self.viewport_rect();
                    self.dirty_background.mark(full);
                    self.dirty_content.mark(full);
                    self.merged = MergedCellIndex::empty();
                }
                ProviderUpdate::Invalidate(range) => self.apply_range_invalidation(range),
            }
        }
    }

    /// Normalize, expand across merges, pad along the column axis to cover
    /// text overflow into previously-empty neighbors, then mark the mapped
    /// viewport rects with a stroke-width pad.
    fn apply_range_invalidation(&mut self, range: CellRange) {
        let expanded = expand_range_to_merged_cells(range, self.provider.as_ref());
        let pad = self.config.overflow_columns;
        let padded = CellRange {
            start_col: expanded.start_col.saturating_sub(pad),
            end_col: expanded.end_col.saturating_add(pad),
            ..expanded
        };
        let stroke_pad = STROKE_PAD * self.zoom;
        for rect in self.get_range_rects(&padded) {
            let r = rect.inflate(stroke_pad);
            self.dirty_background.mark(r);
            self.dirty_content.mark(r);
        }
    }

    fn drain_image_completions(&mut self) {
        let changed = self
            .images
            .drain_completions(self.bitmap_decoder.as_ref(), self.clock.as_ref());
        if !changed.is_empty() {
            self.mark_content_dirty();
        }
    }

    // ------------------------------------------------------------------
    // Merged-index snapshot
    // ------------------------------------------------------------------

    /// Index exactly the visible rows plus the row above the main pane
    /// (needed for the top boundary edge); a merge spanning a million rows
    /// therefore costs O(visible rows).
    fn rebuild_merged_index(&mut self, vp: &ViewportState) {
        let mut row_bands: Vec<(u32, u32)> = Vec::new();
        if vp.frozen_rows > 0 {
            row_bands.push((0, vp.frozen_rows));
        }
        if !vp.main_rows.is_empty() {
            row_bands.push((vp.main_rows.start.saturating_sub(1), vp.main_rows.end));
        }
        let mut col_bands: Vec<(u32, u32)> = Vec::new();
        if vp.frozen_cols > 0 {
            col_bands.push((0, vp.frozen_cols));
        }
        if !vp.main_cols.is_empty() {
            col_bands.push((vp.main_cols.start, vp.main_cols.end));
        }

        let mut ranges: Vec<CellRange> = Vec::new();
        'bands: for &(rs, re) in &row_bands {
            for &(cs, ce) in &col_bands {
                let Some(band) = CellRange::normalized(rs, re, cs, ce) else {
                    continue;
                };
                match self.provider.merged_ranges_in(&band) {
                    Some(found) => ranges.extend(found),
                    None => {
                        if !self.provider.supports_merge_probe() {
                            break 'bands;
                        }
                        // Probe row by row, jumping past each merge's width.
                        for row in rs..re {
                            let mut col = cs;
                            while col < ce {
                                match self.provider.merged_range_at(row, col) {
                                    Some(m) => {
                                        ranges.push(m);
                                        col = m.end_col.max(col + 1);
                                    }
                                    None => col += 1,
                                }
                            }
                        }
                    }
                }
            }
        }
        ranges.sort_by_key(|r| (r.start_row, r.start_col, r.end_row, r.end_col));
        ranges.dedup();
        self.merged = MergedCellIndex::build(&ranges, Some(&row_bands));
    }

    // ------------------------------------------------------------------
    // Blit scroll
    // ------------------------------------------------------------------

    /// Blit validity: finite DPR, device-pixel-integer deltas on both axes,
    /// neither delta consuming a whole scrollable extent, and a scratch
    /// surface to copy through.
    fn can_blit_scroll(&self, vp: &ViewportState, dx: f64, dy: f64) -> bool {
        if !self.dpr.is_finite() || self.dpr <= 0.0 || self.scratch.is_none() {
            return false;
        }
        if !is_device_aligned(dx, self.dpr) || !is_device_aligned(dy, self.dpr) {
            return false;
        }
        let scrollable_w = vp.width - vp.frozen_width;
        let scrollable_h = vp.height - vp.frozen_height;
        dx.abs() < scrollable_w && dy.abs() < scrollable_h
    }

    /// Copy each layer through the scratch buffer, shifting TR horizontally,
    /// BL vertically and BR by both; then mark only the exposed stripes
    /// (plus stroke padding) dirty, and ghost strips around the freeze
    /// lines on the selection layer.
    fn blit_scroll(&mut self, vp: &ViewportState, dx: f64, dy: f64) {
        let Some(mut surfaces) = self.surfaces.take() else {
            return;
        };
        let Some(mut scratch) = self.scratch.take() else {
            self.surfaces = Some(surfaces);
            return;
        };
        let grid_bg = self.theme.grid_bg.clone();
        blit_layer(surfaces.background.as_mut(), scratch.as_mut(), vp, dx, dy, Some(&grid_bg));
        blit_layer(surfaces.content.as_mut(), scratch.as_mut(), vp, dx, dy, None);
        blit_layer(surfaces.selection.as_mut(), scratch.as_mut(), vp, dx, dy, None);
        self.scratch = Some(scratch);
        self.surfaces = Some(surfaces);

        self.mark_exposed_stripes(vp, dx, dy);
        self.mark_freeze_ghosts(vp);
    }

    fn mark_exposed_stripes(&mut self, vp: &ViewportState, dx: f64, dy: f64) {
        let pad = STROKE_PAD * self.zoom;
        if dx != 0.0 {
            let w = dx.abs() + pad;
            let x = if dx < 0.0 {
                vp.width - w
            } else {
                vp.frozen_width
            };
            let stripe = PxRect::new(x, 0.0, w, vp.height);
            self.dirty_background.mark(stripe);
            self.dirty_content.mark(stripe);
            self.dirty_selection.mark(stripe);
        }
        if dy != 0.0 {
            let h = dy.abs() + pad;
            let y = if dy < 0.0 {
                vp.height - h
            } else {
                vp.frozen_height
            };
            let stripe = PxRect::new(0.0, y, vp.width, h);
            self.dirty_background.mark(stripe);
            self.dirty_content.mark(stripe);
            self.dirty_selection.mark(stripe);
        }
    }

    /// After the selection layer blits, the fixed-position freeze lines have
    /// shifted with the copied pixels; marking strips around the boundary
    /// repaints them in place.
    fn mark_freeze_ghosts(&mut self, vp: &ViewportState) {
        let g = FREEZE_GHOST * self.zoom;
        if vp.frozen_cols > 0 {
            self.dirty_selection
                .mark(PxRect::new(vp.frozen_width - g, 0.0, g * 2.0, vp.height));
        }
        if vp.frozen_rows > 0 {
            self.dirty_selection
                .mark(PxRect::new(0.0, vp.frozen_height - g, vp.width, g * 2.0));
        }
    }
}

/// One layer's blit: snapshot into scratch, then per shifted quadrant clip,
/// reset (opaque fill for the background layer, alpha clear otherwise) and
/// copy back displaced.
fn blit_layer(
    layer: &mut dyn Surface,
    scratch: &mut dyn Surface,
    vp: &ViewportState,
    dx: f64,
    dy: f64,
    opaque_fill: Option<&str>,
) {
    scratch.clear_rect(0.0, 0.0, vp.width, vp.height);
    scratch.draw_surface(layer, 0.0, 0.0, vp.width, vp.height, 0.0, 0.0, vp.width, vp.height);

    let panes = [
        // (rect, shift_x, shift_y)
        (
            PxRect::new(vp.frozen_width, 0.0, vp.width - vp.frozen_width, vp.frozen_height),
            dx,
            0.0,
        ),
        (
            PxRect::new(0.0, vp.frozen_height, vp.frozen_width, vp.height - vp.frozen_height),
            0.0,
            dy,
        ),
        (
            PxRect::new(
                vp.frozen_width,
                vp.frozen_height,
                vp.width - vp.frozen_width,
                vp.height - vp.frozen_height,
            ),
            dx,
            dy,
        ),
    ];
    for (rect, sdx, sdy) in panes {
        if !rect.is_valid() || (sdx == 0.0 && sdy == 0.0) {
            continue;
        }
        layer.save();
        layer.clip_rect(rect.x, rect.y, rect.w, rect.h);
        match opaque_fill {
            Some(color) => layer.fill_rect(rect.x, rect.y, rect.w, rect.h, color),
            None => layer.clear_rect(rect.x, rect.y, rect.w, rect.h),
        }
        layer.draw_surface(
            scratch,
            rect.x,
            rect.y,
            rect.w,
            rect.h,
            rect.x + sdx,
            rect.y + sdy,
            rect.w,
            rect.h,
        );
        layer.restore();
    }
}
