//! Selection layer painting.
//!
//! Painted last, above background and content: selection fills and
//! outlines, the transient drag range, the fill preview, the fill handle,
//! reference highlights (above selection), remote presence overlays, and
//! finally the freeze lines at their fixed positions.

use grid_axis::ViewportState;
use grid_model::{CellRange, PxRect};
use grid_surface::{LineCap, Surface, TextDrawStyle};
use grid_text::FontSpec;

use crate::renderer::GridRenderer;
use crate::snap::{crisp_line, snap_stroke_pos};

/// Freeze line stroke width, CSS px.
const FREEZE_LINE_WIDTH: f64 = 2.0;
/// Presence badge font size at zoom 1.
const BADGE_FONT_SIZE: f64 = 10.0;
const BADGE_PAD: f64 = 3.0;

impl GridRenderer {
    pub(crate) fn paint_selection_region(
        &mut self,
        sel: &mut dyn Surface,
        region: &PxRect,
        _vp: &ViewportState,
    ) {
        sel.save();
        sel.clip_rect(region.x, region.y, region.w, region.h);
        sel.clear_rect(region.x, region.y, region.w, region.h);

        let zoom = self.zoom;
        let fill = self.theme.selection_fill.clone();
        let border = self.theme.selection_border.clone();

        // Selection ranges: translucent fill everywhere, 2 px outline on the
        // active range, 1 px on the others.
        let ranges: Vec<CellRange> = self.selection.ranges().to_vec();
        let active_index = self.selection.active_index();
        for (i, range) in ranges.iter().enumerate() {
            let width = if i == active_index { 2.0 } else { 1.0 } * zoom;
            for rect in self.get_range_rects(range) {
                sel.fill_rect(rect.x, rect.y, rect.w, rect.h, &fill);
                outline_rect(sel, &rect, &border, width, &[]);
            }
        }

        // Transient drag selection.
        if let Some(range) = self.range_selection {
            for rect in self.get_range_rects(&range) {
                sel.fill_rect(rect.x, rect.y, rect.w, rect.h, &fill);
                outline_rect(sel, &rect, &border, 1.0 * zoom, &[]);
            }
        }

        // Fill preview: dashed outline only.
        if let Some(range) = self.fill_preview {
            let dash = [4.0 * zoom, 3.0 * zoom];
            for rect in self.get_range_rects(&range) {
                outline_rect(sel, &rect, &border, 1.0 * zoom, &dash);
            }
        }

        // Fill handle: solid square at the bottom-right of the active range.
        if let Some(rect) = self.get_fill_handle_rect() {
            let handle = self.theme.selection_handle.clone();
            sel.fill_rect(rect.x, rect.y, rect.w, rect.h, &handle);
        }

        // Reference highlights render above selection: dashed when
        // inactive, solid and thicker when active.
        let highlights = self.reference_highlights.clone();
        for h in &highlights {
            let (width, dash) = if h.active {
                (2.0 * zoom, Vec::new())
            } else {
                (1.0 * zoom, vec![4.0 * zoom, 3.0 * zoom])
            };
            for rect in self.get_range_rects(&h.range) {
                outline_rect(sel, &rect, &h.color, width, &dash);
            }
        }

        self.paint_remote_presences(sel, zoom);
        sel.restore();
    }

    fn paint_remote_presences(&mut self, sel: &mut dyn Surface, zoom: f64) {
        let presences = self.remote_presences.clone();
        let default_color = self.theme.remote_presence_default.clone();
        let badge_font = FontSpec::new("sans-serif", BADGE_FONT_SIZE * zoom);
        for p in &presences {
            let color = p.color.clone().unwrap_or_else(|| default_color.clone());
            for range in &p.selections {
                for rect in self.get_range_rects(range) {
                    sel.fill_rect(rect.x, rect.y, rect.w, rect.h, &self.theme.selection_fill);
                    outline_rect(sel, &rect, &color, 1.0 * zoom, &[]);
                }
            }
            let Some(cursor) = p.cursor else { continue };
            let Some(rect) = self.get_cell_rect(cursor.row, cursor.col) else {
                continue;
            };
            outline_rect(sel, &rect, &color, 2.0 * zoom, &[]);

            if p.name.is_empty() {
                continue;
            }
            // Badge width measured once per name and cached.
            let cached = self.badge_widths.get(&p.name).copied();
            let width = match cached {
                Some(w) => w * zoom,
                None => {
                    let unscaled = FontSpec::new("sans-serif", BADGE_FONT_SIZE);
                    let w = self.text_engine.measure(&p.name, &unscaled).width;
                    self.badge_widths.insert(p.name.clone(), w);
                    w * zoom
                }
            };
            let pad = BADGE_PAD * zoom;
            let badge_h = (BADGE_FONT_SIZE + BADGE_PAD * 2.0) * zoom;
            let badge = PxRect::new(rect.right(), rect.y, width + pad * 2.0, badge_h);
            sel.fill_rect(badge.x, badge.y, badge.w, badge.h, &color);
            let style = TextDrawStyle {
                color: self.theme.grid_bg.clone(),
                font_family: badge_font.family.clone(),
                font_size_px: badge_font.size_px,
                weight: 400,
                italic: false,
            };
            sel.fill_text(
                &p.name,
                badge.x + pad,
                badge.y + badge_h - pad - BADGE_FONT_SIZE * zoom * 0.2,
                &style,
            );
        }
    }

    /// Freeze lines draw after all per-region painting, at fixed positions
    /// on the selection layer.
    pub(crate) fn paint_freeze_lines(&mut self, sel: &mut dyn Surface, vp: &ViewportState) {
        let color = self.theme.freeze_line.clone();
        let mut segs: Vec<(f64, f64, f64, f64)> = Vec::with_capacity(2);
        if vp.frozen_cols > 0 && vp.frozen_width > 0.0 {
            let x = crisp_line(vp.frozen_width, FREEZE_LINE_WIDTH);
            segs.push((x, 0.0, x, vp.height));
        }
        if vp.frozen_rows > 0 && vp.frozen_height > 0.0 {
            let y = crisp_line(vp.frozen_height, FREEZE_LINE_WIDTH);
            segs.push((0.0, y, vp.width, y));
        }
        if !segs.is_empty() {
            sel.stroke_segments(&segs, &color, FREEZE_LINE_WIDTH, &[], LineCap::Butt);
        }
    }
}

/// Four crisp-snapped edge segments stroked as one batch.
fn outline_rect(sel: &mut dyn Surface, rect: &PxRect, color: &str, width: f64, dash: &[f64]) {
    let top = snap_stroke_pos(rect.y, width);
    let bottom = snap_stroke_pos(rect.bottom(), width);
    let left = snap_stroke_pos(rect.x, width);
    let right = snap_stroke_pos(rect.right(), width);
    let segs = [
        (rect.x, top, rect.right(), top),
        (rect.x, bottom, rect.right(), bottom),
        (left, rect.y, left, rect.bottom()),
        (right, rect.y, right, rect.bottom()),
    ];
    sel.stroke_segments(&segs, color, width, dash, LineCap::Butt);
}
