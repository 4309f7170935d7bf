//! Collapsed border resolution and stroking.
//!
//! Borders live on edges, not cells. Every horizontal edge between two rows
//! (and vertical edge between two columns) collects candidates from the
//! cell on either side — routed through merge anchors, which contribute
//! perimeter borders only — and resolves one winner:
//!
//! 1. larger `width × zoom` wins;
//! 2. tie → higher style rank (`double > solid > dashed > dotted`);
//! 3. tie → the bottom (horizontal) / right (vertical) source cell;
//! 4. tie → deterministic fallback on (source row, source col, color).
//!
//! The result is order-independent: the same two cells always produce the
//! same edge. Edges with no candidate paint as plain gridlines unless they
//! lie strictly inside a merge. Winning edges batch by (color, width, dash)
//! and stroke once per group; `double` contributes two parallel segments
//! offset by ±width. Integer widths snap (odd → half-pixel, even → whole
//! pixel); fractional widths keep exact coordinates to preserve width
//! ordering under zoom. Diagonal borders stroke last, clipped per cell.
//!
//! At zero scroll the frozen/scrollable seam is geometrically adjacent in
//! sheet space and edges collapse across it; at any other scroll offset the
//! seam is a discontinuity and each side resolves alone.

use grid_axis::{IndexRange, ViewportState};
use grid_model::{BorderLineStyle, BorderSpec, PxRect};
use grid_surface::{LineCap, Surface};

use crate::quadrant::{Pane, Quadrant};
use crate::renderer::GridRenderer;
use crate::snap::snap_stroke_pos;

/// Default gridline stroke width (CSS px, deliberately not zoom-scaled).
const GRIDLINE_WIDTH: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Top,
    Right,
    Bottom,
    Left,
}

#[derive(Debug, Clone)]
struct EdgeCand {
    spec: BorderSpec,
    row: u32,
    col: u32,
}

/// Batching key equality: color + effective width + dash pattern.
struct StrokeGroup {
    color: String,
    width: f64,
    dash: Vec<f64>,
    segments: Vec<(f64, f64, f64, f64)>,
}

#[derive(Default)]
struct EdgeBatcher {
    gridlines: Vec<(f64, f64, f64, f64)>,
    groups: Vec<StrokeGroup>,
}

impl EdgeBatcher {
    fn push(&mut self, color: &str, width: f64, dash: &[f64], seg: (f64, f64, f64, f64)) {
        if let Some(g) = self
            .groups
            .iter_mut()
            .find(|g| g.color == color && g.width == width && g.dash == dash)
        {
            g.segments.push(seg);
            return;
        }
        self.groups.push(StrokeGroup {
            color: color.to_string(),
            width,
            dash: dash.to_vec(),
            segments: vec![seg],
        });
    }

    fn flush(self, surface: &mut dyn Surface, gridline_color: &str) {
        if !self.gridlines.is_empty() {
            surface.stroke_segments(
                &self.gridlines,
                gridline_color,
                GRIDLINE_WIDTH,
                &[],
                LineCap::Butt,
            );
        }
        for g in self.groups {
            surface.stroke_segments(&g.segments, &g.color, g.width, &g.dash, LineCap::Butt);
        }
    }
}

fn dash_pattern(style: BorderLineStyle, zoom: f64) -> Vec<f64> {
    match style {
        BorderLineStyle::Dashed => vec![4.0 * zoom, 2.0 * zoom],
        BorderLineStyle::Dotted => vec![1.5 * zoom, 1.5 * zoom],
        BorderLineStyle::Solid | BorderLineStyle::Double => Vec::new(),
    }
}

/// Rules 1–4. `far` is the bottom/right candidate.
fn resolve_winner(near: Option<EdgeCand>, far: Option<EdgeCand>, zoom: f64) -> Option<EdgeCand> {
    match (near, far) {
        (None, x) => x,
        (x, None) => x,
        (Some(a), Some(b)) => {
            let (wa, wb) = (a.spec.width * zoom, b.spec.width * zoom);
            if wa != wb {
                return Some(if wa > wb { a } else { b });
            }
            let (ra, rb) = (a.spec.style.rank(), b.spec.style.rank());
            if ra != rb {
                return Some(if ra > rb { a } else { b });
            }
            if (a.row, a.col) != (b.row, b.col) {
                // Prefer the bottom/right source.
                return Some(b);
            }
            // Same source cell on both sides: settle on color.
            Some(if a.spec.color >= b.spec.color { a } else { b })
        }
    }
}

/// Batch-key equality of two winners, for run merging along an edge line.
fn same_stroke(a: &Option<EdgeCand>, b: &Option<EdgeCand>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => {
            a.spec.color == b.spec.color && a.spec.width == b.spec.width && a.spec.style == b.spec.style
        }
        _ => false,
    }
}

impl GridRenderer {
    pub(crate) fn paint_borders(
        &mut self,
        bg: &mut dyn Surface,
        q: &Quadrant,
        clip: &PxRect,
        vp: &ViewportState,
        rows: IndexRange,
        cols: IndexRange,
    ) {
        if rows.is_empty() || cols.is_empty() {
            return;
        }
        let zoom = self.zoom;
        let mut batcher = EdgeBatcher::default();

        // Horizontal edges: edge index r lies between rows r-1 and r.
        for r in rows.start..=rows.end {
            let y = self.scroll.rows().position_of(r) - q.scroll_y;
            if y < clip.y - 1.0 || y > clip.bottom() + 1.0 {
                continue;
            }
            let (above, below) = self.h_edge_neighbors(q, vp, r);
            let mut run: Option<(f64, f64, Option<EdgeCand>)> = None;
            for c in cols.start..cols.end {
                let x0 = self.scroll.cols().position_of(c) - q.scroll_x;
                let x1 = x0 + self.scroll.cols().get_size(c);
                // Edges strictly inside a merge vanish entirely.
                let interior = above
                    .is_some_and(|ar| self.merged.is_interior_horizontal_gridline(ar, c));
                let winner = if interior {
                    None
                } else {
                    let near = above.and_then(|ar| self.cell_border(ar, c, Side::Bottom));
                    let far = below.and_then(|br| self.cell_border(br, c, Side::Top));
                    resolve_winner(near, far, zoom)
                };
                run = match run.take() {
                    Some((rx0, _, rw)) if same_stroke(&rw, &winner) && !interior => {
                        Some((rx0, x1, rw))
                    }
                    Some((rx0, rx1, rw)) => {
                        emit_h(&mut batcher, rx0, rx1, y, &rw, zoom);
                        if interior { None } else { Some((x0, x1, winner)) }
                    }
                    None => {
                        if interior { None } else { Some((x0, x1, winner)) }
                    }
                };
            }
            if let Some((rx0, rx1, rw)) = run {
                emit_h(&mut batcher, rx0, rx1, y, &rw, zoom);
            }
        }

        // Vertical edges: edge index c lies between cols c-1 and c.
        for c in cols.start..=cols.end {
            let x = self.scroll.cols().position_of(c) - q.scroll_x;
            if x < clip.x - 1.0 || x > clip.right() + 1.0 {
                continue;
            }
            let (left, right) = self.v_edge_neighbors(q, vp, c);
            let mut run: Option<(f64, f64, Option<EdgeCand>)> = None;
            for r in rows.start..rows.end {
                let y0 = self.scroll.rows().position_of(r) - q.scroll_y;
                let y1 = y0 + self.scroll.rows().get_size(r);
                let interior = left
                    .is_some_and(|lc| self.merged.is_interior_vertical_gridline(r, lc));
                let winner = if interior {
                    None
                } else {
                    let near = left.and_then(|lc| self.cell_border(r, lc, Side::Right));
                    let far = right.and_then(|rc| self.cell_border(r, rc, Side::Left));
                    resolve_winner(near, far, zoom)
                };
                run = match run.take() {
                    Some((ry0, _, rw)) if same_stroke(&rw, &winner) && !interior => {
                        Some((ry0, y1, rw))
                    }
                    Some((ry0, ry1, rw)) => {
                        emit_v(&mut batcher, ry0, ry1, x, &rw, zoom);
                        if interior { None } else { Some((y0, y1, winner)) }
                    }
                    None => {
                        if interior { None } else { Some((y0, y1, winner)) }
                    }
                };
            }
            if let Some((ry0, ry1, rw)) = run {
                emit_v(&mut batcher, ry0, ry1, x, &rw, zoom);
            }
        }

        let gridline_color = self.theme.grid_line.clone();
        batcher.flush(bg, &gridline_color);

        self.paint_diagonals(bg, q, rows, cols);
    }

    /// Sheet neighbors of horizontal edge `r`. The cell above is always the
    /// true sheet neighbor `r − 1`; the cell below is suppressed at the
    /// frozen seam whenever the panes are not geometrically adjacent
    /// (scroll ≠ 0).
    fn h_edge_neighbors(&self, q: &Quadrant, vp: &ViewportState, r: u32) -> (Option<u32>, Option<u32>) {
        let above = r.checked_sub(1);
        let frozen_pane = matches!(q.pane, Pane::TopLeft | Pane::TopRight);
        let below = if frozen_pane && r == vp.frozen_rows && vp.scroll_y != 0.0 {
            None
        } else if r < self.scroll.rows().count() {
            Some(r)
        } else {
            None
        };
        (above, below)
    }

    fn v_edge_neighbors(&self, q: &Quadrant, vp: &ViewportState, c: u32) -> (Option<u32>, Option<u32>) {
        let left = c.checked_sub(1);
        let frozen_pane = matches!(q.pane, Pane::TopLeft | Pane::BottomLeft);
        let right = if frozen_pane && c == vp.frozen_cols && vp.scroll_x != 0.0 {
            None
        } else if c < self.scroll.cols().count() {
            Some(c)
        } else {
            None
        };
        (left, right)
    }

    /// A cell's border contribution on one side, routed through merges: a
    /// merged member yields the anchor's spec only on the merge perimeter.
    fn cell_border(&mut self, row: u32, col: u32, side: Side) -> Option<EdgeCand> {
        let (source_row, source_col) = match self.merged.range_at(row, col) {
            Some(m) => {
                let on_perimeter = match side {
                    Side::Top => row == m.start_row,
                    Side::Bottom => row == m.end_row - 1,
                    Side::Left => col == m.start_col,
                    Side::Right => col == m.end_col - 1,
                };
                if !on_perimeter {
                    return None;
                }
                (m.start_row, m.start_col)
            }
            None => (row, col),
        };
        let cell = self.fetch_cell(source_row, source_col)?;
        let style = cell.style.as_ref()?;
        let spec = match side {
            Side::Top => style.borders.top.clone(),
            Side::Right => style.borders.right.clone(),
            Side::Bottom => style.borders.bottom.clone(),
            Side::Left => style.borders.left.clone(),
        }?;
        Some(EdgeCand {
            spec,
            row: source_row,
            col: source_col,
        })
    }

    /// Diagonal borders paint above gridlines and side borders, clipped to
    /// each cell rect.
    fn paint_diagonals(
        &mut self,
        bg: &mut dyn Surface,
        q: &Quadrant,
        rows: IndexRange,
        cols: IndexRange,
    ) {
        for row in rows.start..rows.end {
            for col in cols.start..cols.end {
                if self.merged.should_skip_cell(row, col) {
                    continue;
                }
                let Some(cell) = self.fetch_cell(row, col) else {
                    continue;
                };
                let Some(diag) = cell.style.as_ref().and_then(|s| s.borders.diagonal.clone())
                else {
                    continue;
                };
                let Some(spec) = diag.spec else { continue };
                let rect = self.cell_paint_rect(row, col, q);
                if !rect.is_valid() {
                    continue;
                }
                let width = spec.width * self.zoom;
                let dash = dash_pattern(spec.style, self.zoom);
                let mut segs: Vec<(f64, f64, f64, f64)> = Vec::with_capacity(2);
                if diag.down {
                    segs.push((rect.x, rect.y, rect.right(), rect.bottom()));
                }
                if diag.up {
                    segs.push((rect.x, rect.bottom(), rect.right(), rect.y));
                }
                if segs.is_empty() {
                    continue;
                }
                bg.save();
                bg.clip_rect(rect.x, rect.y, rect.w, rect.h);
                bg.stroke_segments(&segs, &spec.color, width, &dash, LineCap::Butt);
                bg.restore();
            }
        }
    }
}

fn emit_h(batcher: &mut EdgeBatcher, x0: f64, x1: f64, y: f64, winner: &Option<EdgeCand>, zoom: f64) {
    if x1 <= x0 {
        return;
    }
    match winner {
        None => {
            let ys = snap_stroke_pos(y, GRIDLINE_WIDTH);
            batcher.gridlines.push((x0, ys, x1, ys));
        }
        Some(cand) => {
            let width = cand.spec.width * zoom;
            let dash = dash_pattern(cand.spec.style, zoom);
            if cand.spec.style == BorderLineStyle::Double {
                let y0 = snap_stroke_pos(y - width, width);
                let y1 = snap_stroke_pos(y + width, width);
                batcher.push(&cand.spec.color, width, &dash, (x0, y0, x1, y0));
                batcher.push(&cand.spec.color, width, &dash, (x0, y1, x1, y1));
            } else {
                let ys = snap_stroke_pos(y, width);
                batcher.push(&cand.spec.color, width, &dash, (x0, ys, x1, ys));
            }
        }
    }
}

fn emit_v(batcher: &mut EdgeBatcher, y0: f64, y1: f64, x: f64, winner: &Option<EdgeCand>, zoom: f64) {
    if y1 <= y0 {
        return;
    }
    match winner {
        None => {
            let xs = snap_stroke_pos(x, GRIDLINE_WIDTH);
            batcher.gridlines.push((xs, y0, xs, y1));
        }
        Some(cand) => {
            let width = cand.spec.width * zoom;
            let dash = dash_pattern(cand.spec.style, zoom);
            if cand.spec.style == BorderLineStyle::Double {
                let xl = snap_stroke_pos(x - width, width);
                let xr = snap_stroke_pos(x + width, width);
                batcher.push(&cand.spec.color, width, &dash, (xl, y0, xl, y1));
                batcher.push(&cand.spec.color, width, &dash, (xr, y0, xr, y1));
            } else {
                let xs = snap_stroke_pos(x, width);
                batcher.push(&cand.spec.color, width, &dash, (xs, y0, xs, y1));
            }
        }
    }
}
