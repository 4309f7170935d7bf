//! Background and content painting per dirty region.
//!
//! Both layers share the quadrant clip, so one pass walks each region ×
//! quadrant intersection: the background layer gets the base fill, the
//! tiled pattern, batched cell fill runs and the collapsed borders; the
//! content layer gets images, text and comment indicators. Non-anchor
//! members of merged ranges are skipped entirely — the anchor paints the
//! whole merge rectangle.

use bitflags::bitflags;
use grid_axis::ViewportState;
use grid_model::{CellRange, PxRect};
use grid_surface::Surface;

use crate::quadrant::{cell_range_in, quadrants, Quadrant};
use crate::renderer::{GridRenderer, GridSurfaces, CELL_PAD_X};

/// Checkerboard square size for image placeholders, CSS px at zoom 1.
const PLACEHOLDER_CHECKER: f64 = 8.0;
/// Comment indicator leg length, CSS px at zoom 1.
const COMMENT_INDICATOR: f64 = 6.0;

bitflags! {
    /// Per-cell paint attributes, resolved once per cell per frame and
    /// cached alongside the fetched cell.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CellFlags: u8 {
        const BLOCKS_OVERFLOW = 0b0000_0001; // non-empty value / rich text / image
        const HAS_IMAGE       = 0b0000_0010;
        const HAS_COMMENT     = 0b0000_0100;
        const IN_MERGE        = 0b0000_1000; // covered by a merged range
    }
}

impl GridRenderer {
    /// Paint one drained background/content region across every quadrant.
    pub(crate) fn paint_region(
        &mut self,
        surfaces: &mut GridSurfaces,
        region: &PxRect,
        vp: &ViewportState,
    ) {
        for q in quadrants(vp) {
            let Some(clip) = region.intersect(&q.rect) else {
                continue;
            };
            let (rows, cols) = cell_range_in(&q, &clip, self.scroll.rows(), self.scroll.cols());
            self.paint_background_pane(surfaces.background.as_mut(), &q, &clip, vp, rows, cols);
            self.paint_content_pane(surfaces.content.as_mut(), &q, &clip, vp, rows, cols);
        }
    }

    fn paint_background_pane(
        &mut self,
        bg: &mut dyn Surface,
        q: &Quadrant,
        clip: &PxRect,
        vp: &ViewportState,
        rows: grid_axis::IndexRange,
        cols: grid_axis::IndexRange,
    ) {
        bg.save();
        bg.clip_rect(clip.x, clip.y, clip.w, clip.h);
        let grid_bg = self.theme.grid_bg.clone();
        bg.fill_rect(clip.x, clip.y, clip.w, clip.h, &grid_bg);

        self.paint_pattern(bg, q, clip, vp);

        let (header_rows, header_cols) = self.header_counts(vp);
        for row in rows.start..rows.end {
            let y = self.scroll.rows().position_of(row) - q.scroll_y;
            let h = self.scroll.rows().get_size(row);
            let mut run: Option<(f64, f64, String)> = None; // (x0, x1, color)
            for col in cols.start..cols.end {
                let x = self.scroll.cols().position_of(col) - q.scroll_x;
                let w = self.scroll.cols().get_size(col);
                let color = self.cell_fill_color(row, col, header_rows, header_cols);
                run = match (run.take(), color) {
                    (None, None) => None,
                    (None, Some(c)) => Some((x, x + w, c)),
                    (Some((x0, _, c0)), Some(c)) if c0 == c => Some((x0, x + w, c0)),
                    (Some((x0, x1, c0)), next) => {
                        bg.fill_rect(x0, y, x1 - x0, h, &c0);
                        next.map(|c| (x, x + w, c))
                    }
                };
            }
            if let Some((x0, x1, c0)) = run {
                bg.fill_rect(x0, y, x1 - x0, h, &c0);
            }
        }

        self.paint_borders(bg, q, clip, vp, rows, cols);
        bg.restore();
    }

    /// Effective fill for a cell position: header styling wins, then the
    /// covering merge anchor's fill, then the cell's own.
    fn cell_fill_color(
        &mut self,
        row: u32,
        col: u32,
        header_rows: u32,
        header_cols: u32,
    ) -> Option<String> {
        if row < header_rows || col < header_cols {
            return Some(self.theme.header_bg.clone());
        }
        let anchor = self.merged.resolve_cell(row, col);
        let cell = self.fetch_cell(anchor.row, anchor.col)?;
        cell.style.as_ref().and_then(|s| s.fill.clone())
    }

    /// Tiled background image: pre-rasterized at zoom·dpr, aligned to the
    /// data origin (first non-header cell) and clipped to the non-header
    /// part of the pane.
    fn paint_pattern(
        &mut self,
        bg: &mut dyn Surface,
        q: &Quadrant,
        clip: &PxRect,
        vp: &ViewportState,
    ) {
        if self.pattern_bitmap.is_none() {
            return;
        }
        self.ensure_pattern_tile();
        let (header_rows, header_cols) = self.header_counts(vp);
        let data_x = self.scroll.cols().position_of(header_cols) - q.scroll_x;
        let data_y = self.scroll.rows().position_of(header_rows) - q.scroll_y;
        let non_header = PxRect::new(
            clip.x.max(data_x),
            clip.y.max(data_y),
            (clip.right() - clip.x.max(data_x)).max(0.0),
            (clip.bottom() - clip.y.max(data_y)).max(0.0),
        );
        if !non_header.is_valid() {
            return;
        }
        if let Some(tile) = self.pattern_tile.as_ref() {
            bg.draw_pattern(
                tile.as_ref(),
                non_header.x,
                non_header.y,
                non_header.w,
                non_header.h,
                data_x,
                data_y,
            );
        }
    }

    fn ensure_pattern_tile(&mut self) {
        if self.pattern_tile.is_some() {
            return;
        }
        let Some(bitmap) = self.pattern_bitmap.as_ref() else {
            return;
        };
        let w = bitmap.width() as f64 * self.zoom;
        let h = bitmap.height() as f64 * self.zoom;
        if w <= 0.0 || h <= 0.0 {
            return;
        }
        if let Ok(mut tile) = self.surface_factory.create_surface(w, h, self.dpr) {
            tile.draw_bitmap(bitmap.as_ref(), 0.0, 0.0, w, h);
            self.pattern_tile = Some(tile);
        }
    }

    fn paint_content_pane(
        &mut self,
        content: &mut dyn Surface,
        q: &Quadrant,
        clip: &PxRect,
        vp: &ViewportState,
        rows: grid_axis::IndexRange,
        cols: grid_axis::IndexRange,
    ) {
        content.save();
        content.clip_rect(clip.x, clip.y, clip.w, clip.h);
        content.clear_rect(clip.x, clip.y, clip.w, clip.h);
        let (header_rows, header_cols) = self.header_counts(vp);

        // Text from cells outside the region can overflow into it, so the
        // painted column range widens by the probe cap (clipped drawing
        // keeps everything inside the region).
        let pad = self.config.overflow_columns;
        let ext_start = cols.start.saturating_sub(pad).max(q.cols.start);
        let ext_end = cols.end.saturating_add(pad).min(q.cols.end);

        for row in rows.start..rows.end {
            for col in ext_start..ext_end {
                if self.merged.should_skip_cell(row, col) {
                    continue;
                }
                let flags = self.cell_flags(row, col);
                let outside = col < cols.start || col >= cols.end;
                if outside && !flags.contains(CellFlags::BLOCKS_OVERFLOW) {
                    continue;
                }
                let Some(cell) = self.fetch_cell(row, col) else {
                    continue;
                };
                let rect = self.cell_paint_rect(row, col, q);
                if !rect.is_valid() {
                    continue;
                }
                self.perf.add_cells_painted(1);

                if flags.contains(CellFlags::HAS_IMAGE)
                    && let Some(image) = cell.image.clone()
                {
                    self.paint_cell_image(content, &rect, &image);
                }
                let is_header = row < header_rows || col < header_cols;
                self.paint_cell_text(content, &cell, &rect, q, row, col, is_header);
                if flags.contains(CellFlags::HAS_COMMENT)
                    && let Some(comment) = &cell.comment
                {
                    let color = if comment.resolved {
                        self.theme.comment_indicator_resolved.clone()
                    } else {
                        self.theme.comment_indicator.clone()
                    };
                    let s = COMMENT_INDICATOR * self.zoom;
                    content.fill_triangle(
                        [
                            (rect.right() - s, rect.y),
                            (rect.right(), rect.y),
                            (rect.right(), rect.y + s),
                        ],
                        &color,
                    );
                }
            }
        }
        content.restore();
    }

    /// Paint rect of a cell in pane coordinates: the merge rectangle for an
    /// anchor, the plain cell rect otherwise.
    pub(crate) fn cell_paint_rect(&mut self, row: u32, col: u32, q: &Quadrant) -> PxRect {
        let range = match self.merged.range_at(row, col) {
            Some(m) if m.start_row == row && m.start_col == col => m,
            _ => CellRange::single(row, col),
        };
        let x0 = self.scroll.cols().position_of(range.start_col) - q.scroll_x;
        let x1 = self.scroll.cols().position_of(range.end_col) - q.scroll_x;
        let y0 = self.scroll.rows().position_of(range.start_row) - q.scroll_y;
        let y1 = self.scroll.rows().position_of(range.end_row) - q.scroll_y;
        PxRect::new(x0, y0, x1 - x0, y1 - y0)
    }

    fn paint_cell_image(
        &mut self,
        content: &mut dyn Surface,
        rect: &PxRect,
        image: &grid_model::CellImage,
    ) {
        let pad = CELL_PAD_X * self.zoom;
        let inner = PxRect::new(
            rect.x + pad,
            rect.y + pad,
            (rect.w - pad * 2.0).max(0.0),
            (rect.h - pad * 2.0).max(0.0),
        );
        if !inner.is_valid() {
            return;
        }
        let resolver = self.image_resolver.clone();
        self.images
            .request(&image.id, resolver.as_deref(), self.clock.as_ref());
        if let Some(bitmap) = self.images.bitmap(&image.id) {
            // Contain-fit preserving aspect ratio, centered.
            let (bw, bh) = (bitmap.width() as f64, bitmap.height() as f64);
            if bw <= 0.0 || bh <= 0.0 {
                return;
            }
            let scale = (inner.w / bw).min(inner.h / bh);
            let dw = bw * scale;
            let dh = bh * scale;
            let dx = inner.x + (inner.w - dw) / 2.0;
            let dy = inner.y + (inner.h - dh) / 2.0;
            content.draw_bitmap(bitmap, dx, dy, dw, dh);
        } else {
            self.paint_image_placeholder(content, &inner, image.alt.as_deref());
        }
    }

    /// Checkerboard + alt-text label while a bitmap is pending (or failed).
    fn paint_image_placeholder(
        &mut self,
        content: &mut dyn Surface,
        inner: &PxRect,
        alt: Option<&str>,
    ) {
        let checker = self.theme.grid_line.clone();
        let square = PLACEHOLDER_CHECKER * self.zoom;
        let cols = (inner.w / square).ceil().min(16.0) as u32;
        let rows = (inner.h / square).ceil().min(16.0) as u32;
        content.save();
        content.clip_rect(inner.x, inner.y, inner.w, inner.h);
        for r in 0..rows {
            for c in 0..cols {
                if (r + c) % 2 == 0 {
                    continue;
                }
                content.fill_rect(
                    inner.x + c as f64 * square,
                    inner.y + r as f64 * square,
                    square,
                    square,
                    &checker,
                );
            }
        }
        if let Some(alt) = alt
            && !alt.is_empty()
        {
            let style = grid_surface::TextDrawStyle {
                color: self.theme.cell_text.clone(),
                font_family: "sans-serif".into(),
                font_size_px: 11.0 * self.zoom,
                weight: 400,
                italic: false,
            };
            content.fill_text(alt, inner.x + 2.0, inner.y + inner.h / 2.0, &style);
        }
        content.restore();
    }
}

/// Per-cell flag resolution shared by content paint and the overflow probe.
impl GridRenderer {
    pub(crate) fn cell_flags(&mut self, row: u32, col: u32) -> CellFlags {
        if let Some(&flags) = self.cell_flags_cache.get(&(row, col)) {
            return flags;
        }
        let mut flags = CellFlags::empty();
        if self.merged.range_at(row, col).is_some() {
            flags |= CellFlags::IN_MERGE;
        }
        if let Some(cell) = self.fetch_cell(row, col) {
            if cell.blocks_overflow() {
                flags |= CellFlags::BLOCKS_OVERFLOW;
            }
            if cell.image.is_some() {
                flags |= CellFlags::HAS_IMAGE;
            }
            if cell.comment.is_some() {
                flags |= CellFlags::HAS_COMMENT;
            }
        }
        self.cell_flags_cache.insert((row, col), flags);
        flags
    }

    /// A column blocks overflow when its cell has a value, rich text, an
    /// image, or lies inside a merge.
    pub(crate) fn is_blocked(&mut self, row: u32, col: u32) -> bool {
        self.cell_flags(row, col)
            .intersects(CellFlags::IN_MERGE | CellFlags::BLOCKS_OVERFLOW)
    }
}
