//! Cell text painting.
//!
//! Three paths, cheapest first:
//!
//! * **fast single-line** — no wrap, no newline, no rotation, plain text:
//!   one measure, one `fill_text`, clipped only when the text exceeds the
//!   cell.
//! * **overflow probing** — a clipped left/right-aligned single line probes
//!   adjacent columns in the overflow direction and widens the clip across
//!   empty neighbors, stopping at any blocked column (value, rich text,
//!   image, or merge) or at the probe cap. Only the clip grows; the text
//!   layout itself never changes.
//! * **layout** — wrap, newlines, rotation, rich runs, justify: delegate to
//!   the layout engine and paint its line boxes, rotating the transform
//!   about the cell center when needed.
//!
//! `fill` alignment repeats the single-line content across the cell (≤ 512
//! repetitions); `justify` widens inter-word gaps on every wrapped line but
//! the last. Decorations (underline, double underline, strike) stroke in
//! batches keyed by color and width, clipped to the cell rect even when the
//! text itself overflows into neighbors.

use grid_model::{Cell, CellStyle, HorizontalAlign, PxRect, UnderlineStyle, VerticalAlign, WrapMode};
use grid_surface::{LineCap, Surface, TextDrawStyle};
use grid_text::{
    detect_base_direction, resolve_align, BaseDirection, FontSpec, LayoutContent, LayoutParams,
    LayoutRun, TextAlign, TextLayoutEngine,
};

use crate::quadrant::Quadrant;
use crate::renderer::{GridRenderer, CELL_PAD_X, CELL_PAD_Y};

/// Hard cap on `fill` repetitions.
const MAX_FILL_REPEAT: usize = 512;

const DEFAULT_FONT_FAMILY: &str = "sans-serif";
const DEFAULT_FONT_SIZE: f64 = 12.0;

/// Cell font resolution shared with auto-fit.
pub(crate) fn resolve_font(cell: &Cell, zoom: f64) -> FontSpec {
    let style = cell.style.as_ref();
    let mut size = style
        .and_then(|s| s.font_size_px)
        .unwrap_or(DEFAULT_FONT_SIZE);
    if style.is_some_and(|s| {
        s.font_variant_position != grid_model::FontVariantPosition::Normal
    }) {
        size *= 0.75;
    }
    let mut font = FontSpec::new(
        style
            .and_then(|s| s.font_family.clone())
            .unwrap_or_else(|| DEFAULT_FONT_FAMILY.to_string()),
        size * zoom,
    );
    if style.is_some_and(|s| s.bold) {
        font = font.bold();
    }
    if style.is_some_and(|s| s.italic) {
        font = font.italic();
    }
    font
}

/// Wrapped height of a cell's content at a given width (auto-fit rows).
pub(crate) fn measure_cell_height(
    engine: &dyn TextLayoutEngine,
    cell: &Cell,
    text: &str,
    max_width: f64,
) -> f64 {
    let style = cell.style.clone().unwrap_or_default();
    let font = resolve_font(cell, 1.0);
    let layout = engine.layout(&LayoutParams {
        content: LayoutContent::Text(text),
        font,
        max_width: max_width.max(1.0),
        wrap_mode: style.wrap_mode,
        align: TextAlign::Start,
        direction: style.direction,
        line_height_px: None,
        max_lines: None,
    });
    layout.height
}

struct DecorationBatch {
    color: String,
    line_width: f64,
    segments: Vec<(f64, f64, f64, f64)>,
}

fn push_decoration(
    batches: &mut Vec<DecorationBatch>,
    color: &str,
    line_width: f64,
    seg: (f64, f64, f64, f64),
) {
    if let Some(b) = batches
        .iter_mut()
        .find(|b| b.color == color && b.line_width == line_width)
    {
        b.segments.push(seg);
        return;
    }
    batches.push(DecorationBatch {
        color: color.to_string(),
        line_width,
        segments: vec![seg],
    });
}

impl GridRenderer {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn paint_cell_text(
        &mut self,
        content: &mut dyn Surface,
        cell: &Cell,
        rect: &PxRect,
        q: &Quadrant,
        row: u32,
        col: u32,
        is_header: bool,
    ) {
        let has_rich = cell
            .rich_text
            .as_ref()
            .is_some_and(|runs| runs.iter().any(|r| !r.text.is_empty()));
        let text = self.format_cell_text(cell);
        if text.is_empty() && !has_rich {
            return;
        }

        let style = cell.style.clone().unwrap_or_default();
        let color = self.resolve_text_color(cell, &style, is_header);
        let font = resolve_font(cell, self.zoom);
        let zoom = self.zoom;
        let pad_x = CELL_PAD_X * zoom;
        let inner_w = (rect.w - pad_x * 2.0).max(0.0);

        if style.horizontal_align == HorizontalAlign::Fill && !has_rich {
            self.paint_fill_repeat(content, &text, &font, &color, rect, &style);
            return;
        }

        let fast = !has_rich
            && style.wrap_mode == WrapMode::None
            && !text.contains('\n')
            && style.rotation_deg == 0.0
            && style.horizontal_align != HorizontalAlign::Justify;
        if fast {
            self.paint_fast_single_line(content, cell, &text, &font, &color, rect, &style, q, row, col);
        } else {
            self.paint_layout_path(content, cell, &text, has_rich, &font, &color, rect, &style, inner_w);
        }
    }

    fn resolve_text_color(&self, cell: &Cell, style: &CellStyle, is_header: bool) -> String {
        if let Some(c) = &style.text_color {
            return c.clone();
        }
        if cell.is_error_value() {
            return self.theme.error_text.clone();
        }
        if is_header {
            return self.theme.header_text.clone();
        }
        self.theme.cell_text.clone()
    }

    // ------------------------------------------------------------------
    // Fast path + overflow probing
    // ------------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    fn paint_fast_single_line(
        &mut self,
        content: &mut dyn Surface,
        _cell: &Cell,
        text: &str,
        font: &FontSpec,
        color: &str,
        rect: &PxRect,
        style: &CellStyle,
        q: &Quadrant,
        row: u32,
        col: u32,
    ) {
        let zoom = self.zoom;
        let pad_x = CELL_PAD_X * zoom;
        let pad_y = CELL_PAD_Y * zoom;
        let indent = style.text_indent_px * zoom;
        let m = self.text_engine.measure(text, font);
        let inner_w = (rect.w - pad_x * 2.0).max(0.0);

        let base = detect_base_direction(text);
        let align = physical_align(style.horizontal_align, base);

        let x = match align {
            TextAlign::Right => rect.right() - pad_x - indent - m.width,
            TextAlign::Center => rect.x + (rect.w - m.width) / 2.0,
            _ => rect.x + pad_x + indent,
        };
        let baseline = baseline_for(style.vertical_align, rect, pad_y, m.ascent, m.descent)
            + variant_baseline_shift(style, font.size_px);

        let draw_style = text_draw_style(color, font);
        let overflows = m.width > inner_w;
        if !overflows {
            content.fill_text(text, x, baseline, &draw_style);
        } else {
            // Probe direction follows the alignment; centered clipped text
            // stays inside its own cell.
            let clip = match align {
                TextAlign::Left => self.overflow_clip(rect, q, row, col, true),
                TextAlign::Right => self.overflow_clip(rect, q, row, col, false),
                _ => *rect,
            };
            content.save();
            content.clip_rect(clip.x, clip.y, clip.w, clip.h);
            content.fill_text(text, x, baseline, &draw_style);
            content.restore();
        }

        self.stroke_decorations(content, style, color, rect, x, baseline, m.width, font.size_px);
    }

    /// Widen the clip rect across adjacent empty columns, stopping at the
    /// first blocked column or the probe cap. Only the clip expands.
    fn overflow_clip(&mut self, rect: &PxRect, q: &Quadrant, row: u32, col: u32, to_right: bool) -> PxRect {
        let span = self
            .merged
            .range_at(row, col)
            .unwrap_or_else(|| grid_model::CellRange::single(row, col));
        let cap = self.config.overflow_columns;
        let mut clip = *rect;
        let mut probed = 0u32;
        if to_right {
            let mut c = span.end_col;
            while probed < cap && c < q.cols.end {
                if self.is_blocked(row, c) {
                    break;
                }
                clip.w += self.scroll.cols().get_size(c);
                c += 1;
                probed += 1;
            }
        } else {
            let mut c = span.start_col;
            while probed < cap && c > q.cols.start {
                let probe = c - 1;
                if self.is_blocked(row, probe) {
                    break;
                }
                let w = self.scroll.cols().get_size(probe);
                clip.x -= w;
                clip.w += w;
                c = probe;
                probed += 1;
            }
        }
        clip
    }

    // ------------------------------------------------------------------
    // Fill repetition
    // ------------------------------------------------------------------

    fn paint_fill_repeat(
        &mut self,
        content: &mut dyn Surface,
        text: &str,
        font: &FontSpec,
        color: &str,
        rect: &PxRect,
        style: &CellStyle,
    ) {
        let zoom = self.zoom;
        let pad_x = CELL_PAD_X * zoom;
        let pad_y = CELL_PAD_Y * zoom;
        let m = self.text_engine.measure(text, font);
        if m.width <= 0.0 {
            return;
        }
        let inner_w = (rect.w - pad_x * 2.0).max(0.0);
        let count = ((inner_w / m.width).ceil() as usize).clamp(1, MAX_FILL_REPEAT);
        let baseline = baseline_for(style.vertical_align, rect, pad_y, m.ascent, m.descent);
        let draw_style = text_draw_style(color, font);
        content.save();
        content.clip_rect(rect.x, rect.y, rect.w, rect.h);
        for i in 0..count {
            content.fill_text(text, rect.x + pad_x + i as f64 * m.width, baseline, &draw_style);
        }
        content.restore();
    }

    // ------------------------------------------------------------------
    // Layout path
    // ------------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    fn paint_layout_path(
        &mut self,
        content: &mut dyn Surface,
        cell: &Cell,
        text: &str,
        has_rich: bool,
        font: &FontSpec,
        color: &str,
        rect: &PxRect,
        style: &CellStyle,
        inner_w: f64,
    ) {
        let zoom = self.zoom;
        let pad_x = CELL_PAD_X * zoom;
        let pad_y = CELL_PAD_Y * zoom;
        let justify = style.horizontal_align == HorizontalAlign::Justify;

        let runs: Vec<LayoutRun>;
        let layout_content = if has_rich {
            runs = cell
                .rich_text
                .as_ref()
                .map(|rs| rs.iter().map(|r| rich_to_layout_run(r, font, zoom)).collect())
                .unwrap_or_default();
            LayoutContent::Runs(&runs)
        } else {
            LayoutContent::Text(text)
        };

        let layout = self.text_engine.layout(&LayoutParams {
            content: layout_content,
            font: font.clone(),
            max_width: inner_w.max(1.0),
            wrap_mode: style.wrap_mode,
            align: if justify {
                TextAlign::Left
            } else {
                engine_align(style.horizontal_align)
            },
            direction: style.direction,
            line_height_px: None,
            max_lines: None,
        });
        if layout.lines.is_empty() {
            // Degraded fallback: a minimal clipped draw (the paint path
            // never surfaces engine failures).
            let draw_style = text_draw_style(color, font);
            content.save();
            content.clip_rect(rect.x, rect.y, rect.w, rect.h);
            content.fill_text(text, rect.x + pad_x, rect.bottom() - pad_y, &draw_style);
            content.restore();
            return;
        }

        let top = match style.vertical_align {
            VerticalAlign::Top => rect.y + pad_y,
            VerticalAlign::Middle => rect.y + (rect.h - layout.height) / 2.0,
            VerticalAlign::Bottom => rect.bottom() - pad_y - layout.height,
        };

        content.save();
        content.clip_rect(rect.x, rect.y, rect.w, rect.h);
        if style.rotation_deg != 0.0 {
            content.rotate_about(
                rect.x + rect.w / 2.0,
                rect.y + rect.h / 2.0,
                style.rotation_deg.to_radians(),
            );
        }

        let mut decorations: Vec<DecorationBatch> = Vec::new();
        for (i, line) in layout.lines.iter().enumerate() {
            let line_top = top + i as f64 * layout.line_height;
            let baseline =
                line_top + line.ascent + variant_baseline_shift(style, font.size_px);
            let is_last = i + 1 == layout.lines.len();
            if justify && !is_last && style.wrap_mode != WrapMode::None {
                self.draw_justified_line(content, line, font, color, rect.x + pad_x, baseline, inner_w);
            } else {
                for run in &line.runs {
                    let run_color = run.color.as_deref().unwrap_or(color);
                    let run_style = text_draw_style(run_color, &run.font);
                    let x = rect.x + pad_x + line.x + run.x;
                    content.fill_text(&run.text, x, baseline, &run_style);
                    if run.underline || style.underline {
                        push_decoration(
                            &mut decorations,
                            run_color,
                            1.0 * zoom,
                            (x, baseline + 2.0 * zoom, x + run.width, baseline + 2.0 * zoom),
                        );
                    }
                    if run.strike || style.strike {
                        let mid = baseline - run.font.size_px * 0.3;
                        push_decoration(&mut decorations, run_color, 1.0 * zoom, (x, mid, x + run.width, mid));
                    }
                }
            }
        }
        for batch in &decorations {
            content.stroke_segments(&batch.segments, &batch.color, batch.line_width, &[], LineCap::Butt);
        }
        content.restore();

    }

    /// Justified line: inter-word gaps expand to consume the leftover
    /// width.
    #[allow(clippy::too_many_arguments)]
    fn draw_justified_line(
        &mut self,
        content: &mut dyn Surface,
        line: &grid_text::LayoutLine,
        font: &FontSpec,
        color: &str,
        x0: f64,
        baseline: f64,
        inner_w: f64,
    ) {
        let words: Vec<&str> = line.text.split_whitespace().collect();
        if words.len() <= 1 {
            let draw_style = text_draw_style(color, font);
            content.fill_text(&line.text, x0, baseline, &draw_style);
            return;
        }
        let words_width: f64 = words
            .iter()
            .map(|w| self.text_engine.measure(w, font).width)
            .sum();
        let gap = ((inner_w - words_width) / (words.len() - 1) as f64).max(0.0);
        let draw_style = text_draw_style(color, font);
        let mut x = x0;
        for word in words {
            content.fill_text(word, x, baseline, &draw_style);
            x += self.text_engine.measure(word, font).width + gap;
        }
    }

    // ------------------------------------------------------------------
    // Decorations (fast path)
    // ------------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    fn stroke_decorations(
        &mut self,
        content: &mut dyn Surface,
        style: &CellStyle,
        color: &str,
        rect: &PxRect,
        x: f64,
        baseline: f64,
        width: f64,
        font_size: f64,
    ) {
        if !style.underline && !style.strike {
            return;
        }
        let zoom = self.zoom;
        let lw = 1.0 * zoom;
        let mut batches: Vec<DecorationBatch> = Vec::new();
        if style.underline {
            let y = baseline + 2.0 * zoom;
            push_decoration(&mut batches, color, lw, (x, y, x + width, y));
            if style.underline_style == UnderlineStyle::Double {
                let y2 = y + 2.0 * zoom;
                push_decoration(&mut batches, color, lw, (x, y2, x + width, y2));
            }
        }
        if style.strike {
            let y = baseline - font_size * 0.3;
            push_decoration(&mut batches, color, lw, (x, y, x + width, y));
        }
        // Decorations never follow overflow: clip to the cell rect.
        content.save();
        content.clip_rect(rect.x, rect.y, rect.w, rect.h);
        for batch in &batches {
            content.stroke_segments(&batch.segments, &batch.color, batch.line_width, &[], LineCap::Butt);
        }
        content.restore();
    }
}

fn text_draw_style(color: &str, font: &FontSpec) -> TextDrawStyle {
    TextDrawStyle {
        color: color.to_string(),
        font_family: font.family.clone(),
        font_size_px: font.size_px,
        weight: font.weight,
        italic: font.style == grid_text::FontStyle::Italic,
    }
}

/// Map the style's alignment to a physical side for the fast path.
fn physical_align(align: HorizontalAlign, base: BaseDirection) -> TextAlign {
    let logical = match align {
        HorizontalAlign::Left => TextAlign::Left,
        HorizontalAlign::Right => TextAlign::Right,
        HorizontalAlign::Center => TextAlign::Center,
        HorizontalAlign::Start | HorizontalAlign::Justify | HorizontalAlign::Fill => {
            TextAlign::Start
        }
        HorizontalAlign::End => TextAlign::End,
    };
    resolve_align(logical, base)
}

fn engine_align(align: HorizontalAlign) -> TextAlign {
    match align {
        HorizontalAlign::Left => TextAlign::Left,
        HorizontalAlign::Right => TextAlign::Right,
        HorizontalAlign::Center => TextAlign::Center,
        HorizontalAlign::End => TextAlign::End,
        _ => TextAlign::Start,
    }
}

fn baseline_for(valign: VerticalAlign, rect: &PxRect, pad_y: f64, ascent: f64, descent: f64) -> f64 {
    match valign {
        VerticalAlign::Top => rect.y + pad_y + ascent,
        VerticalAlign::Middle => rect.y + rect.h / 2.0 + (ascent - descent) / 2.0,
        VerticalAlign::Bottom => rect.bottom() - pad_y - descent,
    }
}

/// Sub/superscript baseline displacement.
fn variant_baseline_shift(style: &CellStyle, font_size: f64) -> f64 {
    match style.font_variant_position {
        grid_model::FontVariantPosition::Subscript => font_size * 0.15,
        grid_model::FontVariantPosition::Superscript => -font_size * 0.25,
        grid_model::FontVariantPosition::Normal => 0.0,
    }
}

fn rich_to_layout_run(run: &grid_model::RichTextRun, base: &FontSpec, zoom: f64) -> LayoutRun {
    let mut font = FontSpec::new(
        run.font_family.clone().unwrap_or_else(|| base.family.clone()),
        run.font_size_px.map(|s| s * zoom).unwrap_or(base.size_px),
    );
    font.weight = match run.bold {
        Some(true) => 700,
        Some(false) => 400,
        None => base.weight,
    };
    font.style = match run.italic {
        Some(true) => grid_text::FontStyle::Italic,
        Some(false) => grid_text::FontStyle::Normal,
        None => base.style,
    };
    LayoutRun {
        text: run.text.clone(),
        font,
        color: run.color.clone(),
        underline: run.underline.unwrap_or(false),
        strike: run.strike.unwrap_or(false),
    }
}
