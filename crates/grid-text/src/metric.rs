//! Deterministic layout engine over the advance-width model.
//!
//! Geometry is exact and repeatable: no platform font stack is consulted, so
//! the renderer's paint decisions (overflow probing, clip extents, handle
//! placement) can be asserted in tests byte-for-byte.

use std::cell::RefCell;

use grid_model::{Direction, WrapMode};

use crate::engine::{
    detect_base_direction, resolve_align, BaseDirection, FontSpec, LayoutContent, LayoutLine,
    LayoutParams, LayoutRun, LineRun, TextAlign, TextLayout, TextLayoutEngine, TextMetrics,
};
use crate::width::WidthModel;
use crate::wrap::break_paragraph;

/// Default line height multiplier when the caller supplies none.
const LINE_HEIGHT_EM: f64 = 1.25;

#[derive(Debug, Default)]
pub struct MetricTextEngine {
    widths: RefCell<WidthModel>,
}

impl MetricTextEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn measure_slice(&self, text: &str, font: &FontSpec) -> f64 {
        self.widths.borrow_mut().measure(text, font).width
    }
}

impl TextLayoutEngine for MetricTextEngine {
    fn measure(&self, text: &str, font: &FontSpec) -> TextMetrics {
        self.widths.borrow_mut().measure(text, font)
    }

    fn layout(&self, params: &LayoutParams<'_>) -> TextLayout {
        let (full_text, runs): (String, Option<&[LayoutRun]>) = match &params.content {
            LayoutContent::Text(s) => ((*s).to_string(), None),
            LayoutContent::Runs(rs) => (rs.iter().map(|r| r.text.as_str()).collect(), Some(*rs)),
        };

        let base = match params.direction {
            Direction::Ltr => BaseDirection::Ltr,
            Direction::Rtl => BaseDirection::Rtl,
            Direction::Auto => detect_base_direction(&full_text),
        };
        let align = resolve_align(params.align, base);
        let line_height = params
            .line_height_px
            .unwrap_or(params.font.size_px * LINE_HEIGHT_EM);

        // Paragraphs split on explicit newlines, then wrapped independently.
        let mut spans: Vec<(usize, usize)> = Vec::new();
        let mut para_start = 0usize;
        for (i, b) in full_text.bytes().enumerate() {
            if b == b'\n' {
                push_paragraph(&mut spans, &full_text[para_start..i], para_start, params);
                para_start = i + 1;
            }
        }
        push_paragraph(&mut spans, &full_text[para_start..], para_start, params);

        if let Some(max_lines) = params.max_lines {
            spans.truncate(max_lines.max(1));
        }

        let mut lines = Vec::with_capacity(spans.len());
        let mut layout_width = 0.0f64;
        for &(start, end) in &spans {
            let raw = &full_text[start..end];
            // Trailing break whitespace does not participate in alignment.
            let display = raw.trim_end();
            let width = self.measure_slice(display, &params.font);
            let x = match align {
                TextAlign::Left | TextAlign::Start => 0.0,
                TextAlign::Right | TextAlign::End => params.max_width - width,
                TextAlign::Center => (params.max_width - width) / 2.0,
            };

            let line_runs = match runs {
                None => {
                    let m = self.measure(display, &params.font);
                    vec![LineRun {
                        text: display.to_string(),
                        font: params.font.clone(),
                        color: None,
                        underline: false,
                        strike: false,
                        x: 0.0,
                        width: m.width,
                    }]
                }
                Some(rs) => slice_runs(self, rs, start, end),
            };

            let (ascent, descent) = line_runs.iter().fold(
                (
                    params.font.size_px * 0.8,
                    params.font.size_px * 0.2,
                ),
                |(a, d), r| (a.max(r.font.size_px * 0.8), d.max(r.font.size_px * 0.2)),
            );

            layout_width = layout_width.max(width);
            lines.push(LayoutLine {
                x,
                width,
                ascent,
                descent,
                text: display.to_string(),
                runs: line_runs,
            });
        }

        TextLayout {
            width: layout_width,
            height: lines.len() as f64 * line_height,
            line_height,
            lines,
        }
    }
}

fn push_paragraph(
    spans: &mut Vec<(usize, usize)>,
    para: &str,
    offset: usize,
    params: &LayoutParams<'_>,
) {
    let wrap = match params.wrap_mode {
        WrapMode::None => WrapMode::None,
        other if params.max_width.is_finite() && params.max_width > 0.0 => other,
        _ => WrapMode::None,
    };
    for (s, e) in break_paragraph(para, &params.font, params.max_width, wrap) {
        spans.push((offset + s, offset + e));
    }
}

/// Intersect the styled runs with one line's byte range, producing
/// positioned per-run fragments.
fn slice_runs(
    engine: &MetricTextEngine,
    runs: &[LayoutRun],
    line_start: usize,
    line_end: usize,
) -> Vec<LineRun> {
    let mut out = Vec::new();
    let mut run_start = 0usize;
    let mut x = 0.0f64;
    for run in runs {
        let run_end = run_start + run.text.len();
        let s = run_start.max(line_start);
        let e = run_end.min(line_end);
        if s < e {
            let frag = &run.text[s - run_start..e - run_start];
            let width = engine.measure_slice(frag, &run.font);
            out.push(LineRun {
                text: frag.to_string(),
                font: run.font.clone(),
                color: run.color.clone(),
                underline: run.underline,
                strike: run.strike,
                x,
                width,
            });
            x += width;
        }
        run_start = run_end;
        if run_start >= line_end {
            break;
        }
    }
    out
}
