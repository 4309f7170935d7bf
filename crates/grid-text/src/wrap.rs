//! Line breaking for the metric engine.
//!
//! Word mode breaks at Unicode word boundaries and falls back to
//! cluster-level breaking for a single word wider than the line. Anywhere
//! mode breaks at any grapheme boundary. Both operate on byte ranges into
//! the paragraph so callers can slice run structures against the result.

use grid_model::WrapMode;
use unicode_segmentation::UnicodeSegmentation;

use crate::engine::FontSpec;
use crate::width::WidthModel;

/// Byte range of one line within the paragraph (trailing break removed).
pub type LineSpan = (usize, usize);

/// Break one paragraph (no embedded newlines) into line spans.
pub fn break_paragraph(
    text: &str,
    font: &FontSpec,
    max_width: f64,
    wrap: WrapMode,
) -> Vec<LineSpan> {
    if text.is_empty() {
        return vec![(0, 0)];
    }
    match wrap {
        WrapMode::None => vec![(0, text.len())],
        WrapMode::Anywhere => break_anywhere(text, font, max_width),
        WrapMode::Word => break_words(text, font, max_width),
    }
}

fn cluster_width(cluster: &str, font: &FontSpec) -> f64 {
    WidthModel::cluster_advance(cluster, font) * font.size_px
}

fn break_anywhere(text: &str, font: &FontSpec, max_width: f64) -> Vec<LineSpan> {
    let mut lines = Vec::new();
    let mut start = 0usize;
    let mut width = 0.0;
    for (off, g) in text.grapheme_indices(true) {
        let w = cluster_width(g, font);
        if off > start && width + w > max_width {
            lines.push((start, off));
            start = off;
            width = 0.0;
        }
        width += w;
    }
    lines.push((start, text.len()));
    lines
}

fn break_words(text: &str, font: &FontSpec, max_width: f64) -> Vec<LineSpan> {
    let mut lines: Vec<LineSpan> = Vec::new();
    let mut line_start = 0usize;
    let mut line_width = 0.0;

    let word_w = |word: &str| -> f64 {
        word.graphemes(true).map(|g| cluster_width(g, font)).sum()
    };

    // Breaks the overlong word internally; full fragments close out as lines
    // and the final fragment stays open as the current line.
    let spill_word = |off: usize,
                          word: &str,
                          lines: &mut Vec<LineSpan>,
                          line_start: &mut usize,
                          line_width: &mut f64| {
        let frags = break_anywhere(word, font, max_width);
        let (last, full) = frags.split_last().expect("anywhere break yields a line");
        for &(s, e) in full {
            lines.push((off + s, off + e));
        }
        *line_start = off + last.0;
        *line_width = word_w(&word[last.0..last.1]);
    };

    for (off, word) in text.split_word_bound_indices() {
        let width = word_w(word);
        if line_width + width <= max_width {
            line_width += width;
            continue;
        }
        if off == line_start {
            // Line is empty; the word is overlong on its own.
            spill_word(off, word, &mut lines, &mut line_start, &mut line_width);
            continue;
        }
        lines.push((line_start, off));
        if word.trim().is_empty() {
            // The breaking space vanishes at the wrap point.
            line_start = off + word.len();
            line_width = 0.0;
        } else if width > max_width {
            spill_word(off, word, &mut lines, &mut line_start, &mut line_width);
        } else {
            line_start = off;
            line_width = width;
        }
    }
    if line_start < text.len() || lines.is_empty() {
        lines.push((line_start, text.len()));
    }
    lines
}
