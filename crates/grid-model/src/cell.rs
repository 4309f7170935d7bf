//! Cell values and display formatting.
//!
//! Cells arrive from the `CellProvider` and are never mutated by the
//! renderer. Display formatting follows spreadsheet conventions: empty cells
//! render nothing, booleans render `TRUE`/`FALSE`, numbers render with the
//! shortest round-trippable digits (exponent notation only at the extremes),
//! and strings beginning with `#` are treated as error values and painted in
//! the error theme color.

use std::borrow::Cow;

use crate::style::CellStyle;

/// Raw cell value as reported by the provider.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }
}

/// A styled run inside a rich-text cell. Unset fields inherit from the cell
/// style.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RichTextRun {
    pub text: String,
    pub color: Option<String>,
    pub font_family: Option<String>,
    pub font_size_px: Option<f64>,
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub underline: Option<bool>,
    pub strike: Option<bool>,
}

/// Cell comment. Resolved comments keep their indicator but render muted.
#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub text: String,
    pub resolved: bool,
}

/// Reference to an image anchored in a cell. The bytes live behind the image
/// resolver; the renderer only ever sees the id and the alt text.
#[derive(Debug, Clone, PartialEq)]
pub struct CellImage {
    pub id: String,
    pub alt: Option<String>,
}

/// Full cell payload handed out by the provider.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Cell {
    pub value: CellValue,
    pub style: Option<CellStyle>,
    pub comment: Option<Comment>,
    pub image: Option<CellImage>,
    pub rich_text: Option<Vec<RichTextRun>>,
}

impl Cell {
    pub fn with_value(value: CellValue) -> Self {
        Self {
            value,
            ..Self::default()
        }
    }

    pub fn with_text(text: impl Into<String>) -> Self {
        Self::with_value(CellValue::Text(text.into()))
    }

    pub fn with_number(n: f64) -> Self {
        Self::with_value(CellValue::Number(n))
    }

    /// True when the cell blocks text overflow from a neighbor: any value,
    /// any rich text run, or an anchored image.
    pub fn blocks_overflow(&self) -> bool {
        !self.value.is_empty()
            || self
                .rich_text
                .as_ref()
                .is_some_and(|runs| runs.iter().any(|r| !r.text.is_empty()))
            || self.image.is_some()
    }

    /// Formatted display text for the value.
    pub fn display_text(&self) -> Cow<'_, str> {
        match &self.value {
            CellValue::Empty => Cow::Borrowed(""),
            CellValue::Bool(true) => Cow::Borrowed("TRUE"),
            CellValue::Bool(false) => Cow::Borrowed("FALSE"),
            CellValue::Number(n) => Cow::Owned(format_number(*n)),
            CellValue::Text(s) => Cow::Borrowed(s.as_str()),
        }
    }

    /// Error values are strings beginning with `#` (`#DIV/0!`, `#REF!`, …).
    pub fn is_error_value(&self) -> bool {
        matches!(&self.value, CellValue::Text(s) if s.starts_with('#'))
    }
}

/// Plain number display: shortest round-trip digits, switching to exponent
/// notation only for magnitudes ≥ 1e21 or < 1e-6 so everyday values never
/// grow digit tails.
pub fn format_number(n: f64) -> String {
    if !n.is_finite() {
        return "#NUM!".to_string();
    }
    let abs = n.abs();
    if abs != 0.0 && !(1e-6..1e21).contains(&abs) {
        let mut s = format!("{n:e}");
        // `{:e}` prints `1.5e20`; normalize `e` exponents without sign to `e+`.
        if let Some(pos) = s.find('e')
            && !matches!(s.as_bytes().get(pos + 1), Some(b'-') | Some(b'+'))
        {
            s.insert(pos + 1, '+');
        }
        s
    } else {
        format!("{n}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_text_basics() {
        assert_eq!(Cell::default().display_text(), "");
        assert_eq!(Cell::with_value(CellValue::Bool(true)).display_text(), "TRUE");
        assert_eq!(Cell::with_value(CellValue::Bool(false)).display_text(), "FALSE");
        assert_eq!(Cell::with_number(42.0).display_text(), "42");
        assert_eq!(Cell::with_number(0.5).display_text(), "0.5");
        assert_eq!(Cell::with_text("hi").display_text(), "hi");
    }

    #[test]
    fn number_formatting_edges() {
        assert_eq!(format_number(0.0), "0");
        assert_eq!(format_number(-3.25), "-3.25");
        assert_eq!(format_number(1e21), "1e+21");
        assert_eq!(format_number(2.5e-7), "2.5e-7");
        assert_eq!(format_number(1e20), "100000000000000000000");
    }

    #[test]
    fn error_detection_is_prefix_based() {
        assert!(Cell::with_text("#REF!").is_error_value());
        assert!(Cell::with_text("#DIV/0!").is_error_value());
        assert!(!Cell::with_text("ref").is_error_value());
        assert!(!Cell::with_number(1.0).is_error_value());
    }

    #[test]
    fn overflow_blocking() {
        assert!(!Cell::default().blocks_overflow());
        assert!(Cell::with_number(1.0).blocks_overflow());
        let img = Cell {
            image: Some(CellImage {
                id: "img-1".into(),
                alt: None,
            }),
            ..Cell::default()
        };
        assert!(img.blocks_overflow());
        let rich = Cell {
            rich_text: Some(vec![RichTextRun {
                text: "x".into(),
                ..RichTextRun::default()
            }]),
            ..Cell::default()
        };
        assert!(rich.blocks_overflow());
        // Empty rich text list does not block.
        let empty_rich = Cell {
            rich_text: Some(vec![]),
            ..Cell::default()
        };
        assert!(!empty_rich.blocks_overflow());
    }
}
