//! Cell styling: fills, fonts, alignment, wrapping, and borders.
//!
//! Border styles carry a rank used by collapsed-edge conflict resolution:
//! `double > solid > dashed > dotted`. Width ties fall back to rank, then to
//! positional preference, so two adjacent cells always agree on a winner
//! regardless of paint order.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WrapMode {
    #[default]
    None,
    Word,
    Anywhere,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Auto,
    Ltr,
    Rtl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HorizontalAlign {
    Left,
    Right,
    Center,
    #[default]
    Start,
    End,
    Justify,
    Fill,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerticalAlign {
    Top,
    Middle,
    #[default]
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnderlineStyle {
    #[default]
    Single,
    Double,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontVariantPosition {
    #[default]
    Normal,
    Subscript,
    Superscript,
}

/// Line style of a border stroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BorderLineStyle {
    #[default]
    Solid,
    Dashed,
    Dotted,
    Double,
}

impl BorderLineStyle {
    /// Tie-break rank for collapsed edges. Higher wins.
    pub fn rank(self) -> u8 {
        match self {
            BorderLineStyle::Double => 3,
            BorderLineStyle::Solid => 2,
            BorderLineStyle::Dashed => 1,
            BorderLineStyle::Dotted => 0,
        }
    }
}

/// One border stroke specification. `width` is in CSS pixels at zoom 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BorderSpec {
    pub style: BorderLineStyle,
    pub width: f64,
    pub color: String,
}

impl BorderSpec {
    pub fn solid(width: f64, color: impl Into<String>) -> Self {
        Self {
            style: BorderLineStyle::Solid,
            width,
            color: color.into(),
        }
    }
}

/// Diagonal borders drawn inside the cell rect, above side borders.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DiagonalBorders {
    pub spec: Option<BorderSpec>,
    /// Top-left to bottom-right.
    pub down: bool,
    /// Bottom-left to top-right.
    pub up: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CellBorders {
    pub top: Option<BorderSpec>,
    pub right: Option<BorderSpec>,
    pub bottom: Option<BorderSpec>,
    pub left: Option<BorderSpec>,
    pub diagonal: Option<DiagonalBorders>,
}

impl CellBorders {
    pub fn is_empty(&self) -> bool {
        self.top.is_none()
            && self.right.is_none()
            && self.bottom.is_none()
            && self.left.is_none()
            && self.diagonal.is_none()
    }
}

/// Full per-cell style. All fields optional-by-default; the renderer resolves
/// unset fields against the theme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellStyle {
    pub fill: Option<String>,
    pub text_color: Option<String>,
    pub font_family: Option<String>,
    pub font_size_px: Option<f64>,
    pub bold: bool,
    pub italic: bool,
    pub wrap_mode: WrapMode,
    pub direction: Direction,
    pub horizontal_align: HorizontalAlign,
    pub vertical_align: VerticalAlign,
    pub rotation_deg: f64,
    pub underline: bool,
    pub underline_style: UnderlineStyle,
    pub strike: bool,
    pub borders: CellBorders,
    pub text_indent_px: f64,
    pub font_variant_position: FontVariantPosition,
}

impl Default for CellStyle {
    fn default() -> Self {
        Self {
            fill: None,
            text_color: None,
            font_family: None,
            font_size_px: None,
            bold: false,
            italic: false,
            wrap_mode: WrapMode::None,
            direction: Direction::Auto,
            horizontal_align: HorizontalAlign::Start,
            vertical_align: VerticalAlign::Bottom,
            rotation_deg: 0.0,
            underline: false,
            underline_style: UnderlineStyle::Single,
            strike: false,
            borders: CellBorders::default(),
            text_indent_px: 0.0,
            font_variant_position: FontVariantPosition::Normal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn style_rank_ordering() {
        assert!(BorderLineStyle::Double.rank() > BorderLineStyle::Solid.rank());
        assert!(BorderLineStyle::Solid.rank() > BorderLineStyle::Dashed.rank());
        assert!(BorderLineStyle::Dashed.rank() > BorderLineStyle::Dotted.rank());
    }

    #[test]
    fn empty_borders() {
        assert!(CellBorders::default().is_empty());
        let mut b = CellBorders::default();
        b.top = Some(BorderSpec::solid(1.0, "#000"));
        assert!(!b.is_empty());
    }
}
