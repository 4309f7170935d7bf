//! Deterministic advance-width model.
//!
//! Every width decision in the metric engine flows through [`WidthModel`]:
//! cluster advances are `unicode-width` columns scaled by a per-font em
//! factor, so a width-2 CJK cluster advances one full em and ordinary Latin
//! advances 0.6 em. Bold adds a small tracking bump. Whole-string
//! measurements are cached in an LRU keyed by `(text, font)`.

use grid_model::LruCache;
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::engine::{FontSpec, TextMetrics};

/// Fraction of the font size a single-column cluster advances.
const NARROW_ADVANCE_EM: f64 = 0.6;
/// Extra tracking applied to weights ≥ 600.
const BOLD_ADVANCE_EM: f64 = 0.02;
/// Ascent/descent split of the em box.
const ASCENT_EM: f64 = 0.8;
const DESCENT_EM: f64 = 0.2;

const MEASURE_CACHE_MAX: usize = 4_096;

type MeasureKey = (String, (String, u64, u16, bool));

#[derive(Debug, Default)]
pub struct WidthModel {
    cache: LruCache<MeasureKey, f64>,
}

impl WidthModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance width of a single grapheme cluster, in em units.
    pub fn cluster_advance(cluster: &str, font: &FontSpec) -> f64 {
        let columns = UnicodeWidthStr::width(cluster);
        let bold = if font.weight >= 600 { BOLD_ADVANCE_EM } else { 0.0 };
        match columns {
            // Combining-only clusters advance nothing.
            0 => 0.0,
            1 => NARROW_ADVANCE_EM + bold,
            // Width-2 clusters take a full em.
            _ => 1.0 + bold,
        }
    }

    /// Uncached string width.
    fn raw_width(text: &str, font: &FontSpec) -> f64 {
        let mut w = 0.0;
        for g in text.graphemes(true) {
            w += Self::cluster_advance(g, font);
        }
        w * font.size_px
    }

    /// Cached measurement of a whole string.
    pub fn measure(&mut self, text: &str, font: &FontSpec) -> TextMetrics {
        let key = (text.to_string(), font.cache_key());
        let cached = self.cache.get(&key).copied();
        let width = match cached {
            Some(w) => w,
            None => {
                let w = Self::raw_width(text, font);
                if self.cache.len() >= MEASURE_CACHE_MAX {
                    self.cache.pop_oldest();
                }
                self.cache.insert(key, w);
                w
            }
        };
        TextMetrics {
            width,
            ascent: font.size_px * ASCENT_EM,
            descent: font.size_px * DESCENT_EM,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_scales_with_font_size() {
        let mut m = WidthModel::new();
        let f12 = FontSpec::new("Arial", 12.0);
        let f24 = FontSpec::new("Arial", 24.0);
        let a = m.measure("abc", &f12).width;
        let b = m.measure("abc", &f24).width;
        assert!((b - a * 2.0).abs() < 1e-9);
    }

    #[test]
    fn wide_clusters_are_wider() {
        let mut m = WidthModel::new();
        let f = FontSpec::new("Arial", 10.0);
        let narrow = m.measure("a", &f).width;
        let wide = m.measure("漢", &f).width;
        assert!(wide > narrow * 1.5);
    }

    #[test]
    fn bold_tracks_wider() {
        let mut m = WidthModel::new();
        let f = FontSpec::new("Arial", 10.0);
        let b = FontSpec::new("Arial", 10.0).bold();
        assert!(m.measure("title", &b).width > m.measure("title", &f).width);
    }

    #[test]
    fn metrics_split_em_box() {
        let mut m = WidthModel::new();
        let f = FontSpec::new("Arial", 20.0);
        let met = m.measure("x", &f);
        assert_eq!(met.ascent, 16.0);
        assert_eq!(met.descent, 4.0);
    }

    #[test]
    fn cache_hits_are_stable() {
        let mut m = WidthModel::new();
        let f = FontSpec::new("Arial", 12.0);
        let a = m.measure("stable", &f).width;
        let b = m.measure("stable", &f).width;
        assert_eq!(a, b);
    }
}
