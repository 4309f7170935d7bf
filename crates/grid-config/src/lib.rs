//! Runtime configuration loading and parsing.
//!
//! Parses `gridline.toml` (or an override path supplied by the host) into
//! renderer tunables: perf-stat collection, image guard limits, the text
//! overflow probe cap, and the image decode retry window. Unknown fields are
//! ignored (TOML deserialization tolerance) so the file format can grow
//! without breaking older builds. Raw parsed values are retained; clamping
//! against the live viewport happens in [`GridConfig::apply_context`] so a
//! later resize can re-clamp from the originals.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::{fs, path::PathBuf};
use tracing::info;

/// Hard ceiling for the overflow probe regardless of configuration.
const OVERFLOW_COLUMNS_MAX: u32 = 128;

#[derive(Debug, Deserialize, Default, Clone)]
pub struct PerfSection {
    /// Collect per-frame paint statistics.
    #[serde(default)]
    pub stats: Option<bool>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ImageSection {
    /// Maximum advertised width/height accepted by the header guard.
    #[serde(default)]
    pub max_dimension: Option<u32>,
    /// Maximum advertised pixel count accepted by the header guard.
    #[serde(default)]
    pub max_pixels: Option<u64>,
    /// Milliseconds before a failed decode becomes retryable.
    #[serde(default)]
    pub retry_ms: Option<f64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct TextSection {
    /// Cap on columns probed for single-line overflow.
    #[serde(default)]
    pub overflow_columns: Option<u32>,
}

#[derive(Debug, Deserialize, Default, Clone)]
struct RawConfig {
    #[serde(default)]
    perf: PerfSection,
    #[serde(default)]
    image: ImageSection,
    #[serde(default)]
    text: TextSection,
}

/// Effective configuration after defaults and clamping.
#[derive(Debug, Clone, PartialEq)]
pub struct GridConfig {
    pub perf_stats: bool,
    pub image_max_dimension: u32,
    pub image_max_pixels: u64,
    pub image_retry_ms: f64,
    pub overflow_columns: u32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            perf_stats: cfg!(debug_assertions),
            image_max_dimension: 10_000,
            image_max_pixels: 50_000_000,
            image_retry_ms: 250.0,
            overflow_columns: OVERFLOW_COLUMNS_MAX,
        }
    }
}

impl GridConfig {
    /// Load from an explicit path, or fall back to `gridline.toml` in the
    /// working directory. A missing file yields the defaults; a malformed
    /// file is an error.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let path = path.unwrap_or_else(|| PathBuf::from("gridline.toml"));
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let cfg = Self::from_toml(&raw)?;
        info!(
            path = %path.display(),
            perf_stats = cfg.perf_stats,
            overflow_columns = cfg.overflow_columns,
            "grid config loaded"
        );
        Ok(cfg)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let parsed: RawConfig = toml::from_str(raw).context("parsing grid config")?;
        let defaults = Self::default();
        Ok(Self {
            perf_stats: parsed.perf.stats.unwrap_or(defaults.perf_stats),
            image_max_dimension: parsed
                .image
                .max_dimension
                .unwrap_or(defaults.image_max_dimension)
                .max(1),
            image_max_pixels: parsed
                .image
                .max_pixels
                .unwrap_or(defaults.image_max_pixels)
                .max(1),
            image_retry_ms: parsed
                .image
                .retry_ms
                .filter(|ms| ms.is_finite() && *ms >= 0.0)
                .unwrap_or(defaults.image_retry_ms),
            overflow_columns: parsed
                .text
                .overflow_columns
                .unwrap_or(defaults.overflow_columns)
                .clamp(0, OVERFLOW_COLUMNS_MAX),
        })
    }

    /// Clamp values that depend on the live viewport. The overflow probe cap
    /// never exceeds the number of columns that could possibly be visible.
    pub fn apply_context(&mut self, viewport_cols_hint: u32) {
        if viewport_cols_hint > 0 {
            self.overflow_columns = self.overflow_columns.min(viewport_cols_hint.max(1) * 4);
        }
    }
}
