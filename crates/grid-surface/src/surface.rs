//! The 2D raster surface contract.
//!
//! Mirrors the operation set of a canvas 2D context, trimmed to what the
//! grid painter actually emits: rect fills/clears, rect clips under
//! save/restore, batched segment strokes, text, bitmap/surface copies,
//! repeating patterns, and rotation about a point. Implementations own a
//! DPR-scaled backing store; all coordinates arriving here are CSS pixels
//! and the backing transform `(dpr, 0, 0, dpr, 0, 0)` is applied by
//! `resize`. Image smoothing stays disabled so blit copies are exact.

use std::any::Any;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SurfaceError {
    #[error("2d context unavailable")]
    ContextUnavailable,
    #[error("invalid device pixel ratio {dpr}")]
    InvalidDpr { dpr: f64 },
    #[error("surface creation failed: {reason}")]
    CreationFailed { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineCap {
    #[default]
    Butt,
    Square,
}

/// Resolved text paint parameters. The renderer resolves theme tokens and
/// font fields before emitting; surfaces never consult styles.
#[derive(Debug, Clone, PartialEq)]
pub struct TextDrawStyle {
    pub color: String,
    pub font_family: String,
    pub font_size_px: f64,
    pub weight: u16,
    pub italic: bool,
}

/// A decoded raster image.
pub trait Bitmap {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    /// Release backing resources. Idempotent.
    fn close(&mut self) {}
    fn as_any(&self) -> &dyn Any;
}

/// One raster layer (or an offscreen scratch/tile surface).
pub trait Surface {
    /// CSS-pixel size of the drawing area.
    fn size(&self) -> (f64, f64);
    fn dpr(&self) -> f64;

    /// Reallocate the backing store at `width × height` CSS pixels scaled by
    /// `dpr`, reset the transform to `(dpr, 0, 0, dpr, 0, 0)` and disable
    /// image smoothing. Clears all pixels.
    fn resize(&mut self, width: f64, height: f64, dpr: f64);

    /// True when a 2D context has been acquired. `attach` refuses surfaces
    /// that report `false`.
    fn context_ready(&self) -> bool {
        true
    }

    fn save(&mut self);
    fn restore(&mut self);
    /// `beginPath; rect; clip` collapsed into one call — the painter only
    /// ever clips to axis-aligned rects.
    fn clip_rect(&mut self, x: f64, y: f64, w: f64, h: f64);

    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: &str);
    fn clear_rect(&mut self, x: f64, y: f64, w: f64, h: f64);

    /// Stroke a batch of segments sharing one style. `dash` is the dash
    /// pattern in CSS pixels; empty means solid.
    fn stroke_segments(
        &mut self,
        segments: &[(f64, f64, f64, f64)],
        color: &str,
        line_width: f64,
        dash: &[f64],
        cap: LineCap,
    );

    fn fill_text(&mut self, text: &str, x: f64, y: f64, style: &TextDrawStyle);

    /// Fill a triangle (comment indicators). The only non-rect path the
    /// painter emits.
    fn fill_triangle(&mut self, points: [(f64, f64); 3], color: &str);

    fn draw_bitmap(&mut self, bitmap: &dyn Bitmap, dx: f64, dy: f64, dw: f64, dh: f64);

    /// Copy a sub-rect of another surface (or this surface's scratch twin)
    /// into this one. Coordinates are CSS pixels on both sides.
    #[allow(clippy::too_many_arguments)]
    fn draw_surface(
        &mut self,
        src: &dyn Surface,
        sx: f64,
        sy: f64,
        sw: f64,
        sh: f64,
        dx: f64,
        dy: f64,
        dw: f64,
        dh: f64,
    );

    /// Fill `rect` with `tile` repeated, phase-aligned so that tile origin
    /// lands on `(origin_x, origin_y)`.
    #[allow(clippy::too_many_arguments)]
    fn draw_pattern(
        &mut self,
        tile: &dyn Surface,
        x: f64,
        y: f64,
        w: f64,
        h: f64,
        origin_x: f64,
        origin_y: f64,
    );

    /// Concatenate a rotation about `(cx, cy)` onto the current transform.
    /// Callers bracket this in `save`/`restore`.
    fn rotate_about(&mut self, cx: f64, cy: f64, angle_rad: f64);

    fn as_any(&self) -> &dyn Any;
}

/// Creates offscreen surfaces (blit scratch buffers, pattern tiles).
pub trait SurfaceFactory {
    fn create_surface(&self, width: f64, height: f64, dpr: f64)
        -> Result<Box<dyn Surface>, SurfaceError>;
}

/// Configure a layer's backing store, validating the device pixel ratio.
pub fn setup_backing_store(
    surface: &mut dyn Surface,
    width: f64,
    height: f64,
    dpr: f64,
) -> Result<(), SurfaceError> {
    if !dpr.is_finite() || dpr <= 0.0 {
        return Err(SurfaceError::InvalidDpr { dpr });
    }
    if !surface.context_ready() {
        return Err(SurfaceError::ContextUnavailable);
    }
    surface.resize(width.max(0.0), height.max(0.0), dpr);
    Ok(())
}
