//! Command-recording surface for headless tests.
//!
//! Every raster op is appended to a shared log; tests keep a handle to the
//! log and assert on paint order, clip scopes, blit copies and stroke
//! batching after driving the renderer. Nothing is rasterized.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use crate::surface::{Bitmap, LineCap, Surface, SurfaceError, SurfaceFactory, TextDrawStyle};

#[derive(Debug, Clone, PartialEq)]
pub enum RecordedOp {
    Resize {
        w: f64,
        h: f64,
        dpr: f64,
    },
    Save,
    Restore,
    ClipRect {
        x: f64,
        y: f64,
        w: f64,
        h: f64,
    },
    FillRect {
        x: f64,
        y: f64,
        w: f64,
        h: f64,
        color: String,
    },
    ClearRect {
        x: f64,
        y: f64,
        w: f64,
        h: f64,
    },
    StrokeSegments {
        segments: Vec<(f64, f64, f64, f64)>,
        color: String,
        line_width: f64,
        dash: Vec<f64>,
        cap: LineCap,
    },
    FillText {
        text: String,
        x: f64,
        y: f64,
        color: String,
    },
    FillTriangle {
        points: [(f64, f64); 3],
        color: String,
    },
    DrawBitmap {
        src_w: u32,
        src_h: u32,
        dx: f64,
        dy: f64,
        dw: f64,
        dh: f64,
    },
    DrawSurface {
        sx: f64,
        sy: f64,
        sw: f64,
        sh: f64,
        dx: f64,
        dy: f64,
        dw: f64,
        dh: f64,
    },
    DrawPattern {
        x: f64,
        y: f64,
        w: f64,
        h: f64,
        origin_x: f64,
        origin_y: f64,
    },
    RotateAbout {
        cx: f64,
        cy: f64,
        angle_rad: f64,
    },
}

pub type OpLog = Rc<RefCell<Vec<RecordedOp>>>;

#[derive(Debug)]
pub struct RecordingSurface {
    width: f64,
    height: f64,
    dpr: f64,
    ready: bool,
    ops: OpLog,
}

impl RecordingSurface {
    pub fn new(width: f64, height: f64, dpr: f64) -> Self {
        Self {
            width,
            height,
            dpr,
            ready: true,
            ops: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// A surface whose context acquisition failed; `attach` must reject it.
    pub fn broken(width: f64, height: f64) -> Self {
        let mut s = Self::new(width, height, 1.0);
        s.ready = false;
        s
    }

    /// Shared handle to the op log; stays valid after the surface moves into
    /// the renderer.
    pub fn log(&self) -> OpLog {
        Rc::clone(&self.ops)
    }

    pub fn take_ops(&self) -> Vec<RecordedOp> {
        std::mem::take(&mut *self.ops.borrow_mut())
    }
}

impl Surface for RecordingSurface {
    fn size(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    fn dpr(&self) -> f64 {
        self.dpr
    }

    fn resize(&mut self, width: f64, height: f64, dpr: f64) {
        self.width = width;
        self.height = height;
        self.dpr = dpr;
        self.ops.borrow_mut().push(RecordedOp::Resize {
            w: width,
            h: height,
            dpr,
        });
    }

    fn context_ready(&self) -> bool {
        self.ready
    }

    fn save(&mut self) {
        self.ops.borrow_mut().push(RecordedOp::Save);
    }

    fn restore(&mut self) {
        self.ops.borrow_mut().push(RecordedOp::Restore);
    }

    fn clip_rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        self.ops.borrow_mut().push(RecordedOp::ClipRect { x, y, w, h });
    }

    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: &str) {
        self.ops.borrow_mut().push(RecordedOp::FillRect {
            x,
            y,
            w,
            h,
            color: color.to_string(),
        });
    }

    fn clear_rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        self.ops.borrow_mut().push(RecordedOp::ClearRect { x, y, w, h });
    }

    fn stroke_segments(
        &mut self,
        segments: &[(f64, f64, f64, f64)],
        color: &str,
        line_width: f64,
        dash: &[f64],
        cap: LineCap,
    ) {
        self.ops.borrow_mut().push(RecordedOp::StrokeSegments {
            segments: segments.to_vec(),
            color: color.to_string(),
            line_width,
            dash: dash.to_vec(),
            cap,
        });
    }

    fn fill_text(&mut self, text: &str, x: f64, y: f64, style: &TextDrawStyle) {
        self.ops.borrow_mut().push(RecordedOp::FillText {
            text: text.to_string(),
            x,
            y,
            color: style.color.clone(),
        });
    }

    fn fill_triangle(&mut self, points: [(f64, f64); 3], color: &str) {
        self.ops.borrow_mut().push(RecordedOp::FillTriangle {
            points,
            color: color.to_string(),
        });
    }

    fn draw_bitmap(&mut self, bitmap: &dyn Bitmap, dx: f64, dy: f64, dw: f64, dh: f64) {
        self.ops.borrow_mut().push(RecordedOp::DrawBitmap {
            src_w: bitmap.width(),
            src_h: bitmap.height(),
            dx,
            dy,
            dw,
            dh,
        });
    }

    fn draw_surface(
        &mut self,
        _src: &dyn Surface,
        sx: f64,
        sy: f64,
        sw: f64,
        sh: f64,
        dx: f64,
        dy: f64,
        dw: f64,
        dh: f64,
    ) {
        self.ops.borrow_mut().push(RecordedOp::DrawSurface {
            sx,
            sy,
            sw,
            sh,
            dx,
            dy,
            dw,
            dh,
        });
    }

    fn draw_pattern(
        &mut self,
        _tile: &dyn Surface,
        x: f64,
        y: f64,
        w: f64,
        h: f64,
        origin_x: f64,
        origin_y: f64,
    ) {
        self.ops.borrow_mut().push(RecordedOp::DrawPattern {
            x,
            y,
            w,
            h,
            origin_x,
            origin_y,
        });
    }

    fn rotate_about(&mut self, cx: f64, cy: f64, angle_rad: f64) {
        self.ops
            .borrow_mut()
            .push(RecordedOp::RotateAbout { cx, cy, angle_rad });
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Factory producing recording surfaces (scratch buffers, pattern tiles).
#[derive(Debug, Default)]
pub struct RecordingFactory;

impl SurfaceFactory for RecordingFactory {
    fn create_surface(
        &self,
        width: f64,
        height: f64,
        dpr: f64,
    ) -> Result<Box<dyn Surface>, SurfaceError> {
        if !dpr.is_finite() || dpr <= 0.0 {
            return Err(SurfaceError::InvalidDpr { dpr });
        }
        Ok(Box::new(RecordingSurface::new(width, height, dpr)))
    }
}
