//! Raster surface and runtime capabilities.
//!
//! The renderer paints through the [`Surface`] trait — a thin 2D command
//! layer over whatever raster target the host provides. Ambient runtime
//! facilities (monotonic time, frame ticks, offscreen surface creation) are
//! injected as capability traits so headless tests control every one of
//! them.

pub mod caps;
pub mod recording;
pub mod surface;

pub use caps::{Clock, FrameScheduler, ManualClock, ManualScheduler, SystemClock};
pub use recording::{OpLog, RecordedOp, RecordingFactory, RecordingSurface};
pub use surface::{
    setup_backing_store, Bitmap, LineCap, Surface, SurfaceError, SurfaceFactory, TextDrawStyle,
};
