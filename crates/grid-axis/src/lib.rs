//! Axis sizing and viewport virtualization.
//!
//! Two [`VariableSizeAxis`] instances (rows, columns) hold sparse size
//! overrides over a default size with O(log k) prefix-sum lookups, where k is
//! the override count — never the axis length, which may be in the billions.
//! [`VirtualScrollManager`] owns both axes plus scroll/freeze state and
//! derives an immutable [`ViewportState`] snapshot on demand.

pub mod axis;
pub mod scroll;
pub mod viewport;

pub use axis::{AxisError, VariableSizeAxis, SIZE_EPSILON};
pub use scroll::{MaxScroll, VirtualScrollManager};
pub use viewport::{IndexRange, ViewportState};
