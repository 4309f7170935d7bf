//! Merged-cell indexing and range expansion.
//!
//! The index is a read-only per-frame snapshot restricted to an explicitly
//! indexed set of rows, so a merge spanning a million rows costs O(visible
//! rows), not O(merge height). Range expansion grows a candidate range until
//! it fully contains every merge it touches, probing only the perimeter.

pub mod expand;
pub mod index;

pub use expand::{expand_range_to_merged_cells, MAX_EXPAND_ITERATIONS};
pub use index::MergedCellIndex;
