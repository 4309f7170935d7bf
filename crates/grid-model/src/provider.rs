//! The cell provider seam.
//!
//! The renderer holds a shared handle to a `CellProvider` and never mutates
//! cell data. Invalidation flows back through a subscription: the provider
//! calls the registered listener synchronously between frames, the listener
//! enqueues the update, and the renderer drains the queue at the top of the
//! next frame. The subscription id is a weak-style token — the renderer's
//! only obligation is to release it on teardown.

use crate::cell::Cell;
use crate::range::CellRange;
use std::rc::Rc;

/// Update pushed by the provider to subscribed renderers.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderUpdate {
    /// Everything changed; the whole viewport repaints and merged-range
    /// snapshots are discarded.
    InvalidateAll,
    /// A bounded range changed.
    Invalidate(CellRange),
}

/// Opaque subscription token handed back by [`CellProvider::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Listener registered with a provider. Single-threaded: providers call it
/// inline, never from another thread.
pub type ProviderListener = Rc<dyn Fn(ProviderUpdate)>;

/// Source of cell data and merge geometry.
///
/// Only `get_cell` is required. `merged_ranges_in` returning `Some` enables
/// the bulk fast path for range expansion; `merged_range_at` enables the
/// perimeter probe. A provider with neither simply has no merges.
pub trait CellProvider {
    fn get_cell(&self, row: u32, col: u32) -> Option<Cell>;

    /// Hint that the renderer is about to fetch the given range.
    fn prefetch(&self, _range: &CellRange) {}

    /// Register for invalidation updates. Providers without change tracking
    /// return `None`.
    fn subscribe(&self, _listener: ProviderListener) -> Option<SubscriptionId> {
        None
    }

    fn unsubscribe(&self, _id: SubscriptionId) {}

    /// True when [`CellProvider::merged_range_at`] answers real queries.
    /// Range expansion fails open when neither probe nor bulk lookup exists,
    /// and `None` from a probe cannot distinguish "no merge" from "no
    /// support" on its own.
    fn supports_merge_probe(&self) -> bool {
        false
    }

    /// The merged range covering `(row, col)`, if any.
    fn merged_range_at(&self, _row: u32, _col: u32) -> Option<CellRange> {
        None
    }

    /// All merged ranges intersecting `range`. `None` means "not supported",
    /// which is distinct from "no merges".
    fn merged_ranges_in(&self, _range: &CellRange) -> Option<Vec<CellRange>> {
        None
    }
}
