//! Dirty region tracking.
//!
//! Minimal structure recording viewport rects that must repaint next frame.
//! `mark` unions any overlapping existing rect into the candidate before
//! pushing, so the stored list never contains two overlapping rects; the
//! union operation is commutative, which keeps the drained set independent
//! of mark order. The list is not kept sorted.
//!
//! Invariants:
//! * No two stored rects overlap.
//! * Degenerate marks (non-finite or non-positive extents) are ignored.
//! * After `drain`/`drain_into`, the tracker is empty (one-shot consumption).

use grid_model::PxRect;

#[derive(Debug, Default)]
pub struct DirtyRegionTracker {
    rects: Vec<PxRect>,
}

impl DirtyRegionTracker {
    pub fn new() -> Self {
        Self { rects: Vec::new() }
    }

    /// Record a rect, merging transitively with every overlapping rect.
    pub fn mark(&mut self, rect: PxRect) {
        if !rect.is_valid() {
            return;
        }
        let mut candidate = rect;
        // A grown union can overlap rects already passed over, so rescan
        // until no overlap remains.
        loop {
            let mut merged_any = false;
            let mut i = 0;
            while i < self.rects.len() {
                if self.rects[i].intersects(&candidate) {
                    let existing = self.rects.swap_remove(i);
                    candidate = candidate.union(&existing);
                    merged_any = true;
                } else {
                    i += 1;
                }
            }
            if !merged_any {
                break;
            }
        }
        self.rects.push(candidate);
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rects.len()
    }

    /// Consume the current list.
    pub fn drain(&mut self) -> Vec<PxRect> {
        std::mem::take(&mut self.rects)
    }

    /// Consume into a reused scratch buffer; the hot render loop calls this
    /// to avoid a per-frame allocation.
    pub fn drain_into(&mut self, out: &mut Vec<PxRect>) {
        out.clear();
        out.append(&mut self.rects);
    }

    pub fn clear(&mut self) {
        self.rects.clear();
    }
}
