//! Variable-size axis with sparse overrides.
//!
//! Storage is a vec of `(index, size)` pairs sorted by index plus a parallel
//! cumulative-delta array (`size - default` prefix sums). That is the sparse
//! equivalent of a Fenwick tree over default-plus-delta: `position_of` and
//! `index_at` are O(log k) in the override count, and single mutations
//! rebuild only the delta prefix (O(k)), which bulk callers avoid entirely
//! via [`VariableSizeAxis::set_overrides`].
//!
//! Invariants:
//! * `position_of(0) == 0`; `position_of(i + 1) == position_of(i) + get_size(i)`.
//! * Every stored size is finite and strictly positive, so positions are
//!   strictly monotonic.
//! * Sizes within [`SIZE_EPSILON`] of the default are never stored — snapshots
//!   of the override set stay minimal.

use thiserror::Error;

/// Overrides this close to the default size are dropped.
pub const SIZE_EPSILON: f64 = 1e-6;

#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum AxisError {
    #[error("invalid axis size {size}: sizes must be finite and positive")]
    InvalidSize { size: f64 },
    #[error("axis index {index} out of range (count {count})")]
    IndexOutOfRange { index: u32, count: u32 },
}

#[derive(Debug, Clone)]
pub struct VariableSizeAxis {
    default_size: f64,
    count: u32,
    /// Sorted by index, deduped.
    overrides: Vec<(u32, f64)>,
    /// `cum_delta[i]` = Σ (size − default) over `overrides[..=i]`.
    cum_delta: Vec<f64>,
}

fn check_size(size: f64) -> Result<(), AxisError> {
    if !size.is_finite() || size <= 0.0 {
        return Err(AxisError::InvalidSize { size });
    }
    Ok(())
}

impl VariableSizeAxis {
    pub fn new(default_size: f64, count: u32) -> Result<Self, AxisError> {
        check_size(default_size)?;
        Ok(Self {
            default_size,
            count,
            overrides: Vec::new(),
            cum_delta: Vec::new(),
        })
    }

    pub fn default_size(&self) -> f64 {
        self.default_size
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn override_count(&self) -> usize {
        self.overrides.len()
    }

    /// Current override set, sorted by index.
    pub fn overrides(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.overrides.iter().copied()
    }

    /// Size of index `i`: the override when present, else the default.
    pub fn get_size(&self, i: u32) -> f64 {
        match self.overrides.binary_search_by_key(&i, |&(idx, _)| idx) {
            Ok(pos) => self.overrides[pos].1,
            Err(_) => self.default_size,
        }
    }

    /// Sum of sizes of `[0, i)`.
    pub fn position_of(&self, i: u32) -> f64 {
        let base = i as f64 * self.default_size;
        // Delta contribution of overrides strictly below `i`.
        let below = self
            .overrides
            .partition_point(|&(idx, _)| idx < i);
        if below == 0 {
            base
        } else {
            base + self.cum_delta[below - 1]
        }
    }

    pub fn total_size(&self) -> f64 {
        self.position_of(self.count)
    }

    /// Greatest `i ∈ [min, max_inclusive]` with `position_of(i) ≤ pos`.
    /// Positions are strictly monotonic, so plain binary search applies.
    /// For `pos` left of `position_of(min)` this returns `min`.
    pub fn index_at(&self, pos: f64, min: u32, max_inclusive: u32) -> u32 {
        if min >= max_inclusive || pos <= self.position_of(min) {
            return min.min(max_inclusive);
        }
        let (mut lo, mut hi) = (min, max_inclusive);
        while lo < hi {
            // Bias high so the loop converges on the greatest qualifying index.
            let mid = lo + (hi - lo).div_ceil(2);
            if self.position_of(mid) <= pos {
                lo = mid;
            } else {
                hi = mid - 1;
            }
        }
        lo
    }

    /// Half-open index range covering the pixel span `[pos, pos + length)`,
    /// clamped to `[min, max_exclusive)`. An index whose cell starts exactly
    /// at `pos + length` is excluded.
    pub fn visible_range(&self, pos: f64, length: f64, min: u32, max_exclusive: u32) -> (u32, u32) {
        if min >= max_exclusive || length <= 0.0 {
            let s = min.min(max_exclusive);
            return (s, s);
        }
        let max_inclusive = max_exclusive - 1;
        let start = self.index_at(pos, min, max_inclusive);
        let last = self.index_at(pos + length - SIZE_EPSILON, start, max_inclusive);
        (start, (last + 1).min(max_exclusive))
    }

    /// Replace the whole override set in one pass. Near-default sizes are
    /// dropped; duplicate indices keep the last entry; indices at or beyond
    /// `count` are rejected.
    pub fn set_overrides(
        &mut self,
        entries: impl IntoIterator<Item = (u32, f64)>,
    ) -> Result<(), AxisError> {
        let mut next: Vec<(u32, f64)> = Vec::new();
        for (index, size) in entries {
            check_size(size)?;
            if index >= self.count {
                return Err(AxisError::IndexOutOfRange {
                    index,
                    count: self.count,
                });
            }
            if (size - self.default_size).abs() <= SIZE_EPSILON {
                continue;
            }
            next.push((index, size));
        }
        next.sort_by_key(|&(idx, _)| idx);
        // Last write wins on duplicate indices.
        next.reverse();
        next.dedup_by_key(|&mut (idx, _)| idx);
        next.reverse();
        self.overrides = next;
        self.rebuild_cum();
        Ok(())
    }

    /// Set a single index's size. Near-default sizes clear the override.
    pub fn set_size(&mut self, index: u32, size: f64) -> Result<(), AxisError> {
        check_size(size)?;
        if index >= self.count {
            return Err(AxisError::IndexOutOfRange {
                index,
                count: self.count,
            });
        }
        if (size - self.default_size).abs() <= SIZE_EPSILON {
            self.delete_size(index);
            return Ok(());
        }
        match self.overrides.binary_search_by_key(&index, |&(idx, _)| idx) {
            Ok(pos) => self.overrides[pos].1 = size,
            Err(pos) => self.overrides.insert(pos, (index, size)),
        }
        self.rebuild_cum();
        Ok(())
    }

    /// Remove an override, restoring the default size.
    pub fn delete_size(&mut self, index: u32) {
        if let Ok(pos) = self.overrides.binary_search_by_key(&index, |&(idx, _)| idx) {
            self.overrides.remove(pos);
            self.rebuild_cum();
        }
    }

    fn rebuild_cum(&mut self) {
        self.cum_delta.clear();
        self.cum_delta.reserve(self.overrides.len());
        let mut acc = 0.0;
        for &(_, size) in &self.overrides {
            acc += size - self.default_size;
            self.cum_delta.push(acc);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis() -> VariableSizeAxis {
        VariableSizeAxis::new(10.0, 1_000).unwrap()
    }

    #[test]
    fn rejects_bad_sizes() {
        assert!(VariableSizeAxis::new(0.0, 5).is_err());
        assert!(VariableSizeAxis::new(f64::NAN, 5).is_err());
        let mut a = axis();
        assert_eq!(
            a.set_size(3, -1.0),
            Err(AxisError::InvalidSize { size: -1.0 })
        );
        assert_eq!(
            a.set_size(5_000, 20.0),
            Err(AxisError::IndexOutOfRange {
                index: 5_000,
                count: 1_000
            })
        );
    }

    #[test]
    fn position_prefix_sum_with_overrides() {
        let mut a = axis();
        a.set_size(2, 30.0).unwrap();
        a.set_size(5, 4.0).unwrap();
        assert_eq!(a.position_of(0), 0.0);
        assert_eq!(a.position_of(2), 20.0);
        assert_eq!(a.position_of(3), 50.0);
        assert_eq!(a.position_of(5), 70.0);
        assert_eq!(a.position_of(6), 74.0);
        assert_eq!(a.get_size(2), 30.0);
        assert_eq!(a.get_size(3), 10.0);
    }

    #[test]
    fn near_default_sizes_are_not_stored() {
        let mut a = axis();
        a.set_size(1, 10.0 + SIZE_EPSILON / 2.0).unwrap();
        assert_eq!(a.override_count(), 0);
        a.set_size(1, 12.0).unwrap();
        assert_eq!(a.override_count(), 1);
        a.set_size(1, 10.0).unwrap();
        assert_eq!(a.override_count(), 0);
    }

    #[test]
    fn index_at_boundaries() {
        let mut a = axis();
        a.set_size(1, 25.0).unwrap();
        // Row starts: 0, 10, 35, 45, ...
        assert_eq!(a.index_at(0.0, 0, 999), 0);
        assert_eq!(a.index_at(9.9, 0, 999), 0);
        assert_eq!(a.index_at(10.0, 0, 999), 1);
        assert_eq!(a.index_at(34.9, 0, 999), 1);
        assert_eq!(a.index_at(35.0, 0, 999), 2);
        // Clamped below: pos before position_of(min) returns min.
        assert_eq!(a.index_at(3.0, 4, 999), 4);
        // Clamped above.
        assert_eq!(a.index_at(1e12, 0, 999), 999);
    }

    #[test]
    fn visible_range_excludes_boundary_start() {
        let a = axis();
        // [0, 30) covers rows 0..3; row 3 starts exactly at 30 and is excluded.
        assert_eq!(a.visible_range(0.0, 30.0, 0, 1_000), (0, 3));
        assert_eq!(a.visible_range(5.0, 10.0, 0, 1_000), (0, 2));
        assert_eq!(a.visible_range(0.0, 0.0, 0, 1_000), (0, 0));
        assert_eq!(a.visible_range(50.0, 10.0, 0, 3), (2, 3));
    }

    #[test]
    fn bulk_set_overrides_replaces_and_drops_default() {
        let mut a = axis();
        a.set_size(9, 99.0).unwrap();
        a.set_overrides([(1, 20.0), (4, 10.0), (1, 30.0), (7, 5.0)])
            .unwrap();
        // (4, 10.0) equals the default and is dropped; (1, 30.0) wins the dup.
        assert_eq!(a.override_count(), 2);
        assert_eq!(a.get_size(1), 30.0);
        assert_eq!(a.get_size(4), 10.0);
        assert_eq!(a.get_size(7), 5.0);
        // The previous override at 9 was replaced away.
        assert_eq!(a.get_size(9), 10.0);
    }

    #[test]
    fn monotonic_over_sparse_huge_axis() {
        let mut a = VariableSizeAxis::new(24.0, u32::MAX).unwrap();
        a.set_size(1_000_000, 100.0).unwrap();
        let p1 = a.position_of(1_000_000);
        let p2 = a.position_of(1_000_001);
        assert_eq!(p2 - p1, 100.0);
        assert!(a.position_of(2_000_000) > p2);
    }
}
