//! Range expansion across merged cells.
//!
//! A drag selection or invalidation rect must grow until no merge straddles
//! its boundary. The cost contract is O(perimeter + intersecting merges):
//! the probe walks only the four edges of the candidate range and jumps the
//! scan cursor past any merge it lands in, so a merge a thousand cells tall
//! costs one probe, not a thousand.

use grid_model::{CellProvider, CellRange};

/// Fixpoint bound. Expansion converges long before this in practice; the cap
/// guards against a provider reporting inconsistent merge geometry.
pub const MAX_EXPAND_ITERATIONS: usize = 100;

/// Expand `range` until every intersecting merge is fully contained.
///
/// Prefers the provider's bulk lookup when present; otherwise runs a
/// perimeter probe with skip. Providers with no merge information at all
/// fail open: the range comes back unchanged.
pub fn expand_range_to_merged_cells(range: CellRange, provider: &dyn CellProvider) -> CellRange {
    if provider.merged_ranges_in(&range).is_some() {
        expand_bulk(range, provider)
    } else if provider.supports_merge_probe() {
        expand_perimeter(range, provider)
    } else {
        range
    }
}

fn expand_bulk(mut cur: CellRange, provider: &dyn CellProvider) -> CellRange {
    for _ in 0..MAX_EXPAND_ITERATIONS {
        let Some(merges) = provider.merged_ranges_in(&cur) else {
            return cur;
        };
        let mut next = cur;
        for m in &merges {
            if m.intersects(&next) {
                next = next.union(m);
            }
        }
        if next == cur {
            return cur;
        }
        cur = next;
    }
    cur
}

fn expand_perimeter(mut cur: CellRange, provider: &dyn CellProvider) -> CellRange {
    for _ in 0..MAX_EXPAND_ITERATIONS {
        let mut next = cur;

        // Top and bottom edges: walk columns, skipping past merge widths.
        for row in [cur.start_row, cur.end_row - 1] {
            let mut col = cur.start_col;
            while col < cur.end_col {
                match provider.merged_range_at(row, col) {
                    Some(m) => {
                        next = next.union(&m);
                        col = m.end_col.max(col + 1);
                    }
                    None => col += 1,
                }
            }
        }

        // Left and right edges: walk rows, skipping past merge heights.
        for col in [cur.start_col, cur.end_col - 1] {
            let mut row = cur.start_row;
            while row < cur.end_row {
                match provider.merged_range_at(row, col) {
                    Some(m) => {
                        next = next.union(&m);
                        row = m.end_row.max(row + 1);
                    }
                    None => row += 1,
                }
            }
        }

        if next == cur {
            return cur;
        }
        cur = next;
    }
    cur
}

#[cfg(test)]
mod tests {
    use super::*;
    use grid_model::Cell;
    use std::cell::Cell as StdCell;

    /// Provider exposing a fixed merge list, either via probe or bulk.
    struct MergeProvider {
        merges: Vec<CellRange>,
        bulk: bool,
        probes: StdCell<usize>,
    }

    impl MergeProvider {
        fn probe(merges: Vec<CellRange>) -> Self {
            Self {
                merges,
                bulk: false,
                probes: StdCell::new(0),
            }
        }

        fn bulk(merges: Vec<CellRange>) -> Self {
            Self {
                merges,
                bulk: true,
                probes: StdCell::new(0),
            }
        }
    }

    impl CellProvider for MergeProvider {
        fn get_cell(&self, _row: u32, _col: u32) -> Option<Cell> {
            None
        }

        fn supports_merge_probe(&self) -> bool {
            !self.bulk
        }

        fn merged_range_at(&self, row: u32, col: u32) -> Option<CellRange> {
            self.probes.set(self.probes.get() + 1);
            self.merges.iter().find(|m| m.contains(row, col)).copied()
        }

        fn merged_ranges_in(&self, range: &CellRange) -> Option<Vec<CellRange>> {
            if !self.bulk {
                return None;
            }
            Some(
                self.merges
                    .iter()
                    .filter(|m| m.intersects(range))
                    .copied()
                    .collect(),
            )
        }
    }

    fn merge(sr: u32, er: u32, sc: u32, ec: u32) -> CellRange {
        CellRange::normalized(sr, er, sc, ec).unwrap()
    }

    #[test]
    fn no_merge_provider_fails_open() {
        struct Bare;
        impl CellProvider for Bare {
            fn get_cell(&self, _row: u32, _col: u32) -> Option<Cell> {
                None
            }
        }
        let r = merge(0, 5, 0, 5);
        assert_eq!(expand_range_to_merged_cells(r, &Bare), r);
    }

    #[test]
    fn expands_to_cover_straddling_merge() {
        for provider in [
            MergeProvider::probe(vec![merge(3, 10, 4, 6)]),
            MergeProvider::bulk(vec![merge(3, 10, 4, 6)]),
        ] {
            let got = expand_range_to_merged_cells(merge(0, 5, 0, 5), &provider);
            assert_eq!(got, merge(0, 10, 0, 6));
        }
    }

    #[test]
    fn chained_merges_reach_fixpoint() {
        // First merge pulls the range right, second pulls it down.
        let merges = vec![merge(0, 2, 4, 8), merge(1, 9, 7, 9)];
        let got = expand_range_to_merged_cells(merge(0, 2, 0, 5), &MergeProvider::probe(merges));
        assert_eq!(got, merge(0, 9, 0, 9));
    }

    #[test]
    fn contained_merge_changes_nothing() {
        let provider = MergeProvider::probe(vec![merge(1, 3, 1, 3)]);
        let r = merge(0, 5, 0, 5);
        assert_eq!(expand_range_to_merged_cells(r, &provider), r);
    }

    #[test]
    fn perimeter_probe_cost_is_not_area() {
        // 100×100 candidate over a tall merge on the left edge: the probe
        // count must track the perimeter (~400 per iteration), never the
        // 10_000-cell area, and the skip collapses the merge's edge rows to
        // a single probe.
        let tall = merge(0, 100, 0, 2);
        let provider = MergeProvider::probe(vec![tall]);
        let got = expand_range_to_merged_cells(merge(0, 100, 0, 100), &provider);
        assert_eq!(got, merge(0, 100, 0, 100));
        assert!(
            provider.probes.get() < 1_000,
            "probes: {}",
            provider.probes.get()
        );
    }
}
