//! Viewport-bounded merged-cell index.
//!
//! Built once per frame from the merges intersecting the indexed rows.
//! Per-row span lists exist only for rows inside the indexed row set;
//! queries for any other row answer "no merge". That bound is a correctness
//! requirement, not an optimization: the renderer indexes the visible rows
//! (plus one row above the main pane for boundary edges) and nothing else,
//! so `indexed_row_count` stays proportional to the viewport even when a
//! single merge spans a million rows.

use ahash::AHashMap;
use grid_model::{CellCoord, CellRange};

#[derive(Debug, Default)]
pub struct MergedCellIndex {
    ranges: Vec<CellRange>,
    /// Row → indices into `ranges` for merges covering that row, sorted by
    /// start column. Only indexed rows have entries (possibly empty).
    rows: AHashMap<u32, Vec<u32>>,
    /// Sorted, coalesced half-open row ranges that were indexed.
    indexed_rows: Vec<(u32, u32)>,
}

impl MergedCellIndex {
    /// Build from merge ranges and the row subset to index.
    ///
    /// * Ranges covering fewer than two cells are dropped.
    /// * `indexed_row_ranges = None` indexes every row of every range.
    /// * `indexed_row_ranges = Some(&[])` indexes nothing.
    pub fn build(ranges: &[CellRange], indexed_row_ranges: Option<&[(u32, u32)]>) -> Self {
        let ranges: Vec<CellRange> = ranges
            .iter()
            .filter(|r| r.cell_count() >= 2)
            .copied()
            .collect();

        let indexed_rows = match indexed_row_ranges {
            Some(rs) => coalesce_row_ranges(rs),
            None => {
                let all: Vec<(u32, u32)> = ranges.iter().map(|r| (r.start_row, r.end_row)).collect();
                coalesce_row_ranges(&all)
            }
        };

        let mut rows: AHashMap<u32, Vec<u32>> = AHashMap::new();
        for &(start, end) in &indexed_rows {
            for row in start..end {
                rows.entry(row).or_default();
            }
        }
        for (i, range) in ranges.iter().enumerate() {
            for &(start, end) in &indexed_rows {
                let lo = range.start_row.max(start);
                let hi = range.end_row.min(end);
                for row in lo..hi.max(lo) {
                    rows.entry(row).or_default().push(i as u32);
                }
            }
        }
        for spans in rows.values_mut() {
            spans.sort_by_key(|&i| ranges[i as usize].start_col);
        }

        Self {
            ranges,
            rows,
            indexed_rows,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// All normalized merge ranges in the snapshot.
    pub fn ranges(&self) -> &[CellRange] {
        &self.ranges
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Number of rows with materialized span lists.
    pub fn indexed_row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_row_indexed(&self, row: u32) -> bool {
        self.rows.contains_key(&row)
    }

    /// The merge covering `(row, col)`, or `None` — including for any row
    /// outside the indexed subset.
    pub fn range_at(&self, row: u32, col: u32) -> Option<CellRange> {
        let spans = self.rows.get(&row)?;
        for &i in spans {
            let r = &self.ranges[i as usize];
            if r.start_col > col {
                break;
            }
            if r.contains(row, col) {
                return Some(*r);
            }
        }
        None
    }

    /// Anchor of the covering merge, or the cell itself.
    pub fn resolve_cell(&self, row: u32, col: u32) -> CellCoord {
        match self.range_at(row, col) {
            Some(r) => r.anchor(),
            None => CellCoord::new(row, col),
        }
    }

    /// True when `(row, col)` is the top-left member of a merge.
    pub fn is_anchor(&self, row: u32, col: u32) -> bool {
        matches!(self.range_at(row, col), Some(r) if r.start_row == row && r.start_col == col)
    }

    /// Non-anchor members of a merge are skipped by the painter.
    pub fn should_skip_cell(&self, row: u32, col: u32) -> bool {
        matches!(self.range_at(row, col), Some(r) if r.start_row != row || r.start_col != col)
    }

    /// True when the edge between `(row, col)` and `(row, col + 1)` lies
    /// strictly inside a merge (no gridline there).
    pub fn is_interior_vertical_gridline(&self, row: u32, col: u32) -> bool {
        matches!(self.range_at(row, col), Some(r) if r.contains(row, col + 1))
    }

    /// True when the edge between `(row, col)` and `(row + 1, col)` lies
    /// strictly inside a merge.
    pub fn is_interior_horizontal_gridline(&self, row: u32, col: u32) -> bool {
        matches!(self.range_at(row, col), Some(r) if r.contains(row + 1, col))
    }
}

/// Sort and merge overlapping or adjacent half-open row ranges.
fn coalesce_row_ranges(ranges: &[(u32, u32)]) -> Vec<(u32, u32)> {
    let mut rs: Vec<(u32, u32)> = ranges.iter().filter(|&&(s, e)| s < e).copied().collect();
    rs.sort_unstable();
    let mut out: Vec<(u32, u32)> = Vec::with_capacity(rs.len());
    for (s, e) in rs {
        match out.last_mut() {
            Some(last) if s <= last.1 => last.1 = last.1.max(e),
            _ => out.push((s, e)),
        }
    }
    out
}
