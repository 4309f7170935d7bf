//! Selection and presence state.
//!
//! A selection is an ordered list of normalized ranges, an index naming the
//! active range, and an active cell clamped into that range. Snapping the
//! active cell to a merged anchor happens in the renderer, which is the only
//! component that can see the merge index.

use crate::range::{CellCoord, CellRange};

#[derive(Debug, Clone, PartialEq)]
pub struct SelectionState {
    ranges: Vec<CellRange>,
    active_index: usize,
    active: CellCoord,
}

impl SelectionState {
    /// Single-cell selection.
    pub fn cell(row: u32, col: u32) -> Self {
        Self {
            ranges: vec![CellRange::single(row, col)],
            active_index: 0,
            active: CellCoord::new(row, col),
        }
    }

    /// Build from ranges; empty input collapses to a selection of `A1`.
    /// The active cell is clamped into the active range.
    pub fn from_ranges(ranges: Vec<CellRange>, active_index: usize, active: CellCoord) -> Self {
        if ranges.is_empty() {
            return Self::cell(active.row, active.col);
        }
        let active_index = active_index.min(ranges.len() - 1);
        let active = ranges[active_index].clamp_cell(active);
        Self {
            ranges,
            active_index,
            active,
        }
    }

    pub fn ranges(&self) -> &[CellRange] {
        &self.ranges
    }

    pub fn active_index(&self) -> usize {
        self.active_index
    }

    pub fn active_range(&self) -> &CellRange {
        &self.ranges[self.active_index]
    }

    pub fn active_cell(&self) -> CellCoord {
        self.active
    }

    /// Replace the active range in place. Returns `false` when the stored
    /// range already equals `range` (hot-path no-op detection).
    pub fn set_active_range(&mut self, range: CellRange) -> bool {
        if self.ranges[self.active_index] == range {
            return false;
        }
        self.ranges[self.active_index] = range;
        self.active = range.clamp_cell(self.active);
        true
    }

    /// Append a range and make it active.
    pub fn push_range(&mut self, range: CellRange) {
        self.ranges.push(range);
        self.active_index = self.ranges.len() - 1;
        self.active = range.clamp_cell(self.active);
    }

    /// Move the active cell, keeping it inside the active range.
    pub fn set_active_cell(&mut self, cell: CellCoord) {
        self.active = self.active_range().clamp_cell(cell);
    }
}

impl Default for SelectionState {
    fn default() -> Self {
        Self::cell(0, 0)
    }
}

/// A formula-reference highlight shown while editing.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceHighlight {
    pub range: CellRange,
    pub color: String,
    pub active: bool,
}

/// A collaborator's cursor and selections.
#[derive(Debug, Clone, PartialEq)]
pub struct RemotePresence {
    pub id: String,
    pub name: String,
    pub color: Option<String>,
    pub cursor: Option<CellCoord>,
    pub selections: Vec<CellRange>,
}
