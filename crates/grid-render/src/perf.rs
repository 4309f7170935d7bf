//! Per-frame paint statistics.
//!
//! Lightweight counters accumulated during a frame and exposed as a
//! copyable snapshot. Collection defaults on in debug builds and is
//! controllable at runtime; disabled stats keep their last values.

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DirtyRectCounts {
    pub background: usize,
    pub content: usize,
    pub selection: usize,
}

impl DirtyRectCounts {
    pub fn total(&self) -> usize {
        self.background + self.selection + self.content
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GridPerfSnapshot {
    pub frames: u64,
    pub last_frame_ms: f64,
    pub cells_painted: u64,
    pub cell_fetches: u64,
    pub dirty_rects: DirtyRectCounts,
    pub blit_used: bool,
}

#[derive(Debug, Default)]
pub struct GridPerfStats {
    enabled: bool,
    frames: u64,
    last_frame_ms: f64,
    cells_painted: u64,
    cell_fetches: u64,
    dirty_rects: DirtyRectCounts,
    blit_used: bool,
}

impl GridPerfStats {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            ..Self::default()
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Reset the per-frame figures at the top of a frame.
    pub fn begin_frame(&mut self) {
        if !self.enabled {
            return;
        }
        self.cells_painted = 0;
        self.cell_fetches = 0;
        self.dirty_rects = DirtyRectCounts::default();
        self.blit_used = false;
    }

    pub fn end_frame(&mut self, frame_ms: f64) {
        if !self.enabled {
            return;
        }
        self.frames += 1;
        self.last_frame_ms = frame_ms;
    }

    pub fn add_cells_painted(&mut self, n: u64) {
        if self.enabled {
            self.cells_painted += n;
        }
    }

    pub fn add_cell_fetch(&mut self) {
        if self.enabled {
            self.cell_fetches += 1;
        }
    }

    pub fn record_dirty(&mut self, counts: DirtyRectCounts) {
        if self.enabled {
            self.dirty_rects = counts;
        }
    }

    pub fn record_blit(&mut self, used: bool) {
        if self.enabled {
            self.blit_used = used;
        }
    }

    pub fn snapshot(&self) -> GridPerfSnapshot {
        GridPerfSnapshot {
            frames: self.frames,
            last_frame_ms: self.last_frame_ms,
            cells_painted: self.cells_painted,
            cell_fetches: self.cell_fetches,
            dirty_rects: self.dirty_rects,
            blit_used: self.blit_used,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_stats_stay_frozen() {
        let mut s = GridPerfStats::new(false);
        s.begin_frame();
        s.add_cells_painted(10);
        s.end_frame(5.0);
        let snap = s.snapshot();
        assert_eq!(snap.frames, 0);
        assert_eq!(snap.cells_painted, 0);
    }

    #[test]
    fn frame_cycle_accumulates() {
        let mut s = GridPerfStats::new(true);
        s.begin_frame();
        s.add_cells_painted(40);
        s.add_cell_fetch();
        s.record_blit(true);
        s.record_dirty(DirtyRectCounts {
            background: 2,
            content: 2,
            selection: 1,
        });
        s.end_frame(3.5);
        let snap = s.snapshot();
        assert_eq!(snap.frames, 1);
        assert_eq!(snap.cells_painted, 40);
        assert_eq!(snap.cell_fetches, 1);
        assert_eq!(snap.dirty_rects.total(), 5);
        assert!(snap.blit_used);
        // Next frame resets the per-frame figures.
        s.begin_frame();
        assert_eq!(s.snapshot().cells_painted, 0);
        assert_eq!(s.snapshot().frames, 1);
    }
}
