//! The merged-index snapshot stays viewport-bounded regardless of merge
//! heights.

mod common;

use common::Harness;
use grid_model::{CellCoord, CellRange};

#[test]
fn million_row_merge_indexes_only_visible_rows() {
    // 840 px tall viewport → 40 visible rows of 21 px.
    let h = &mut Harness::new(500.0, 840.0);
    h.provider
        .add_merge(CellRange::normalized(0, 1_000_000, 0, 2).unwrap());
    h.renderer.render_immediately();

    assert!(
        h.renderer.merged_indexed_row_count() <= 41,
        "indexed rows: {}",
        h.renderer.merged_indexed_row_count()
    );

    // Queries inside the viewport resolve to the anchor.
    assert_eq!(
        h.renderer.pick_cell_at(50.0, 800.0),
        Some(CellCoord::new(0, 0))
    );
}

#[test]
fn bound_holds_after_scrolling_deep() {
    let h = &mut Harness::new(500.0, 840.0);
    h.provider
        .add_merge(CellRange::normalized(0, 1_000_000, 0, 2).unwrap());
    h.renderer.render_immediately();
    h.renderer.set_scroll(0.0, 500_000.0 * 21.0);
    h.renderer.render_immediately();

    assert!(h.renderer.merged_indexed_row_count() <= 42);
    // Deep inside the merge the anchor still resolves through the probe.
    assert_eq!(
        h.renderer.pick_cell_at(10.0, 400.0),
        Some(CellCoord::new(0, 0))
    );
}

#[test]
fn bulk_provider_reaches_same_bound() {
    let h = &mut Harness::new(500.0, 840.0);
    h.provider.bulk_merges.set(true);
    h.provider
        .add_merge(CellRange::normalized(0, 1_000_000, 0, 2).unwrap());
    h.renderer.render_immediately();
    assert!(h.renderer.merged_indexed_row_count() <= 41);
}
