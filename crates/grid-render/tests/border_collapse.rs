//! Collapsed borders: one winner per edge, painted once.

mod common;

use common::{find_ops, Harness};
use grid_model::{BorderSpec, Cell, CellStyle};
use grid_surface::RecordedOp;

fn cell_with_borders(f: impl FnOnce(&mut CellStyle)) -> Cell {
    let mut style = CellStyle::default();
    f(&mut style);
    Cell {
        style: Some(style),
        ..Cell::default()
    }
}

#[test]
fn shared_edge_resolves_to_wider_spec() {
    let h = &mut Harness::new(800.0, 600.0);
    h.provider.set_cell(
        0,
        0,
        cell_with_borders(|s| s.borders.bottom = Some(BorderSpec::solid(2.0, "#000"))),
    );
    h.provider.set_cell(
        1,
        0,
        cell_with_borders(|s| s.borders.top = Some(BorderSpec::solid(1.0, "#f00"))),
    );
    h.clear_logs();
    h.renderer.render_immediately();

    // Row boundary sits at y = 21; the 2 px even width snaps to the whole
    // pixel. The winner strokes once, in black at 2 px.
    let black = find_ops(&h.bg_ops, |op| {
        matches!(op, RecordedOp::StrokeSegments { color, line_width, segments, .. }
            if color == "#000"
                && *line_width == 2.0
                && segments.iter().any(|s| s.1 == 21.0 && s.3 == 21.0 && s.0 == 0.0))
    });
    assert_eq!(black.len(), 1, "winning edge strokes exactly once");

    let red = find_ops(&h.bg_ops, |op| {
        matches!(op, RecordedOp::StrokeSegments { color, .. } if color == "#f00")
    });
    assert!(red.is_empty(), "losing spec must not paint");
}

#[test]
fn equal_specs_prefer_bottom_cell_color() {
    let h = &mut Harness::new(800.0, 600.0);
    h.provider.set_cell(
        0,
        0,
        cell_with_borders(|s| s.borders.bottom = Some(BorderSpec::solid(1.0, "#0a0"))),
    );
    h.provider.set_cell(
        1,
        0,
        cell_with_borders(|s| s.borders.top = Some(BorderSpec::solid(1.0, "#00b"))),
    );
    h.clear_logs();
    h.renderer.render_immediately();

    let winner = find_ops(&h.bg_ops, |op| {
        matches!(op, RecordedOp::StrokeSegments { color, .. } if color == "#00b")
    });
    assert!(!winner.is_empty(), "bottom cell wins full ties");
    let loser = find_ops(&h.bg_ops, |op| {
        matches!(op, RecordedOp::StrokeSegments { color, .. } if color == "#0a0")
    });
    assert!(loser.is_empty());
}

#[test]
fn double_border_strokes_two_parallel_lines() {
    let h = &mut Harness::new(800.0, 600.0);
    h.provider.set_cell(
        1,
        1,
        cell_with_borders(|s| {
            s.borders.top = Some(BorderSpec {
                style: grid_model::BorderLineStyle::Double,
                width: 1.0,
                color: "#333".into(),
            })
        }),
    );
    h.clear_logs();
    h.renderer.render_immediately();

    // Edge at y = 21: the double spec emits lines offset by ±width, both
    // snapped to half pixels (odd width).
    let groups = find_ops(&h.bg_ops, |op| {
        matches!(op, RecordedOp::StrokeSegments { color, .. } if color == "#333")
    });
    assert_eq!(groups.len(), 1, "both lines batch into one stroke group");
    let RecordedOp::StrokeSegments { segments, .. } = &groups[0] else {
        unreachable!()
    };
    assert_eq!(segments.len(), 2);
    let ys: Vec<f64> = segments.iter().map(|s| s.1).collect();
    assert!(ys.contains(&20.5) && ys.contains(&22.5), "ys: {ys:?}");
}

#[test]
fn merge_interior_edges_vanish() {
    let h = &mut Harness::new(800.0, 600.0);
    h.provider
        .add_merge(grid_model::CellRange::normalized(1, 3, 1, 3).unwrap());
    h.clear_logs();
    h.renderer.render_immediately();

    // The horizontal gridline at y = 42 must not span the merge interior
    // (x in 100..300): any gridline segment crossing it would be a defect.
    let offending = find_ops(&h.bg_ops, |op| {
        matches!(op, RecordedOp::StrokeSegments { segments, line_width, .. }
            if *line_width == 1.0 && segments.iter().any(|s| {
                s.1 == 42.5 && s.3 == 42.5 && s.0 < 250.0 && s.2 > 150.0
            }))
    });
    assert!(offending.is_empty(), "no gridline inside the merge");

    // The same line continues outside the merge.
    let outside = find_ops(&h.bg_ops, |op| {
        matches!(op, RecordedOp::StrokeSegments { segments, .. }
            if segments.iter().any(|s| s.1 == 42.5 && s.0 == 0.0 && s.2 == 100.0))
    });
    assert!(!outside.is_empty(), "gridline still present left of the merge");
}

#[test]
fn dashed_borders_carry_dash_pattern() {
    let h = &mut Harness::new(800.0, 600.0);
    h.provider.set_cell(
        0,
        0,
        cell_with_borders(|s| {
            s.borders.right = Some(BorderSpec {
                style: grid_model::BorderLineStyle::Dashed,
                width: 1.0,
                color: "#777".into(),
            })
        }),
    );
    h.clear_logs();
    h.renderer.render_immediately();

    let dashed = find_ops(&h.bg_ops, |op| {
        matches!(op, RecordedOp::StrokeSegments { color, dash, .. }
            if color == "#777" && dash == &vec![4.0, 2.0])
    });
    assert!(!dashed.is_empty());
}
