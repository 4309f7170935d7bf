//! Property-based tests for axis prefix-sum invariants.

use grid_axis::VariableSizeAxis;
use proptest::prelude::*;

proptest! {
    // position_of is strictly monotonic and its steps equal get_size.
    #[test]
    fn positions_monotonic_and_step_equals_size(
        default in 1.0f64..100.0,
        overrides in proptest::collection::vec((0u32..500, 1.0f64..200.0), 0..40),
        probe in 0u32..499,
    ) {
        let mut axis = VariableSizeAxis::new(default, 500).unwrap();
        axis.set_overrides(overrides).unwrap();
        let p0 = axis.position_of(probe);
        let p1 = axis.position_of(probe + 1);
        prop_assert!(p1 > p0);
        prop_assert!((p1 - p0 - axis.get_size(probe)).abs() < 1e-9);
        prop_assert_eq!(axis.position_of(0), 0.0);
    }

    // index_at(position_of(i)) == i for every in-range index.
    #[test]
    fn index_at_inverts_position_of(
        overrides in proptest::collection::vec((0u32..300, 1.0f64..64.0), 0..30),
        i in 0u32..299,
    ) {
        let mut axis = VariableSizeAxis::new(17.0, 300).unwrap();
        axis.set_overrides(overrides).unwrap();
        prop_assert_eq!(axis.index_at(axis.position_of(i), 0, 299), i);
    }

    // visible_range covers exactly the indices whose spans intersect the probe window.
    #[test]
    fn visible_range_covers_window(
        overrides in proptest::collection::vec((0u32..200, 1.0f64..50.0), 0..20),
        pos in 0.0f64..2000.0,
        len in 1.0f64..500.0,
    ) {
        let mut axis = VariableSizeAxis::new(11.0, 200).unwrap();
        axis.set_overrides(overrides).unwrap();
        let (start, end) = axis.visible_range(pos, len, 0, 200);
        prop_assert!(start <= end);
        if start < end {
            // The start index begins at or before pos (or is the clamp floor).
            prop_assert!(axis.position_of(start) <= pos || start == 0);
            // Every included index starts strictly before the window end.
            prop_assert!(axis.position_of(end - 1) < pos + len);
            // The next index (if any) starts at or beyond the window end,
            // modulo the boundary epsilon.
            if end < 200 {
                prop_assert!(axis.position_of(end) >= pos + len - 1e-5);
            }
        }
    }
}
