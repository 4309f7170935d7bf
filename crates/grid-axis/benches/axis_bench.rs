use criterion::{criterion_group, criterion_main, Criterion};
use grid_axis::VariableSizeAxis;
use std::hint::black_box;

fn bench_position_lookup(c: &mut Criterion) {
    let mut axis = VariableSizeAxis::new(24.0, 10_000_000).unwrap();
    axis.set_overrides((0..5_000u32).map(|i| (i * 1_999, 40.0 + (i % 7) as f64)))
        .unwrap();

    c.bench_function("position_of sparse 5k overrides", |b| {
        b.iter(|| {
            let mut acc = 0.0;
            for i in (0..10_000_000u32).step_by(997_001) {
                acc += axis.position_of(black_box(i));
            }
            acc
        })
    });

    c.bench_function("index_at sparse 5k overrides", |b| {
        b.iter(|| {
            let mut acc = 0u32;
            for pos in (0..240_000_000u64).step_by(23_900_101) {
                acc = acc.wrapping_add(axis.index_at(black_box(pos as f64), 0, 9_999_999));
            }
            acc
        })
    });
}

criterion_group!(benches, bench_position_lookup);
criterion_main!(benches);
