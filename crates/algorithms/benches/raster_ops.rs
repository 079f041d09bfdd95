//! Benchmarks for crop and aggregate

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use geodeck_algorithms::raster::{aggregate, crop, AggregateParams, Reducer};
use geodeck_core::{Extent, GeoTransform, Raster};

fn create_grid(size: usize) -> Raster<f64> {
    let mut grid = Raster::new(size, size);
    grid.set_transform(GeoTransform::new(0.0, size as f64, 1.0, -1.0));
    grid.set_nodata(Some(f64::NAN));

    for row in 0..size {
        for col in 0..size {
            let base = (row + col) as f64;
            let variation = ((row * 7 + col * 13) % 100) as f64 / 10.0;
            grid.set(row, col, base + variation).unwrap();
        }
    }
    grid
}

fn bench_aggregate(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate");

    for size in [256, 512, 1024, 2048].iter() {
        let grid = create_grid(*size);
        for reducer in [Reducer::Mean, Reducer::Median] {
            let params = AggregateParams::new(4, reducer);
            group.bench_with_input(
                BenchmarkId::new(format!("{:?}", reducer), size),
                size,
                |b, _| b.iter(|| aggregate(black_box(&grid), &params).unwrap()),
            );
        }
    }

    group.finish();
}

fn bench_crop(c: &mut Criterion) {
    let mut group = c.benchmark_group("crop");

    for size in [512, 2048].iter() {
        let grid = create_grid(*size);
        let s = *size as f64;
        let extent = Extent::new(s * 0.25 + 0.3, s * 0.75 - 0.3, s * 0.25 + 0.3, s * 0.75 - 0.3);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| crop(black_box(&grid), &extent).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_aggregate, bench_crop);
criterion_main!(benches);
