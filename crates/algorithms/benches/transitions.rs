//! Benchmarks for land-cover transition aggregation

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use soilcarbon_algorithms::landcover::{aggregate, ClassTaxonomy, EpochLayers, Epochs, RasterPair};
use soilcarbon_core::{GeoTransform, Raster};

const CODES: &[i32] = &[10, 30, 50, 70, 100, 120, 130, 150, 160, 190, 200, 210];

fn layers(size: usize, seed: usize) -> EpochLayers {
    let transform = GeoTransform::new(113.0, -1.0, 0.0025, -0.0025);
    let stock: Vec<f64> = (0..size * size)
        .map(|i| 20.0 + ((i * 31 + seed * 17) % 97) as f64 * 0.5)
        .collect();
    let codes: Vec<i32> = (0..size * size)
        .map(|i| CODES[(i / 3 + seed * (i % 7)) % CODES.len()])
        .collect();
    let mut s = Raster::from_vec(stock, size, size).unwrap();
    s.set_transform(transform);
    let mut c = Raster::from_vec(codes, size, size).unwrap();
    c.set_transform(transform);
    EpochLayers::new(s, c)
}

fn bench_aggregate(c: &mut Criterion) {
    let taxonomy = ClassTaxonomy::esa_cci();
    let mut group = c.benchmark_group("landcover/aggregate");
    for size in [256, 512, 1024, 2048] {
        let pair = RasterPair::new(Epochs::default(), layers(size, 1), layers(size, 2)).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| aggregate(black_box(&pair), black_box(&taxonomy)).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_aggregate);
criterion_main!(benches);
