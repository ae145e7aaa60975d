//! Count-Min Sketch benchmarks.
//!
//! Proving the update path stays cheap enough for a per-packet hot
//! loop at line rate.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ddos_sketch::shard::{SampleMetrics, Shard};
use ddos_sketch::sketch::Sketch;
use ddos_common::net::TrafficClass;

fn bench_sketch_update(c: &mut Criterion) {
    let sketch = Sketch::new("bench", 4, 65536);

    c.bench_function("sketch_update", |b| {
        let mut ip = 0u64;
        b.iter(|| {
            sketch.update(black_box(ip), 1);
            ip = ip.wrapping_add(1);
        })
    });
}

fn bench_sketch_query(c: &mut Criterion) {
    let sketch = Sketch::new("bench", 4, 65536);
    for ip in 0u64..10_000 {
        sketch.update(ip, 1);
    }

    c.bench_function("sketch_query", |b| {
        b.iter(|| black_box(sketch.query(black_box(4242))))
    });
}

fn bench_sketch_depth_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("sketch_depth");

    for depth in [4usize, 5, 6, 7, 8] {
        let sketch = Sketch::new("bench", depth, 16384);
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, _| {
            b.iter(|| sketch.update(black_box(123456), 1))
        });
    }
    group.finish();
}

fn bench_shard_update_ip(c: &mut Criterion) {
    let shard = Shard::new("bench-worker", 4, 65536);

    c.bench_function("shard_update_ip", |b| {
        let mut ip = 0u32;
        b.iter(|| {
            shard.update_ip(TrafficClass::Attack, black_box(ip), 1, SampleMetrics::default());
            ip = ip.wrapping_add(1);
        })
    });
}

fn bench_heavy_hitters_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("heavy_hitters");

    for candidates in [100usize, 1_000, 10_000] {
        let shard = Shard::new("bench-worker", 4, 65536);
        for ip in 0..candidates {
            for _ in 0..((ip % 50) + 1) {
                shard.update_ip(TrafficClass::Attack, ip as u32, 1, SampleMetrics::default());
            }
        }
        group.throughput(Throughput::Elements(candidates as u64));
        group.bench_with_input(BenchmarkId::from_parameter(candidates), &candidates, |b, _| {
            b.iter(|| black_box(shard.heavy_hitters(TrafficClass::Attack, 20)))
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_sketch_update,
    bench_sketch_query,
    bench_sketch_depth_scaling,
    bench_shard_update_ip,
    bench_heavy_hitters_throughput,
);
criterion_main!(benches);
