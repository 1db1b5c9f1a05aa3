//! FNV-1 64-bit hash benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use streamtrace_core::fnv::fnv1_64;

fn bench_fnv1_64(c: &mut Criterion) {
    let sizes: &[usize] = &[8, 32, 128, 512, 2048];
    let mut group = c.benchmark_group("fnv1_64");

    for &size in sizes {
        let data = vec![0xABu8; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("bytes", size), &size, |b, _| {
            b.iter(|| black_box(fnv1_64(black_box(&data))));
        });
    }
    group.finish();
}

fn bench_pathway_hash(c: &mut Criterion) {
    use streamtrace_core::pathway::pathway_hash;
    c.bench_function("pathway_hash", |b| {
        b.iter(|| black_box(pathway_hash(black_box(12345), black_box(67890))));
    });
}

criterion_group!(benches, bench_fnv1_64, bench_pathway_hash);
criterion_main!(benches);
