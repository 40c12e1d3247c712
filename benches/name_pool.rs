//! Name pool micro-benchmarks
//!
//! Measures interning of new names, repeat lookups of existing names and
//! resolution of name codes back to their parts.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use stylus::names::NamePool;

fn local_names(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("element{}", i)).collect()
}

fn benchmark_allocate_fresh(c: &mut Criterion) {
    let mut group = c.benchmark_group("name_pool_allocate");

    for count in [100, 1_000, 10_000] {
        let names = local_names(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("names", count), &names, |b, names| {
            b.iter(|| {
                let pool = NamePool::new();
                for name in names {
                    black_box(pool.allocate("p", "urn:bench", name).expect("allocation failed"));
                }
            });
        });
    }

    group.finish();
}

fn benchmark_allocate_existing(c: &mut Criterion) {
    let mut group = c.benchmark_group("name_pool_lookup");
    let pool = NamePool::new();
    let names = local_names(1_000);
    for name in &names {
        pool.allocate("p", "urn:bench", name).expect("allocation failed");
    }

    group.throughput(Throughput::Elements(names.len() as u64));
    group.bench_function("allocate_existing", |b| {
        b.iter(|| {
            for name in &names {
                black_box(pool.allocate("p", "urn:bench", name).expect("allocation failed"));
            }
        });
    });
    group.bench_function("fingerprint_for", |b| {
        b.iter(|| {
            for name in &names {
                black_box(pool.fingerprint_for("urn:bench", name));
            }
        });
    });
    group.finish();
}

fn benchmark_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("name_pool_resolve");
    let pool = NamePool::new();
    let codes: Vec<_> = local_names(1_000)
        .iter()
        .map(|name| pool.allocate("p", "urn:bench", name).expect("allocation failed"))
        .collect();

    group.throughput(Throughput::Elements(codes.len() as u64));
    group.bench_function("display_name", |b| {
        b.iter(|| {
            for code in &codes {
                black_box(pool.display_name(*code).expect("unknown code"));
            }
        });
    });
    group.bench_function("local_name", |b| {
        b.iter(|| {
            for code in &codes {
                black_box(pool.local_name(*code).expect("unknown code"));
            }
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    benchmark_allocate_fresh,
    benchmark_allocate_existing,
    benchmark_resolve
);
criterion_main!(benches);
