//! Allocator benchmarks
//!
//! Benchmarks that simulate actual usage patterns

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use strata_memory::allocator::{
    Allocator, Deallocator, MonotonicAllocator, MultipoolAllocator, PoolAllocator, Resettable,
    StackAllocator,
};
use strata_memory::config::AllocatorConfig;

/// Simulate request/response cycle (allocate, use, release)
fn bench_request_response(c: &mut Criterion) {
    let mut group = c.benchmark_group("request_response");
    group.throughput(Throughput::Elements(1));

    // Monotonic allocator with clear
    group.bench_function("monotonic_with_clear", |b| {
        let mut allocator =
            MonotonicAllocator::with_config(64 * 1024, AllocatorConfig::performance()).unwrap();

        b.iter(|| {
            let req = allocator.allocate(256, 8).unwrap();
            let resp = allocator.allocate(256, 8).unwrap();
            black_box((req, resp));

            allocator.clear();
        });
    });

    // Stack allocator with LIFO frees
    group.bench_function("stack_lifo", |b| {
        let allocator =
            StackAllocator::with_config(64 * 1024, AllocatorConfig::performance()).unwrap();

        b.iter(|| {
            let req = allocator.allocate(256, 8).unwrap();
            let resp = allocator.allocate(256, 8).unwrap();
            black_box((req, resp));

            unsafe {
                allocator.free(resp);
                allocator.free(req);
            }
        });
    });

    // Pool allocator with reuse
    group.bench_function("pool_with_reuse", |b| {
        let allocator =
            PoolAllocator::with_config(64, 256, AllocatorConfig::performance()).unwrap();

        b.iter(|| {
            let req = allocator.allocate(256, 8).unwrap();
            let resp = allocator.allocate(256, 8).unwrap();
            black_box((req, resp));

            unsafe {
                allocator.free(req);
                allocator.free(resp);
            }
        });
    });

    // Multipool routing mixed sizes
    group.bench_function("multipool_mixed", |b| {
        let allocator =
            MultipoolAllocator::with_config(64, 256, 3, AllocatorConfig::performance()).unwrap();

        b.iter(|| {
            let large = allocator.allocate(200, 8).unwrap();
            let small = allocator.allocate(24, 8).unwrap();
            black_box((large, small));

            unsafe {
                allocator.free(small);
                allocator.free(large);
            }
        });
    });

    group.finish();
}

/// Fill a pool to exhaustion, then drain it
fn bench_pool_fill_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_fill_drain");

    for block_count in [64usize, 1024] {
        group.throughput(Throughput::Elements(block_count as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(block_count),
            &block_count,
            |b, &block_count| {
                let allocator =
                    PoolAllocator::with_config(block_count, 64, AllocatorConfig::performance())
                        .unwrap();
                let mut live = Vec::with_capacity(block_count);

                b.iter(|| {
                    while let Some(ptr) = allocator.allocate(64, 8) {
                        live.push(ptr);
                    }
                    for ptr in live.drain(..) {
                        unsafe { allocator.free(ptr) };
                    }
                });
            },
        );
    }

    group.finish();
}

/// Cost of the debug configuration (fill patterns, statistics)
fn bench_config_overhead(c: &mut Criterion) {
    let mut group = c.benchmark_group("config_overhead");

    for (name, config) in [
        ("performance", AllocatorConfig::performance()),
        ("debug", AllocatorConfig::debug()),
    ] {
        group.bench_function(name, |b| {
            let allocator = PoolAllocator::with_config(16, 1024, config).unwrap();
            b.iter(|| {
                let ptr = allocator.allocate(1024, 16).unwrap();
                unsafe { allocator.free(black_box(ptr)) };
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_request_response,
    bench_pool_fill_drain,
    bench_config_overhead
);
criterion_main!(benches);
