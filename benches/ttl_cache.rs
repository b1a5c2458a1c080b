//! 读缓存性能基准测试

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use pixelrelay::cache::{TtlCache, pixel_prefix, stats_key};
use std::sync::Arc;
use std::time::Duration;

const TTL: Duration = Duration::from_secs(60);

// ============== 命中 / 未命中 ==============

fn bench_get_or_compute(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let cache: Arc<TtlCache<u64>> = Arc::new(TtlCache::new(10_000, TTL));

    rt.block_on(async {
        cache
            .get_or_compute("hot", TTL, async { Ok(42) })
            .await
            .unwrap();
    });

    let hit = Arc::clone(&cache);
    c.bench_function("ttl_cache/get_or_compute_hit", |b| {
        b.to_async(&rt).iter(|| {
            let c = Arc::clone(&hit);
            async move { c.get_or_compute("hot", TTL, async { Ok(0) }).await }
        });
    });

    let miss = Arc::clone(&cache);
    let counter = std::sync::atomic::AtomicU64::new(0);
    c.bench_function("ttl_cache/get_or_compute_miss", |b| {
        b.to_async(&rt).iter(|| {
            let c = Arc::clone(&miss);
            let i = counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            async move {
                c.get_or_compute(&format!("cold_{}", i), TTL, async move { Ok(i) })
                    .await
            }
        });
    });
}

// ============== 前缀失效 ==============

fn bench_invalidate_pattern(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("ttl_cache/invalidate_pattern");

    for apps in [10i64, 100, 1000] {
        group.throughput(Throughput::Elements(apps as u64));
        group.bench_with_input(BenchmarkId::new("apps", apps), &apps, |b, &apps| {
            b.iter_batched(
                || {
                    let cache: TtlCache<u64> = TtlCache::new(100_000, TTL);
                    rt.block_on(async {
                        for id in 0..apps {
                            for days in [7, 30] {
                                let _ = cache
                                    .get_or_compute(&stats_key(id, days), TTL, async { Ok(1) })
                                    .await;
                            }
                        }
                    });
                    cache
                },
                |cache| {
                    rt.block_on(async {
                        cache.invalidate_pattern(&pixel_prefix(apps / 2)).await;
                    });
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_get_or_compute, bench_invalidate_pattern);
criterion_main!(benches);
