//! 内核缓存最近匹配性能基准测试
//!
//! 缓存规模: square (189) + DeepBench (78) + backward-conv (24) 预设
//! 对比: 精确 lookup vs nearest::get vs nearest::is_within vs resolve
//! 报告: 每次查询耗时 (线性扫描图节点)

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::Duration;

use gllm_kernel_cache::presets;
use gllm_kernel_cache::{nearest, CacheKey, Geometry, KernelCache, MatchConfig, Solution, SolutionStatistics};

fn seeded_cache(geometries: &[Geometry]) -> KernelCache {
    let cache = KernelCache::new();
    for g in geometries {
        cache.insert(Solution::new(
            *g,
            SolutionStatistics::new(1.0, 1000.0, 10.0, "bench"),
            vec![],
            "MAC8_UNR16",
        ));
    }
    cache
}

fn preset_sets() -> Vec<(&'static str, Vec<Geometry>)> {
    let mut all = presets::square(0).unwrap_or_default();
    all.extend(presets::deepbench(0).unwrap_or_default());
    all.extend(presets::backward_conv_wrw(0).unwrap_or_default());
    vec![
        ("small_growing", presets::small_growing(0).unwrap_or_default()),
        ("deepbench", presets::deepbench(0).unwrap_or_default()),
        ("all", all),
    ]
}

/// 每个预设的镜像查询: 只能经由 layout-mirror 规则命中
fn mirrored_queries(geometries: &[Geometry]) -> Vec<CacheKey> {
    geometries.iter().map(|g| g.layout_mirror().cache_key()).collect()
}

fn bench_nearest(c: &mut Criterion) {
    let mut group = c.benchmark_group("nearest");
    group.measurement_time(Duration::from_secs(5));

    for (name, geometries) in preset_sets() {
        let cache = seeded_cache(&geometries);
        let exact: Vec<CacheKey> = geometries.iter().map(|g| g.cache_key()).collect();
        let mirrored = mirrored_queries(&geometries);
        group.throughput(Throughput::Elements(exact.len() as u64));

        group.bench_with_input(BenchmarkId::new("lookup", name), &exact, |b, keys| {
            b.iter(|| {
                for key in keys {
                    black_box(cache.lookup(black_box(key)));
                }
            })
        });

        group.bench_with_input(BenchmarkId::new("get", name), &mirrored, |b, keys| {
            b.iter(|| {
                for key in keys {
                    let _ = black_box(nearest::get(black_box(key), cache.graph(), &cache));
                }
            })
        });

        let threshold = MatchConfig::default().threshold;
        group.bench_with_input(BenchmarkId::new("is_within", name), &mirrored, |b, keys| {
            b.iter(|| {
                for key in keys {
                    black_box(nearest::is_within(black_box(key), cache.graph(), &cache, threshold));
                }
            })
        });

        let mirrored_geometries: Vec<Geometry> = geometries.iter().map(|g| g.layout_mirror()).collect();
        group.bench_with_input(BenchmarkId::new("resolve", name), &mirrored_geometries, |b, queries| {
            b.iter(|| {
                for g in queries {
                    let _ = black_box(cache.resolve(black_box(g), threshold));
                }
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_nearest);
criterion_main!(benches);
