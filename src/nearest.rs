//! Nearest-match queries over the kernel cache.
//!
//! A candidate for query `q` is a key that is both stored in the cache and
//! has a derivability edge into `q`. Distance only ranks candidates; it never
//! makes an entry legal. A candidate is measured as the shape it runs as when
//! serving `q`, so a mirrored or output-transposed kernel computing exactly
//! the query sits at distance 0.
//!
//! `is_within(q, t)` holds exactly when `get(q)` succeeds with a key at
//! distance `<= t`.

use crate::cache_key::CacheKey;
use crate::error::{CacheError, CacheResult};
use crate::geometry::Geometry;
use crate::graph::DerivabilityGraph;
use crate::kernel_cache::KernelCache;

/// Sum of absolute log-ratios of `m`, `n` and `k`.
///
/// Zero for identical dimensions, symmetric, and growing with the relative
/// (not absolute) divergence of each dimension: 64 vs 128 is as far apart as
/// 1024 vs 2048.
pub fn distance(a: &CacheKey, b: &CacheKey) -> f64 {
    log_ratio(a.m(), b.m()) + log_ratio(a.n(), b.n()) + log_ratio(a.k(), b.k())
}

pub fn geometry_distance(a: &Geometry, b: &Geometry) -> f64 {
    distance(&a.cache_key(), &b.cache_key())
}

fn log_ratio(a: usize, b: usize) -> f64 {
    ((a as f64).ln() - (b as f64).ln()).abs()
}

/// Distance from `query` to `cached` as it would serve `query`, or `None`
/// when no rule of `graph` derives `query` from `cached`.
pub fn derived_distance(query: &CacheKey, cached: &CacheKey, graph: &DerivabilityGraph) -> Option<f64> {
    graph
        .served_shapes(cached, query)
        .map(|shape| distance(query, &shape))
        .min_by(f64::total_cmp)
}

/// Stored keys with an edge into `query`, ascending.
pub fn candidates(query: &CacheKey, graph: &DerivabilityGraph, cache: &KernelCache) -> Vec<CacheKey> {
    graph
        .neighbors_into(query)
        .into_iter()
        .filter(|key| cache.contains(key))
        .collect()
}

/// Is there a derivable cached solution within `threshold` of `query`?
pub fn is_within(query: &CacheKey, graph: &DerivabilityGraph, cache: &KernelCache, threshold: f64) -> bool {
    candidates(query, graph, cache)
        .iter()
        .filter_map(|key| derived_distance(query, key, graph))
        .any(|d| d <= threshold)
}

/// The derivable cached key closest to `query`.
///
/// Equidistant candidates resolve to the smallest key, independent of the
/// order entries were inserted.
pub fn get(query: &CacheKey, graph: &DerivabilityGraph, cache: &KernelCache) -> CacheResult<CacheKey> {
    get_with_distance(query, graph, cache).map(|(key, _)| key)
}

/// [`get`] together with the winning distance.
pub fn get_with_distance(
    query: &CacheKey,
    graph: &DerivabilityGraph,
    cache: &KernelCache,
) -> CacheResult<(CacheKey, f64)> {
    let mut best: Option<(CacheKey, f64)> = None;
    // ascending key order, so only a strictly smaller distance displaces the incumbent
    for key in candidates(query, graph, cache) {
        let Some(d) = derived_distance(query, &key, graph) else {
            continue;
        };
        match best {
            Some((_, best_d)) if d >= best_d => {}
            _ => best = Some((key, d)),
        }
    }
    best.ok_or(CacheError::NoDerivableCandidate { query: *query })
}
