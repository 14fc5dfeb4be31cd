//! Kernel cache store.
//!
//! Maps each [`CacheKey`] to the latest tuned [`Solution`]. Every entry lives
//! in its own slot, so replacing one key's solution never blocks lookups of
//! other keys; the map-level lock is only taken to add or drop a slot.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use crate::cache_key::CacheKey;
use crate::error::{CacheError, CacheResult};
use crate::geometry::Geometry;
use crate::graph::DerivabilityGraph;
use crate::nearest;
use crate::solution::Solution;

type Slot = Arc<RwLock<Arc<Solution>>>;

/// Cache counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub entries: usize,
    pub inserts: usize,
    pub replacements: usize,
    pub evictions: usize,
}

/// Outcome of [`KernelCache::resolve`].
#[derive(Debug, Clone)]
pub enum Resolution {
    /// A cached solution can serve the query. `distance` is 0 for an exact key.
    Hit {
        key: CacheKey,
        distance: f64,
        solution: Arc<Solution>,
    },
    /// Nothing acceptable is cached; the driver should tune. `nearest` is the
    /// best derivable candidate, if any, that fell outside the threshold.
    Miss { nearest: Option<(CacheKey, f64)> },
}

impl Resolution {
    pub fn is_hit(&self) -> bool {
        matches!(self, Resolution::Hit { .. })
    }

    pub fn solution(&self) -> Option<&Arc<Solution>> {
        match self {
            Resolution::Hit { solution, .. } => Some(solution),
            Resolution::Miss { .. } => None,
        }
    }
}

pub struct KernelCache {
    graph: Arc<DerivabilityGraph>,
    entries: RwLock<BTreeMap<CacheKey, Slot>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
    inserts: AtomicUsize,
    replacements: AtomicUsize,
    evictions: AtomicUsize,
}

impl KernelCache {
    /// Empty cache with its own graph using the built-in rules.
    pub fn new() -> Self {
        Self::with_graph(Arc::new(DerivabilityGraph::new()))
    }

    /// Empty cache registering its keys with `graph`.
    pub fn with_graph(graph: Arc<DerivabilityGraph>) -> Self {
        KernelCache {
            graph,
            entries: RwLock::new(BTreeMap::new()),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
            inserts: AtomicUsize::new(0),
            replacements: AtomicUsize::new(0),
            evictions: AtomicUsize::new(0),
        }
    }

    pub fn graph(&self) -> &DerivabilityGraph {
        &self.graph
    }

    pub fn shared_graph(&self) -> Arc<DerivabilityGraph> {
        Arc::clone(&self.graph)
    }

    /// Exact-key read. No derivability is applied.
    pub fn lookup(&self, key: &CacheKey) -> Option<Arc<Solution>> {
        let found = self.peek(key);
        self.count_lookup(key, found.is_some());
        found
    }

    /// Store `solution` under `key`, replacing any previous solution whole.
    ///
    /// `key` must be derivable from the key `solution` was tuned for, so a
    /// kernel reused through a mirror or transpose may be stored under the
    /// query it served. The key is registered with the graph before it becomes
    /// visible through [`keys`](Self::keys). Returns the replaced solution.
    pub fn insert_or_replace(&self, key: CacheKey, solution: Solution) -> CacheResult<Option<Arc<Solution>>> {
        let tuned = solution.cache_key();
        if !self.graph.is_derivable(&tuned, &key) {
            return Err(CacheError::UnderivableKey { key, tuned });
        }
        Ok(self.store(key, solution))
    }

    /// Store `solution` under the key of the geometry it was tuned for.
    pub fn insert(&self, solution: Solution) -> Option<Arc<Solution>> {
        self.store(solution.cache_key(), solution)
    }

    fn store(&self, key: CacheKey, solution: Solution) -> Option<Arc<Solution>> {
        self.graph.register(key);
        let solution = Arc::new(solution);

        // replace under the shared map lock so a concurrent evict cannot orphan the slot
        {
            let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
            if let Some(slot) = entries.get(&key) {
                return Some(self.replace_in(slot, solution));
            }
        }

        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if let Some(slot) = entries.get(&key) {
            return Some(self.replace_in(slot, solution));
        }
        entries.insert(key, Arc::new(RwLock::new(solution)));
        self.inserts.fetch_add(1, Ordering::Relaxed);
        log::debug!("Kernel cache insert: {key}");
        None
    }

    /// Drop the entry for `key`. Its graph node is kept.
    pub fn evict(&self, key: &CacheKey) -> Option<Arc<Solution>> {
        let slot = self
            .entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key)?;
        self.evictions.fetch_add(1, Ordering::Relaxed);
        log::debug!("Kernel cache evict: {key}");
        let solution = Arc::clone(&slot.read().unwrap_or_else(|e| e.into_inner()));
        Some(solution)
    }

    /// Stored keys in ascending order.
    pub fn keys(&self) -> Vec<CacheKey> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .copied()
            .collect()
    }

    /// Snapshot of every entry in ascending key order. Does not touch the
    /// hit/miss counters.
    pub fn entries(&self) -> Vec<(CacheKey, Arc<Solution>)> {
        let slots: Vec<(CacheKey, Slot)> = self
            .entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(key, slot)| (*key, Arc::clone(slot)))
            .collect();
        slots
            .into_iter()
            .map(|(key, slot)| {
                let solution = Arc::clone(&slot.read().unwrap_or_else(|e| e.into_inner()));
                (key, solution)
            })
            .collect()
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
            inserts: self.inserts.load(Ordering::Relaxed),
            replacements: self.replacements.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    /// Find a cached solution that can run `geometry`.
    ///
    /// Tries the exact key first, then the nearest derivable entry within
    /// `threshold`.
    pub fn resolve(&self, geometry: &Geometry, threshold: f64) -> CacheResult<Resolution> {
        let query = geometry.cache_key();
        if let Some(solution) = self.peek(&query) {
            self.count_lookup(&query, true);
            return Ok(Resolution::Hit {
                key: query,
                distance: 0.0,
                solution,
            });
        }

        match nearest::get_with_distance(&query, &self.graph, self) {
            Ok((key, distance)) if distance <= threshold => match self.peek(&key) {
                Some(solution) => {
                    self.count_lookup(&query, true);
                    log::debug!("Kernel cache derived hit: {query} <- {key} (distance {distance:.4})");
                    Ok(Resolution::Hit {
                        key,
                        distance,
                        solution,
                    })
                }
                // evicted between the candidate scan and the read
                None => Ok(self.resolve_miss(&query, None)),
            },
            Ok((key, distance)) => {
                log::debug!(
                    "Kernel cache: nearest {key} to {query} at distance {distance:.4} exceeds {threshold}"
                );
                Ok(self.resolve_miss(&query, Some((key, distance))))
            }
            Err(CacheError::NoDerivableCandidate { .. }) => Ok(self.resolve_miss(&query, None)),
            Err(e) => Err(e),
        }
    }

    fn resolve_miss(&self, query: &CacheKey, nearest: Option<(CacheKey, f64)>) -> Resolution {
        self.count_lookup(query, false);
        Resolution::Miss { nearest }
    }

    /// Exact read without touching the hit/miss counters.
    fn peek(&self, key: &CacheKey) -> Option<Arc<Solution>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let slot = entries.get(key)?;
        let solution = Arc::clone(&slot.read().unwrap_or_else(|e| e.into_inner()));
        Some(solution)
    }

    fn count_lookup(&self, key: &CacheKey, hit: bool) {
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            log::debug!("Kernel cache miss: {key}");
        }
    }

    fn replace_in(&self, slot: &Slot, solution: Arc<Solution>) -> Arc<Solution> {
        let mut current = slot.write().unwrap_or_else(|e| e.into_inner());
        self.replacements.fetch_add(1, Ordering::Relaxed);
        std::mem::replace(&mut *current, solution)
    }
}

impl Default for KernelCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for KernelCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelCache")
            .field("graph", &self.graph)
            .field("stats", &self.stats())
            .finish()
    }
}
