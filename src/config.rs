//! Matching configuration.

use std::path::PathBuf;

use crate::error::CacheResult;
use crate::geometry::Geometry;
use crate::kernel_cache::{KernelCache, Resolution};
use crate::wisdom::{self, CACHE_PATH_ENV};

/// Overrides the nearest-match threshold.
pub const THRESHOLD_ENV: &str = "GLLM_KERNEL_CACHE_THRESHOLD";

/// How far a cached solution may be from a query and still be reused.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchConfig {
    /// Maximum [`nearest::distance`](crate::nearest::distance) of a reused entry
    pub threshold: f64,
    /// Cache file; `None` means [`wisdom::default_path`]
    pub cache_path: Option<PathBuf>,
}

impl Default for MatchConfig {
    fn default() -> Self {
        MatchConfig {
            // combined m/n/k drift of up to 4x
            threshold: 4f64.ln(),
            cache_path: None,
        }
    }
}

impl MatchConfig {
    /// Reuse only solutions stored under the query's own key.
    pub fn exact() -> Self {
        MatchConfig {
            threshold: 0.0,
            ..Self::default()
        }
    }

    /// Reuse any derivable solution, however far.
    pub fn relaxed() -> Self {
        MatchConfig {
            threshold: f64::INFINITY,
            ..Self::default()
        }
    }

    /// Default config with environment overrides applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var(THRESHOLD_ENV) {
            match raw.trim().parse::<f64>() {
                Ok(t) if t >= 0.0 => config.threshold = t,
                _ => log::warn!("Ignoring {THRESHOLD_ENV}={raw:?}: expected a non-negative number"),
            }
        }
        if let Some(path) = std::env::var_os(CACHE_PATH_ENV) {
            config.cache_path = Some(PathBuf::from(path));
        }
        config
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = Some(path.into());
        self
    }

    pub fn cache_path(&self) -> PathBuf {
        self.cache_path.clone().unwrap_or_else(wisdom::default_path)
    }

    /// Load the cache file this config points at.
    pub fn open(&self) -> CacheResult<KernelCache> {
        KernelCache::load(&self.cache_path())
    }

    pub fn resolve(&self, cache: &KernelCache, geometry: &Geometry) -> CacheResult<Resolution> {
        cache.resolve(geometry, self.threshold)
    }
}
