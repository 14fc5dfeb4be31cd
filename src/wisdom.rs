//! Kernel cache persistence, FFTW wisdom-style.
//!
//! The cache is saved as a JSON document of records, one per key, sorted by
//! key so the file is deterministic. Each record carries the documented string
//! encodings (network config, geometry, statistics) plus the opaque
//! hyperparameter string and kernel sources. Loading is all-or-nothing: a
//! record that fails to parse fails the whole load.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cache_key::CacheKey;
use crate::error::{CacheError, CacheResult};
use crate::geometry::Geometry;
use crate::graph::DerivabilityGraph;
use crate::kernel_cache::KernelCache;
use crate::solution::{KernelArtifact, Solution, SolutionStatistics};

/// Overrides the default cache file location.
pub const CACHE_PATH_ENV: &str = "GLLM_KERNEL_CACHE_PATH";

const FORMAT_VERSION: u32 = 1;

/// One persisted cache entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub network_config: String,
    pub geometry: String,
    pub statistics: String,
    #[serde(default)]
    pub discovery_time: Option<f32>,
    pub hyper_params: String,
    #[serde(default)]
    pub kernels: Vec<KernelArtifact>,
}

impl CacheRecord {
    pub fn new(key: &CacheKey, solution: &Solution) -> Self {
        CacheRecord {
            network_config: key.network_config(),
            geometry: solution.geometry.to_string(),
            statistics: solution.statistics.cache_string(),
            discovery_time: solution.statistics.solution_discovery_time,
            hyper_params: solution.hyper_params.clone(),
            kernels: solution.kernels.clone(),
        }
    }

    /// Decode into the stored key and solution.
    ///
    /// `network_config` must be derivable under `graph` from the key of the
    /// tuned geometry, as [`KernelCache::insert_or_replace`] requires.
    pub fn decode(self, graph: &DerivabilityGraph) -> CacheResult<(CacheKey, Solution)> {
        let key: CacheKey = self.network_config.parse()?;
        let geometry: Geometry = self.geometry.parse()?;
        if !graph.is_derivable(&geometry.cache_key(), &key) {
            return Err(CacheError::malformed(format!(
                "geometry `{}` cannot serve network config `{}`",
                self.geometry, self.network_config
            )));
        }
        let mut statistics = SolutionStatistics::from_cache_string(&self.statistics)?;
        statistics.solution_discovery_time = self.discovery_time;
        Ok((key, Solution::new(geometry, statistics, self.kernels, self.hyper_params)))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    entries: Vec<CacheRecord>,
}

/// Default cache file: `$GLLM_KERNEL_CACHE_PATH`, else
/// `~/.cache/gllm-kernels/kernel_cache.json`.
pub fn default_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CACHE_PATH_ENV) {
        return PathBuf::from(path);
    }
    if let Some(cache_dir) = dirs_cache() {
        cache_dir.join("gllm-kernels").join("kernel_cache.json")
    } else {
        PathBuf::from("gllm_kernel_cache.json")
    }
}

fn dirs_cache() -> Option<PathBuf> {
    // XDG_CACHE_HOME or ~/.cache
    if let Ok(xdg) = std::env::var("XDG_CACHE_HOME") {
        return Some(PathBuf::from(xdg));
    }
    if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
        return Some(PathBuf::from(home).join(".cache"));
    }
    None
}

/// Render the cache file contents.
pub fn to_json(cache: &KernelCache) -> CacheResult<String> {
    let file = CacheFile {
        version: FORMAT_VERSION,
        entries: cache
            .entries()
            .iter()
            .map(|(key, solution)| CacheRecord::new(key, solution))
            .collect(),
    };
    Ok(serde_json::to_string_pretty(&file)?)
}

/// Parse cache file contents into `(key, solution)` pairs, checking each
/// stored key against `graph`.
pub fn from_json(content: &str, graph: &DerivabilityGraph) -> CacheResult<Vec<(CacheKey, Solution)>> {
    let file: CacheFile = serde_json::from_str(content)
        .map_err(|e| CacheError::malformed(format!("cache file: {e}")))?;
    if file.version != FORMAT_VERSION {
        return Err(CacheError::malformed(format!(
            "unsupported cache format version {}",
            file.version
        )));
    }
    file.entries
        .into_iter()
        .enumerate()
        .map(|(i, record)| {
            record.decode(graph).map_err(|e| match e {
                CacheError::MalformedCacheRecord(what) => CacheError::malformed(format!("entry {i}: {what}")),
                other => CacheError::malformed(format!("entry {i}: {other}")),
            })
        })
        .collect()
}

impl KernelCache {
    /// Write every entry to `path`, replacing the file atomically.
    pub fn save(&self, path: &Path) -> CacheResult<()> {
        let content = to_json(self)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, path)?;
        log::info!("Saved kernel cache ({} entries): {:?}", self.len(), path);
        Ok(())
    }

    /// Load a cache from `path`. A missing file yields an empty cache.
    pub fn load(path: &Path) -> CacheResult<Self> {
        Self::load_with_graph(path, Arc::new(DerivabilityGraph::new()))
    }

    /// Load into a fresh cache registering its keys with `graph`.
    pub fn load_with_graph(path: &Path, graph: Arc<DerivabilityGraph>) -> CacheResult<Self> {
        let cache = KernelCache::with_graph(graph);
        cache.merge_from(path)?;
        Ok(cache)
    }

    /// Load from [`default_path`].
    pub fn load_default() -> CacheResult<Self> {
        Self::load(&default_path())
    }

    /// Insert every record of `path` into this cache, overwriting existing
    /// keys. Nothing is inserted if any record is malformed. Returns the
    /// number of records read.
    pub fn merge_from(&self, path: &Path) -> CacheResult<usize> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("Kernel cache file not found: {:?}", path);
                return Ok(0);
            }
            Err(e) => return Err(e.into()),
        };
        let entries = from_json(&content, self.graph())?;
        let count = entries.len();
        for (key, solution) in entries {
            self.insert_or_replace(key, solution)?;
        }
        log::info!("Loaded kernel cache ({count} entries): {:?}", path);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::ElementType;
    use crate::solution::KernelKind;

    fn sample_solution() -> Solution {
        let g = Geometry::packed(64, 64, 64, false, true, ElementType::Single)
            .unwrap()
            .with_leading_dims(80, 64, 64)
            .unwrap()
            .with_workspace(1);
        Solution::new(
            g,
            SolutionStatistics::new(0.125, 512.5, 31.0, "2017-02-01"),
            vec![KernelArtifact::new(KernelKind::Main, "tg_main", "__kernel void tg_main() {}")],
            "A_MIC8_PAD1__B_MIC6_PAD1__C_UNR16",
        )
    }

    #[test]
    fn test_record_roundtrip() {
        let solution = sample_solution();
        let record = CacheRecord::new(&solution.cache_key(), &solution);
        assert_eq!(record.network_config, "tC0_tA0_tB1_colMaj1_m64_n64_k64_f32");
        assert_eq!(record.statistics, "runtime_0.125__gflops_512.5__date_2017-02-01");
        let (key, decoded) = record.decode(&DerivabilityGraph::new()).unwrap();
        assert_eq!(key, solution.cache_key());
        assert_eq!(decoded, solution);
    }

    #[test]
    fn test_record_key_mismatch_rejected() {
        let solution = sample_solution();
        let mut record = CacheRecord::new(&solution.cache_key(), &solution);
        record.network_config = "tC0_tA0_tB1_colMaj1_m65_n64_k64_f32".into();
        assert!(matches!(record.decode(&DerivabilityGraph::new()), Err(CacheError::MalformedCacheRecord(_))));
    }

    #[test]
    fn test_bad_statistics_rejected() {
        let solution = sample_solution();
        let mut record = CacheRecord::new(&solution.cache_key(), &solution);
        record.statistics = "runtime_0.1__date_x".into();
        assert!(matches!(record.decode(&DerivabilityGraph::new()), Err(CacheError::MalformedCacheRecord(_))));
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(matches!(from_json("not json", &DerivabilityGraph::new()), Err(CacheError::MalformedCacheRecord(_))));
        assert!(matches!(
            from_json(r#"{"version": 99, "entries": []}"#, &DerivabilityGraph::new()),
            Err(CacheError::MalformedCacheRecord(_))
        ));
        assert!(from_json(r#"{"version": 1, "entries": []}"#, &DerivabilityGraph::new()).unwrap().is_empty());
    }

    #[test]
    fn test_record_under_mirrored_key() {
        let solution = sample_solution();
        let mirrored = solution.cache_key().layout_mirror();
        let record = CacheRecord::new(&mirrored, &solution);
        let (key, decoded) = record.decode(&DerivabilityGraph::new()).unwrap();
        assert_eq!(key, mirrored);
        assert_eq!(decoded, solution);

        // a graph without the mirror rule cannot accept the same record
        let strict = DerivabilityGraph::with_rules(vec![Box::new(crate::graph::PaddingRule)]);
        let record = CacheRecord::new(&mirrored, &solution);
        assert!(matches!(record.decode(&strict), Err(CacheError::MalformedCacheRecord(_))));
    }

    #[test]
    fn test_entry_error_names_the_entry_once() {
        let solution = sample_solution();
        let mut record = CacheRecord::new(&solution.cache_key(), &solution);
        record.statistics = "runtime_x__gflops_1__date_d".into();
        let file = CacheFile {
            version: FORMAT_VERSION,
            entries: vec![record],
        };
        let content = serde_json::to_string(&file).unwrap();
        let err = from_json(&content, &DerivabilityGraph::new()).unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("malformed cache record: entry 0: statistics"), "{message}");
        assert_eq!(message.matches("malformed cache record").count(), 1, "{message}");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("kernel_cache.json");

        let cache = KernelCache::new();
        let solution = sample_solution();
        cache.insert(solution.clone());
        cache.save(&path).unwrap();
        assert!(!path.with_extension("json.tmp").exists());

        let loaded = KernelCache::load(&path).unwrap();
        assert_eq!(loaded.keys(), cache.keys());
        assert_eq!(*loaded.lookup(&solution.cache_key()).unwrap(), solution);
        assert!(loaded.graph().contains(&solution.cache_key()));
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = KernelCache::load(&dir.path().join("absent.json")).unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_malformed_entry_fails_whole_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kernel_cache.json");
        let cache = KernelCache::new();
        cache.insert(sample_solution());
        cache.save(&path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        fs::write(&path, content.replace("runtime_", "rntime_")).unwrap();

        let target = KernelCache::new();
        assert!(matches!(target.merge_from(&path), Err(CacheError::MalformedCacheRecord(_))));
        assert!(target.is_empty());
    }
}
