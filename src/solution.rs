//! Tuned solutions and their benchmark statistics.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::cache_key::CacheKey;
use crate::error::{CacheError, CacheResult};
use crate::geometry::Geometry;

/// Benchmark record of a solution on the geometry it was tuned for.
#[derive(Debug, Clone, PartialEq)]
pub struct SolutionStatistics {
    /// Median kernel time in milliseconds
    pub median_benchmark_time: f32,
    /// Median throughput in GFLOP/s
    pub median_benchmark_gflops: f32,
    /// Seconds from the start of the search until this solution was found.
    /// Not part of the statistics string, so unknown after parsing one.
    pub solution_discovery_time: Option<f32>,
    /// When the solution was found
    pub date: String,
}

impl SolutionStatistics {
    pub fn new(
        median_benchmark_time: f32,
        median_benchmark_gflops: f32,
        solution_discovery_time: f32,
        date: impl Into<String>,
    ) -> Self {
        SolutionStatistics {
            median_benchmark_time,
            median_benchmark_gflops,
            solution_discovery_time: Some(solution_discovery_time),
            date: date.into(),
        }
    }

    /// Statistics stamped with the current unix time.
    pub fn now(median_benchmark_time: f32, median_benchmark_gflops: f32, solution_discovery_time: f32) -> Self {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self::new(
            median_benchmark_time,
            median_benchmark_gflops,
            solution_discovery_time,
            timestamp.to_string(),
        )
    }

    /// Parse `runtime_<time>__gflops_<gflops>__date_<date>`.
    ///
    /// The date is everything after `__date_`, so it may itself contain `_`.
    pub fn from_cache_string(s: &str) -> CacheResult<Self> {
        let rest = s
            .strip_prefix("runtime_")
            .ok_or_else(|| CacheError::malformed(format!("statistics `{s}`: missing runtime field")))?;
        let (runtime, rest) = rest
            .split_once("__gflops_")
            .ok_or_else(|| CacheError::malformed(format!("statistics `{s}`: missing gflops field")))?;
        let (gflops, date) = rest
            .split_once("__date_")
            .ok_or_else(|| CacheError::malformed(format!("statistics `{s}`: missing date field")))?;

        let parse = |name: &str, v: &str| {
            v.parse::<f32>()
                .map_err(|_| CacheError::malformed(format!("statistics `{s}`: bad {name} `{v}`")))
        };
        Ok(SolutionStatistics {
            median_benchmark_time: parse("runtime", runtime)?,
            median_benchmark_gflops: parse("gflops", gflops)?,
            solution_discovery_time: None,
            date: date.to_string(),
        })
    }

    pub fn cache_string(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for SolutionStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "runtime_{}__gflops_{}__date_{}",
            self.median_benchmark_time, self.median_benchmark_gflops, self.date
        )
    }
}

impl FromStr for SolutionStatistics {
    type Err = CacheError;

    fn from_str(s: &str) -> CacheResult<Self> {
        Self::from_cache_string(s)
    }
}

/// Role of one kernel within a solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KernelKind {
    /// Scales C by beta before the main kernel accumulates into it
    BetaC,
    /// Copies/reorders A into workspace
    WorkspaceA,
    /// Copies/reorders B into workspace
    WorkspaceB,
    /// The GEMM kernel proper
    Main,
}

/// Generated source of one kernel. Opaque to the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelArtifact {
    pub kind: KernelKind,
    pub function_name: String,
    pub source: String,
}

impl KernelArtifact {
    pub fn new(kind: KernelKind, function_name: impl Into<String>, source: impl Into<String>) -> Self {
        KernelArtifact {
            kind,
            function_name: function_name.into(),
            source: source.into(),
        }
    }
}

/// Result of one successful tuning run. Only valid for `geometry` and the
/// shapes derivable from its key.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub geometry: Geometry,
    pub statistics: SolutionStatistics,
    /// Kernels in launch order
    pub kernels: Vec<KernelArtifact>,
    /// Serialized hyperparameters, consumed by the kernel builder
    pub hyper_params: String,
}

impl Solution {
    pub fn new(
        geometry: Geometry,
        statistics: SolutionStatistics,
        kernels: Vec<KernelArtifact>,
        hyper_params: impl Into<String>,
    ) -> Self {
        Solution {
            geometry,
            statistics,
            kernels,
            hyper_params: hyper_params.into(),
        }
    }

    pub fn cache_key(&self) -> CacheKey {
        self.geometry.cache_key()
    }

    /// Network-config string of the tuned geometry (no offsets, no workspace).
    pub fn network_config(&self) -> String {
        self.cache_key().network_config()
    }

    pub fn main_kernel(&self) -> Option<&KernelArtifact> {
        self.kernels.iter().find(|k| k.kind == KernelKind::Main)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::ElementType;

    #[test]
    fn test_statistics_string() {
        let stats = SolutionStatistics::new(1.25, 4096.5, 12.0, "2017-02-01");
        assert_eq!(stats.cache_string(), "runtime_1.25__gflops_4096.5__date_2017-02-01");
        let parsed = SolutionStatistics::from_cache_string(&stats.cache_string()).unwrap();
        assert_eq!(parsed.median_benchmark_time, 1.25);
        assert_eq!(parsed.median_benchmark_gflops, 4096.5);
        assert_eq!(parsed.date, "2017-02-01");
        assert_eq!(parsed.solution_discovery_time, None);
    }

    #[test]
    fn test_statistics_date_with_underscores() {
        let parsed: SolutionStatistics = "runtime_0.5__gflops_10__date_Wed_Feb__1_2017".parse().unwrap();
        assert_eq!(parsed.date, "Wed_Feb__1_2017");
        assert_eq!(parsed.median_benchmark_gflops, 10.0);
    }

    #[test]
    fn test_statistics_rejects_malformed() {
        for bad in [
            "",
            "runtime_1.0",
            "runtime_1.0__gflops_2.0",
            "gflops_2.0__runtime_1.0__date_x",
            "runtime_abc__gflops_2.0__date_x",
            "runtime_1.0__gflops___date_x",
            "runtime_1.0__date_x__gflops_2.0",
        ] {
            let err = SolutionStatistics::from_cache_string(bad).unwrap_err();
            assert!(matches!(err, CacheError::MalformedCacheRecord(_)), "accepted `{bad}`");
        }
    }

    #[test]
    fn test_solution_accessors() {
        let g = Geometry::packed(64, 64, 64, false, true, ElementType::Single).unwrap();
        let solution = Solution::new(
            g,
            SolutionStatistics::now(0.1, 5.2, 3.0),
            vec![
                KernelArtifact::new(KernelKind::BetaC, "betac", "__kernel void betac() {}"),
                KernelArtifact::new(KernelKind::Main, "gemm", "__kernel void gemm() {}"),
            ],
            "A_MIC8_PAD1_PLU0__B_MIC6_PAD1_PLU0__C_UNR16_GAL3",
        );
        assert_eq!(solution.network_config(), "tC0_tA0_tB1_colMaj1_m64_n64_k64_f32");
        assert_eq!(solution.main_kernel().map(|k| k.function_name.as_str()), Some("gemm"));
        assert!(solution.statistics.date.parse::<u64>().is_ok());
    }
}
