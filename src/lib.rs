//! gllm-kernel-cache: reuse of tuned GEMM kernels across problem geometries.
//!
//! Tuning a GEMM kernel for one shape is expensive, so tuned solutions are
//! cached and reused:
//! - **Exact reuse**: solutions are keyed by [`CacheKey`], the part of a
//!   [`Geometry`] that determines which kernels are valid
//! - **Derivability**: a [`DerivabilityGraph`] records which cached keys can
//!   serve another key (padding, layout mirror, output transpose)
//! - **Nearest match**: among derivable entries, [`nearest::get`] picks the
//!   one with the smallest log-ratio distance in `m`, `n`, `k`
//! - **Persistence**: [`KernelCache::save`] / [`KernelCache::load`] keep the
//!   cache across runs as JSON
//!
//! # Quick Start
//!
//! ```ignore
//! use gllm_kernel_cache::{ElementType, Geometry, KernelCache, MatchConfig};
//!
//! let config = MatchConfig::from_env();
//! let cache = config.open()?;
//! let geometry = Geometry::packed(1024, 512, 256, false, true, ElementType::Single)?;
//! match config.resolve(&cache, &geometry)? {
//!     Resolution::Hit { solution, .. } => run(&solution),
//!     Resolution::Miss { .. } => tune_and_insert(&cache, geometry),
//! }
//! ```

pub mod cache_key;
pub mod config;
pub mod error;
pub mod geometry;
pub mod graph;
pub mod kernel_cache;
pub mod nearest;
pub mod presets;
pub mod solution;
pub mod wisdom;

pub use cache_key::CacheKey;
pub use config::MatchConfig;
pub use error::{CacheError, CacheResult};
pub use geometry::{ElementType, Geometry};
pub use graph::{DerivabilityGraph, DerivationRule};
pub use kernel_cache::{CacheStats, KernelCache, Resolution};
pub use solution::{KernelArtifact, KernelKind, Solution, SolutionStatistics};
pub use wisdom::CacheRecord;
