//! Benchmark problem sets used to seed and exercise the cache.
//!
//! All geometries are column-major with `C` not transposed. Leading
//! dimensions are minimal unless a problem states them, optionally padded.

use crate::error::CacheResult;
use crate::geometry::{min_leading_dims, ElementType, Geometry};

/// `(m, n, k, tA, tB)`
pub type BasicProblem = (usize, usize, usize, bool, bool);

/// `(m, n, k, lda, ldb, ldc, tA, tB)`
pub type StridedProblem = (usize, usize, usize, usize, usize, usize, bool, bool);

/// Padding added to `(lda, ldb, ldc)` when [`LeadingDims::Padded`] is used.
pub const LD_PADDING: (usize, usize, usize) = (5, 7, 13);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LeadingDims {
    #[default]
    Minimal,
    /// Minimal plus [`LD_PADDING`]
    Padded,
}

/// DeepBench GEMM shapes (m, n, k, tA, tB).
const DEEPBENCH: &[BasicProblem] = &[
    (1760, 16, 1760, false, false),
    (1760, 32, 1760, false, false),
    (1760, 64, 1760, false, false),
    (1760, 128, 1760, false, false),
    (1760, 7000, 1760, false, false),
    (2048, 16, 2048, false, false),
    (2048, 32, 2048, false, false),
    (2048, 64, 2048, false, false),
    (2048, 128, 2048, false, false),
    (2048, 7000, 2048, false, false),
    (2560, 16, 2560, false, false),
    (2560, 32, 2560, false, false),
    (2560, 64, 2560, false, false),
    (2560, 128, 2560, false, false),
    (2560, 7000, 2560, false, false),
    (4096, 16, 4096, false, false),
    (4096, 32, 4096, false, false),
    (4096, 64, 4096, false, false),
    (4096, 128, 4096, false, false),
    (4096, 7000, 4096, false, false),
    (1760, 16, 1760, true, false),
    (1760, 32, 1760, true, false),
    (1760, 64, 1760, true, false),
    (1760, 128, 1760, true, false),
    (1760, 7000, 1760, true, false),
    (2048, 16, 2048, true, false),
    (2048, 32, 2048, true, false),
    (2048, 64, 2048, true, false),
    (2048, 128, 2048, true, false),
    (2048, 7000, 2048, true, false),
    (2560, 16, 2560, true, false),
    (2560, 32, 2560, true, false),
    (2560, 64, 2560, true, false),
    (2560, 128, 2560, true, false),
    (2560, 7000, 2560, true, false),
    (4096, 16, 4096, true, false),
    (4096, 32, 4096, true, false),
    (4096, 64, 4096, true, false),
    (4096, 128, 4096, true, false),
    (4096, 7000, 4096, true, false),
    (1760, 7133, 1760, false, true),
    (2048, 7133, 2048, false, true),
    (2560, 7133, 2560, false, true),
    (4096, 7133, 4096, false, true),
    (5124, 9124, 1760, false, false),
    (35, 8457, 1760, false, false),
    (5124, 9124, 2048, false, false),
    (35, 8457, 2048, false, false),
    (5124, 9124, 2560, false, false),
    (35, 8457, 2560, false, false),
    (5124, 9124, 4096, false, false),
    (35, 8457, 4096, false, false),
    (5124, 9124, 1760, true, false),
    (35, 8457, 1760, true, false),
    (5124, 9124, 2048, true, false),
    (35, 8457, 2048, true, false),
    (5124, 9124, 2560, true, false),
    (35, 8457, 2560, true, false),
    (5124, 9124, 4096, true, false),
    (35, 8457, 4096, true, false),
    (7680, 16, 2560, false, false),
    (7680, 32, 2560, false, false),
    (7680, 64, 2560, false, false),
    (7680, 128, 2560, false, false),
    (7680, 16, 2560, true, false),
    (7680, 32, 2560, true, false),
    (7680, 64, 2560, true, false),
    (7680, 128, 2560, true, false),
    (3072, 16, 1024, false, false),
    (3072, 32, 1024, false, false),
    (3072, 64, 1024, false, false),
    (3072, 128, 1024, false, false),
    (3072, 16, 1024, true, false),
    (3072, 32, 1024, true, false),
    (3072, 64, 1024, true, false),
    (3072, 128, 1024, true, false),
    (3072, 7435, 1024, false, true),
    (7680, 5481, 2560, false, true),
];

/// Backward-convolution weight-gradient GEMMs with explicit strides.
const BACKWARD_CONV_WRW: &[StridedProblem] = &[
    (100, 32, 26939, 26939, 26939, 100, true, false),
    (1600, 32, 6308, 6308, 6308, 1600, true, false),
    (9, 16, 23040, 23040, 23040, 9, true, false),
    (144, 32, 5760, 5760, 5760, 144, true, false),
    (288, 64, 1440, 1440, 1440, 288, true, false),
    (576, 128, 360, 360, 360, 576, true, false),
    (27, 64, 2916, 2916, 2916, 27, true, false),
    (576, 64, 2916, 2916, 2916, 576, true, false),
    (1152, 128, 729, 729, 729, 1152, true, false),
    (1152, 256, 196, 196, 196, 1152, true, false),
    (2304, 512, 49, 49, 49, 2304, true, false),
    (27, 64, 50176, 50176, 50176, 27, true, false),
    (576, 128, 12544, 12544, 12544, 576, true, false),
    (1152, 256, 3136, 3136, 3136, 1152, true, false),
    (2304, 512, 784, 784, 784, 2304, true, false),
    (4608, 512, 196, 196, 196, 4608, true, false),
    (4608, 512, 49, 49, 49, 4608, true, false),
    (147, 64, 12544, 12544, 12544, 147, true, false),
    (4800, 32, 784, 784, 784, 4800, true, false),
    (192, 64, 784, 784, 784, 192, true, false),
    (12800, 48, 196, 196, 196, 12800, true, false),
    (512, 192, 196, 196, 196, 512, true, false),
    (832, 256, 49, 49, 49, 832, true, false),
    (20800, 128, 49, 49, 49, 20800, true, false),
];

/// Column-major, non-transposed-C geometries from `(m, n, k, tA, tB)` tuples.
pub fn from_basic(
    problems: &[BasicProblem],
    leading_dims: LeadingDims,
    workspace_size: usize,
    element_type: ElementType,
) -> CacheResult<Vec<Geometry>> {
    problems
        .iter()
        .map(|&(m, n, k, ta, tb)| {
            let (mut lda, mut ldb, mut ldc) = min_leading_dims(true, ta, tb, false, m, n, k);
            if leading_dims == LeadingDims::Padded {
                lda += LD_PADDING.0;
                ldb += LD_PADDING.1;
                ldc += LD_PADDING.2;
            }
            Geometry::new(true, ta, tb, false, lda, ldb, ldc, m, n, k, workspace_size, element_type)
        })
        .collect()
}

/// Column-major, non-transposed-C geometries with explicit leading dimensions.
pub fn from_strided(
    problems: &[StridedProblem],
    workspace_size: usize,
    element_type: ElementType,
) -> CacheResult<Vec<Geometry>> {
    problems
        .iter()
        .map(|&(m, n, k, lda, ldb, ldc, ta, tb)| {
            Geometry::new(true, ta, tb, false, lda, ldb, ldc, m, n, k, workspace_size, element_type)
        })
        .collect()
}

pub fn deepbench(workspace_size: usize) -> CacheResult<Vec<Geometry>> {
    from_basic(DEEPBENCH, LeadingDims::Minimal, workspace_size, ElementType::Single)
}

/// DeepBench problems with `m * n * k` below `threshold`.
pub fn small_deepbench(threshold: u64, workspace_size: usize) -> CacheResult<Vec<Geometry>> {
    let mut geometries = deepbench(workspace_size)?;
    geometries.retain(|g| volume(g) < threshold);
    Ok(geometries)
}

/// DeepBench problems with `m * n * k` at or above `threshold`.
pub fn large_deepbench(threshold: u64, workspace_size: usize) -> CacheResult<Vec<Geometry>> {
    let mut geometries = deepbench(workspace_size)?;
    geometries.retain(|g| volume(g) >= threshold);
    Ok(geometries)
}

pub fn backward_conv_wrw(workspace_size: usize) -> CacheResult<Vec<Geometry>> {
    from_strided(BACKWARD_CONV_WRW, workspace_size, ElementType::Single)
}

/// `250 x 250 x k` for `k = 50 * 2^i`, `i in 0..12`.
pub fn small_growing(workspace_size: usize) -> CacheResult<Vec<Geometry>> {
    let problems: Vec<BasicProblem> = (0..12).map(|i| (250, 250, 50 << i, false, false)).collect();
    from_basic(&problems, LeadingDims::Minimal, workspace_size, ElementType::Single)
}

/// Square problems `100..6400` in steps of 100, each as NN, NT and TN.
pub fn square(workspace_size: usize) -> CacheResult<Vec<Geometry>> {
    let problems: Vec<BasicProblem> = (100..6400)
        .step_by(100)
        .flat_map(|d| [(d, d, d, false, false), (d, d, d, false, true), (d, d, d, true, false)])
        .collect();
    from_basic(&problems, LeadingDims::Minimal, workspace_size, ElementType::Single)
}

fn volume(g: &Geometry) -> u64 {
    (g.m() as u64).saturating_mul(g.n() as u64).saturating_mul(g.k() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_deepbench() {
        let all = deepbench(1).unwrap();
        assert_eq!(all.len(), DEEPBENCH.len());
        assert!(all.iter().all(|g| g.column_major() && !g.transpose_c() && g.workspace_size() == 1));
        let first = &all[0];
        assert_eq!((first.lda(), first.ldb(), first.ldc()), (1760, 1760, 1760));
    }

    #[test]
    fn test_small_large_partition() {
        let threshold = 1760 * 128 * 1760;
        let small = small_deepbench(threshold, 0).unwrap();
        let large = large_deepbench(threshold, 0).unwrap();
        assert_eq!(small.len() + large.len(), DEEPBENCH.len());
        assert!(small.iter().all(|g| volume(g) < threshold));
        assert!(!small.is_empty() && !large.is_empty());
    }

    #[test]
    fn test_backward_conv_strides() {
        let geometries = backward_conv_wrw(0).unwrap();
        assert_eq!(geometries.len(), 24);
        let g = &geometries[0];
        assert_eq!((g.lda(), g.ldb(), g.ldc()), (26939, 26939, 100));
        assert_eq!(g.min_leading_dims(), (26939, 26939, 100));
    }

    #[test]
    fn test_padded_leading_dims() {
        let problems = [(64, 32, 16, false, true)];
        let minimal = from_basic(&problems, LeadingDims::Minimal, 0, ElementType::Single).unwrap();
        let padded = from_basic(&problems, LeadingDims::Padded, 0, ElementType::Single).unwrap();
        assert_eq!(padded[0].lda(), minimal[0].lda() + 5);
        assert_eq!(padded[0].ldb(), minimal[0].ldb() + 7);
        assert_eq!(padded[0].ldc(), minimal[0].ldc() + 13);
        assert_eq!(padded[0].cache_key(), minimal[0].cache_key());
    }

    #[test]
    fn test_sweeps() {
        let growing = small_growing(0).unwrap();
        assert_eq!(growing.len(), 12);
        assert_eq!(growing.last().map(|g| g.k()), Some(102400));

        let squares = square(0).unwrap();
        assert_eq!(squares.len(), 63 * 3);
        let keys: BTreeSet<_> = squares.iter().map(|g| g.cache_key()).collect();
        assert_eq!(keys.len(), squares.len());
    }

    #[test]
    fn test_invalid_strides_rejected() {
        let bad = [(100, 32, 26939, 99, 26939, 100, true, false)];
        assert!(from_strided(&bad, 0, ElementType::Single).is_err());
    }
}
