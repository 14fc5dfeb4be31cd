//! GEMM problem geometry.
//!
//! A [`Geometry`] describes one `C = alpha * op(A) * op(B) + beta * C` problem:
//! dimensions, transpose flags, leading dimensions, storage order, element
//! type and the scratch budget granted to the solver. Construction validates
//! that every leading dimension can address its matrix without overlap, so a
//! `Geometry` value is always well-formed.

use std::fmt;
use std::str::FromStr;

use crate::cache_key::{self, CacheKey};
use crate::error::{CacheError, CacheResult};

/// Floating-point type of A, B and C.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ElementType {
    Half,
    Single,
    Double,
}

impl ElementType {
    /// Size of one element in bytes.
    pub fn size_bytes(self) -> usize {
        match self {
            ElementType::Half => std::mem::size_of::<half::f16>(),
            ElementType::Single => std::mem::size_of::<f32>(),
            ElementType::Double => std::mem::size_of::<f64>(),
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            ElementType::Half => "f16",
            ElementType::Single => "f32",
            ElementType::Double => "f64",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for ElementType {
    type Err = CacheError;

    fn from_str(s: &str) -> CacheResult<Self> {
        match s {
            "f16" | "h" => Ok(ElementType::Half),
            "f32" | "f" => Ok(ElementType::Single),
            "f64" | "d" => Ok(ElementType::Double),
            other => Err(CacheError::malformed(format!("unknown element type `{other}`"))),
        }
    }
}

/// Validated GEMM problem shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Geometry {
    column_major: bool,
    transpose_a: bool,
    transpose_b: bool,
    transpose_c: bool,
    lda: usize,
    ldb: usize,
    ldc: usize,
    m: usize,
    n: usize,
    k: usize,
    workspace_size: usize,
    element_type: ElementType,
}

impl Geometry {
    /// Build a geometry from explicit field values.
    ///
    /// Fails with [`CacheError::InvalidGeometry`] if any of `m`, `n`, `k` is
    /// zero or a leading dimension is below [`min_leading_dims`](Self::min_leading_dims).
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        column_major: bool,
        transpose_a: bool,
        transpose_b: bool,
        transpose_c: bool,
        lda: usize,
        ldb: usize,
        ldc: usize,
        m: usize,
        n: usize,
        k: usize,
        workspace_size: usize,
        element_type: ElementType,
    ) -> CacheResult<Self> {
        if m == 0 || n == 0 || k == 0 {
            return Err(CacheError::InvalidGeometry(format!(
                "zero dimension in m={m} n={n} k={k}"
            )));
        }
        let geometry = Geometry {
            column_major,
            transpose_a,
            transpose_b,
            transpose_c,
            lda,
            ldb,
            ldc,
            m,
            n,
            k,
            workspace_size,
            element_type,
        };
        let (lda_min, ldb_min, ldc_min) = geometry.min_leading_dims();
        for (name, ld, min) in [("lda", lda, lda_min), ("ldb", ldb, ldb_min), ("ldc", ldc, ldc_min)] {
            if ld < min {
                return Err(CacheError::InvalidGeometry(format!(
                    "{name}={ld} below minimum {min} for m={m} n={n} k={k} tA={} tB={} tC={} colMaj={}",
                    transpose_a as u8, transpose_b as u8, transpose_c as u8, column_major as u8,
                )));
            }
        }
        Ok(geometry)
    }

    /// Column-major geometry with tightly packed operands and no transposed output.
    pub fn packed(
        m: usize,
        n: usize,
        k: usize,
        transpose_a: bool,
        transpose_b: bool,
        element_type: ElementType,
    ) -> CacheResult<Self> {
        let (lda, ldb, ldc) = min_leading_dims(true, transpose_a, transpose_b, false, m, n, k);
        Self::new(true, transpose_a, transpose_b, false, lda, ldb, ldc, m, n, k, 0, element_type)
    }

    /// Same problem with different leading dimensions.
    pub fn with_leading_dims(&self, lda: usize, ldb: usize, ldc: usize) -> CacheResult<Self> {
        Self::new(
            self.column_major,
            self.transpose_a,
            self.transpose_b,
            self.transpose_c,
            lda,
            ldb,
            ldc,
            self.m,
            self.n,
            self.k,
            self.workspace_size,
            self.element_type,
        )
    }

    /// Same problem with a different solver scratch budget.
    pub fn with_workspace(mut self, workspace_size: usize) -> Self {
        self.workspace_size = workspace_size;
        self
    }

    /// Minimum `(lda, ldb, ldc)` that addresses each matrix without overlap.
    pub fn min_leading_dims(&self) -> (usize, usize, usize) {
        min_leading_dims(
            self.column_major,
            self.transpose_a,
            self.transpose_b,
            self.transpose_c,
            self.m,
            self.n,
            self.k,
        )
    }

    /// The same computation expressed in the opposite storage order.
    ///
    /// A row-major matrix is the column-major storage of its transpose, so
    /// `C = op(A) op(B)` becomes `Cᵀ = op(B)ᵀ op(A)ᵀ` with the operand roles
    /// (and their leading dimensions) exchanged.
    pub fn layout_mirror(&self) -> Self {
        Geometry {
            column_major: !self.column_major,
            transpose_a: self.transpose_b,
            transpose_b: self.transpose_a,
            transpose_c: self.transpose_c,
            lda: self.ldb,
            ldb: self.lda,
            ldc: self.ldc,
            m: self.n,
            n: self.m,
            k: self.k,
            workspace_size: self.workspace_size,
            element_type: self.element_type,
        }
    }

    /// The same computation writing `Cᵀ` in the same storage order.
    pub fn output_transposed(&self) -> Self {
        Geometry {
            column_major: self.column_major,
            transpose_a: !self.transpose_b,
            transpose_b: !self.transpose_a,
            transpose_c: !self.transpose_c,
            lda: self.ldb,
            ldb: self.lda,
            ldc: self.ldc,
            m: self.n,
            n: self.m,
            k: self.k,
            workspace_size: self.workspace_size,
            element_type: self.element_type,
        }
    }

    pub fn cache_key(&self) -> CacheKey {
        CacheKey::from_geometry(self)
    }

    /// Floating-point operations of one GEMM call (`2mnk`), saturating at
    /// `u64::MAX`.
    pub fn flops(&self) -> u64 {
        2u64
            .saturating_mul(self.m as u64)
            .saturating_mul(self.n as u64)
            .saturating_mul(self.k as u64)
    }

    pub fn column_major(&self) -> bool {
        self.column_major
    }

    pub fn transpose_a(&self) -> bool {
        self.transpose_a
    }

    pub fn transpose_b(&self) -> bool {
        self.transpose_b
    }

    pub fn transpose_c(&self) -> bool {
        self.transpose_c
    }

    pub fn lda(&self) -> usize {
        self.lda
    }

    pub fn ldb(&self) -> usize {
        self.ldb
    }

    pub fn ldc(&self) -> usize {
        self.ldc
    }

    pub fn m(&self) -> usize {
        self.m
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn workspace_size(&self) -> usize {
        self.workspace_size
    }

    pub fn element_type(&self) -> ElementType {
        self.element_type
    }
}

/// Minimum leading dimensions for the given flags.
///
/// In column-major storage a non-transposed A (m x k) needs `lda >= m` and a
/// transposed one `lda >= k`; row-major storage swaps the two cases.
pub fn min_leading_dims(
    column_major: bool,
    transpose_a: bool,
    transpose_b: bool,
    transpose_c: bool,
    m: usize,
    n: usize,
    k: usize,
) -> (usize, usize, usize) {
    let lda = if transpose_a == column_major { k } else { m };
    let ldb = if transpose_b == column_major { n } else { k };
    let ldc = if transpose_c == column_major { n } else { m };
    (lda, ldb, ldc)
}

/// Renders the full geometry string, e.g.
/// `tC0_tA0_tB1_colMaj1_m64_n64_k64_lda64_ldb64_ldc64_ws0_f32`.
impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tC{}_tA{}_tB{}_colMaj{}_m{}_n{}_k{}_lda{}_ldb{}_ldc{}_ws{}_{}",
            self.transpose_c as u8,
            self.transpose_a as u8,
            self.transpose_b as u8,
            self.column_major as u8,
            self.m,
            self.n,
            self.k,
            self.lda,
            self.ldb,
            self.ldc,
            self.workspace_size,
            self.element_type,
        )
    }
}

impl FromStr for Geometry {
    type Err = CacheError;

    fn from_str(s: &str) -> CacheResult<Self> {
        const FIELDS: [&str; 11] = [
            "tC", "tA", "tB", "colMaj", "m", "n", "k", "lda", "ldb", "ldc", "ws",
        ];
        let (values, element_type) = cache_key::parse_tagged_fields(s, &FIELDS)?;
        let flag = |v: usize| cache_key::flag_value(s, v);
        Geometry::new(
            flag(values[3])?,
            flag(values[1])?,
            flag(values[2])?,
            flag(values[0])?,
            values[7],
            values[8],
            values[9],
            values[4],
            values[5],
            values[6],
            values[10],
            element_type,
        )
        .map_err(|e| CacheError::malformed(format!("geometry `{s}`: {e}")))
    }
}
