//! Canonical cache identity of a GEMM problem.

use std::fmt;
use std::str::FromStr;

use crate::error::{CacheError, CacheResult};
use crate::geometry::{ElementType, Geometry};

/// Kernel-relevant projection of a [`Geometry`].
///
/// Leading dimensions, workspace and buffer offsets are dropped: once they
/// satisfy the minimum bound they do not change which kernel is valid.
/// Field order defines the total order (`m, n, k, tA, tB, tC, colMaj, type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CacheKey {
    m: usize,
    n: usize,
    k: usize,
    transpose_a: bool,
    transpose_b: bool,
    transpose_c: bool,
    column_major: bool,
    element_type: ElementType,
}

impl CacheKey {
    pub fn from_geometry(geometry: &Geometry) -> Self {
        CacheKey {
            m: geometry.m(),
            n: geometry.n(),
            k: geometry.k(),
            transpose_a: geometry.transpose_a(),
            transpose_b: geometry.transpose_b(),
            transpose_c: geometry.transpose_c(),
            column_major: geometry.column_major(),
            element_type: geometry.element_type(),
        }
    }

    /// Key of [`Geometry::layout_mirror`].
    pub fn layout_mirror(&self) -> Self {
        CacheKey {
            m: self.n,
            n: self.m,
            k: self.k,
            transpose_a: self.transpose_b,
            transpose_b: self.transpose_a,
            transpose_c: self.transpose_c,
            column_major: !self.column_major,
            element_type: self.element_type,
        }
    }

    /// Key of [`Geometry::output_transposed`].
    pub fn output_transposed(&self) -> Self {
        CacheKey {
            m: self.n,
            n: self.m,
            k: self.k,
            transpose_a: !self.transpose_b,
            transpose_b: !self.transpose_a,
            transpose_c: !self.transpose_c,
            column_major: self.column_major,
            element_type: self.element_type,
        }
    }

    /// Network-config string, e.g. `tC0_tA0_tB1_colMaj1_m64_n64_k64_f32`.
    pub fn network_config(&self) -> String {
        self.to_string()
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

    pub fn transpose_a(&self) -> bool {
        self.transpose_a
    }

    pub fn transpose_b(&self) -> bool {
        self.transpose_b
    }

    pub fn transpose_c(&self) -> bool {
        self.transpose_c
    }

    pub fn column_major(&self) -> bool {
        self.column_major
    }

    pub fn element_type(&self) -> ElementType {
        self.element_type
    }
}

impl From<&Geometry> for CacheKey {
    fn from(geometry: &Geometry) -> Self {
        CacheKey::from_geometry(geometry)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tC{}_tA{}_tB{}_colMaj{}_m{}_n{}_k{}_{}",
            self.transpose_c as u8,
            self.transpose_a as u8,
            self.transpose_b as u8,
            self.column_major as u8,
            self.m,
            self.n,
            self.k,
            self.element_type,
        )
    }
}

impl FromStr for CacheKey {
    type Err = CacheError;

    fn from_str(s: &str) -> CacheResult<Self> {
        const FIELDS: [&str; 7] = ["tC", "tA", "tB", "colMaj", "m", "n", "k"];
        let (values, element_type) = parse_tagged_fields(s, &FIELDS)?;
        if values[4..7].contains(&0) {
            return Err(CacheError::malformed(format!("zero dimension in `{s}`")));
        }
        Ok(CacheKey {
            m: values[4],
            n: values[5],
            k: values[6],
            transpose_a: flag_value(s, values[1])?,
            transpose_b: flag_value(s, values[2])?,
            transpose_c: flag_value(s, values[0])?,
            column_major: flag_value(s, values[3])?,
            element_type,
        })
    }
}

/// Split `prefixA<int>_prefixB<int>_..._<type>` into its integers and element type.
///
/// Fields must appear exactly in `prefixes` order, followed by one element tag.
pub(crate) fn parse_tagged_fields(
    s: &str,
    prefixes: &[&str],
) -> CacheResult<(Vec<usize>, ElementType)> {
    let tokens: Vec<&str> = s.split('_').collect();
    if tokens.len() != prefixes.len() + 1 {
        return Err(CacheError::malformed(format!(
            "expected {} fields in `{s}`, found {}",
            prefixes.len() + 1,
            tokens.len()
        )));
    }
    let mut values = Vec::with_capacity(prefixes.len());
    for (token, prefix) in tokens.iter().zip(prefixes) {
        let digits = token
            .strip_prefix(prefix)
            .ok_or_else(|| CacheError::malformed(format!("expected `{prefix}` field in `{s}`, found `{token}`")))?;
        let value = digits
            .parse::<usize>()
            .map_err(|_| CacheError::malformed(format!("bad `{prefix}` value `{digits}` in `{s}`")))?;
        values.push(value);
    }
    let element_type = tokens[prefixes.len()].parse()?;
    Ok((values, element_type))
}

pub(crate) fn flag_value(s: &str, value: usize) -> CacheResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(CacheError::malformed(format!("flag value {other} in `{s}`"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn geometry(m: usize, n: usize, k: usize) -> Geometry {
        Geometry::packed(m, n, k, false, false, ElementType::Single).unwrap()
    }

    #[test]
    fn test_key_ignores_padding_and_workspace() {
        let g = geometry(64, 64, 64);
        let padded = g.with_leading_dims(128, 96, 80).unwrap().with_workspace(4096);
        assert_eq!(g.cache_key(), padded.cache_key());
        assert_ne!(g.cache_key(), geometry(65, 64, 64).cache_key());
    }

    #[test]
    fn test_key_order_is_lexicographic() {
        let a = geometry(32, 512, 512).cache_key();
        let b = geometry(64, 16, 16).cache_key();
        let c = geometry(64, 16, 32).cache_key();
        assert!(a < b && b < c);

        let nn = Geometry::packed(64, 64, 64, false, false, ElementType::Single).unwrap();
        let nt = Geometry::packed(64, 64, 64, false, true, ElementType::Single).unwrap();
        let tn = Geometry::packed(64, 64, 64, true, false, ElementType::Single).unwrap();
        assert!(nn.cache_key() < nt.cache_key());
        assert!(nt.cache_key() < tn.cache_key());

        let half = Geometry::packed(64, 64, 64, false, false, ElementType::Half).unwrap();
        assert!(half.cache_key() < nn.cache_key());
    }

    #[test]
    fn test_key_usable_in_hashmap() {
        let mut map: HashMap<CacheKey, i32> = HashMap::new();
        let key = geometry(8, 8, 8).cache_key();
        map.insert(key, 42);
        assert_eq!(map.get(&geometry(8, 8, 8).cache_key()), Some(&42));
    }

    #[test]
    fn test_network_config_string() {
        let g = Geometry::packed(64, 64, 64, false, true, ElementType::Single).unwrap();
        let key = g.cache_key();
        assert_eq!(key.network_config(), "tC0_tA0_tB1_colMaj1_m64_n64_k64_f32");
        assert_eq!(key.network_config().parse::<CacheKey>().unwrap(), key);
    }

    #[test]
    fn test_network_config_rejects_garbage() {
        for bad in [
            "",
            "tC0_tA0_tB1_colMaj1_m64_n64_k64",
            "tC0_tA0_tB1_colMaj1_m64_n64_k64_f128",
            "tA0_tC0_tB1_colMaj1_m64_n64_k64_f32",
            "tC2_tA0_tB1_colMaj1_m64_n64_k64_f32",
            "tC0_tA0_tB1_colMaj1_m0_n64_k64_f32",
            "tC0_tA0_tB1_colMaj1_mx_n64_k64_f32",
        ] {
            assert!(bad.parse::<CacheKey>().is_err(), "accepted `{bad}`");
        }
    }

    #[test]
    fn test_mirror_keys_match_geometry_transforms() {
        let g = Geometry::packed(10, 20, 30, false, true, ElementType::Single).unwrap();
        assert_eq!(g.layout_mirror().cache_key(), g.cache_key().layout_mirror());
        assert_eq!(g.output_transposed().cache_key(), g.cache_key().output_transposed());
    }
}
