//! Derivability graph.
//!
//! Edge `A -> B` means a solution cached at `A` can serve a query keyed `B`.
//! Edges are never stored: they are evaluated on demand from a closed set of
//! [`DerivationRule`]s over the registered nodes. A chain `A -> B -> C` does
//! not imply `A -> C`; every edge is a single rule firing.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::RwLock;

use crate::cache_key::CacheKey;

/// One sound transformation under which a cached kernel stays valid.
///
/// Implementations must be total: a rule that does not apply returns `false`.
/// Numeric closeness of two shapes must never make a rule fire.
pub trait DerivationRule: Send + Sync {
    fn name(&self) -> &'static str;

    fn derives(&self, cached: &CacheKey, query: &CacheKey) -> bool;

    /// Shape the cached kernel runs as when this rule serves a query with it.
    ///
    /// Built-in rules relabel operands, so the result equals the query they
    /// derive. Rules that tolerate a shape change keep the cached shape.
    fn served_as(&self, cached: &CacheKey) -> CacheKey {
        *cached
    }
}

/// Identical keys. Leading-dimension padding above the minimum is already
/// projected out of the key, and kernels address rows and columns by stride.
#[derive(Debug, Clone, Copy, Default)]
pub struct PaddingRule;

impl DerivationRule for PaddingRule {
    fn name(&self) -> &'static str {
        "padding"
    }

    fn derives(&self, cached: &CacheKey, query: &CacheKey) -> bool {
        cached == query
    }
}

/// Row-major/column-major transpose identity: the kernel runs with A and B
/// relabeled.
#[derive(Debug, Clone, Copy, Default)]
pub struct LayoutMirrorRule;

impl DerivationRule for LayoutMirrorRule {
    fn name(&self) -> &'static str {
        "layout-mirror"
    }

    fn derives(&self, cached: &CacheKey, query: &CacheKey) -> bool {
        cached.layout_mirror() == *query
    }

    fn served_as(&self, cached: &CacheKey) -> CacheKey {
        cached.layout_mirror()
    }
}

/// `Cᵀ = op(B)ᵀ op(A)ᵀ`: a kernel writing C serves the transposed-output
/// problem with operands swapped and their transpose flags inverted.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputTransposeRule;

impl DerivationRule for OutputTransposeRule {
    fn name(&self) -> &'static str {
        "output-transpose"
    }

    fn derives(&self, cached: &CacheKey, query: &CacheKey) -> bool {
        cached.output_transposed() == *query
    }

    fn served_as(&self, cached: &CacheKey) -> CacheKey {
        cached.output_transposed()
    }
}

pub fn default_rules() -> Vec<Box<dyn DerivationRule>> {
    vec![
        Box::new(PaddingRule),
        Box::new(LayoutMirrorRule),
        Box::new(OutputTransposeRule),
    ]
}

pub struct DerivabilityGraph {
    rules: Vec<Box<dyn DerivationRule>>,
    nodes: RwLock<BTreeSet<CacheKey>>,
}

impl DerivabilityGraph {
    /// Graph evaluating the built-in rule set.
    pub fn new() -> Self {
        Self::with_rules(default_rules())
    }

    pub fn with_rules(rules: Vec<Box<dyn DerivationRule>>) -> Self {
        DerivabilityGraph {
            rules,
            nodes: RwLock::new(BTreeSet::new()),
        }
    }

    /// Adds `rule` to the set evaluated by [`is_derivable`](Self::is_derivable).
    pub fn push_rule(&mut self, rule: Box<dyn DerivationRule>) {
        self.rules.push(rule);
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Whether a solution cached at `cached` may execute a query keyed `query`.
    pub fn is_derivable(&self, cached: &CacheKey, query: &CacheKey) -> bool {
        self.matching_rule(cached, query).is_some()
    }

    /// Name of the first rule deriving `query` from `cached`.
    pub fn matching_rule(&self, cached: &CacheKey, query: &CacheKey) -> Option<&'static str> {
        self.rules
            .iter()
            .find(|rule| rule.derives(cached, query))
            .map(|rule| rule.name())
    }

    /// Every shape `cached` can run as to serve `query`, one per firing rule.
    pub fn served_shapes<'a>(
        &'a self,
        cached: &'a CacheKey,
        query: &'a CacheKey,
    ) -> impl Iterator<Item = CacheKey> + 'a {
        self.rules
            .iter()
            .filter(move |rule| rule.derives(cached, query))
            .map(move |rule| rule.served_as(cached))
    }

    /// Registers a node. Returns `true` if the key was new.
    pub fn register(&self, key: CacheKey) -> bool {
        let mut nodes = self.nodes.write().unwrap_or_else(|e| e.into_inner());
        let added = nodes.insert(key);
        if added {
            log::debug!("Derivability graph: registered {key}");
        }
        added
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.nodes
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(key)
    }

    /// All registered keys with an edge into `query`. Linear in the node count.
    pub fn neighbors_into(&self, query: &CacheKey) -> BTreeSet<CacheKey> {
        let nodes = self.nodes.read().unwrap_or_else(|e| e.into_inner());
        nodes
            .iter()
            .filter(|node| self.is_derivable(node, query))
            .copied()
            .collect()
    }

    pub fn nodes(&self) -> Vec<CacheKey> {
        self.nodes
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .copied()
            .collect()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Default for DerivabilityGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DerivabilityGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivabilityGraph")
            .field("rules", &self.rule_names())
            .field("nodes", &self.node_count())
            .finish()
    }
}
