//! Resolver configuration.

use crate::catalog::RuleKind;

/// Default maximum number of relation hops in a single field path.
pub const DEFAULT_MAX_RELATION_DEPTH: usize = 6;

/// Resolver configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Maximum number of relation hops (forward or back) in one path.
    pub max_relation_depth: usize,
    /// Which rule of joined collections scopes their rows.
    pub rule: RuleKind,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_relation_depth: DEFAULT_MAX_RELATION_DEPTH,
            rule: RuleKind::List,
        }
    }
}

impl ResolverConfig {
    /// Create a new resolver config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum relation depth.
    pub fn with_max_relation_depth(mut self, depth: usize) -> Self {
        self.max_relation_depth = depth;
        self
    }

    /// Set the rule used to scope joined collections.
    pub fn with_rule(mut self, rule: RuleKind) -> Self {
        self.rule = rule;
        self
    }
}
