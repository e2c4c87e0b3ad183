//! Named policies and their compiled rule index.
//!
//! A [`PolicyDocument`] is the serde form an external collaborator hands us:
//! a name plus `(path-pattern, capabilities)` rules. Compiling it into a
//! [`Policy`] validates the rules and builds an index so that finding the
//! most specific matching rule does not scan every rule.

use std::collections::BTreeMap;
use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;

use crate::capability::Capability;
use crate::capability::CapabilitySet;
use crate::constants::MAX_POLICY_NAME_LENGTH;
use crate::constants::MAX_RULES_PER_POLICY;
use crate::error::AuthError;
use crate::error::Result;
use crate::pattern::PathPattern;
use crate::pattern::Specificity;

/// One rule as written in a policy document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDocument {
    /// Path pattern (exact, `prefix*`, or with `+` segments).
    pub path: String,
    /// Capability names granted on matching paths.
    pub capabilities: Vec<String>,
}

impl RuleDocument {
    /// Create a rule from string slices.
    pub fn new(path: impl Into<String>, capabilities: &[&str]) -> Self {
        Self {
            path: path.into(),
            capabilities: capabilities.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// A policy as written by an operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDocument {
    /// Unique policy name.
    pub name: String,
    /// Path rules.
    #[serde(default)]
    pub rules: Vec<RuleDocument>,
}

/// A compiled rule.
#[derive(Debug, Clone)]
pub struct PathRule {
    /// Compiled pattern.
    pub pattern: PathPattern,
    /// Capabilities granted on matching paths.
    pub capabilities: CapabilitySet,
}

/// A `prefix*` rule together with its precomputed ranking.
#[derive(Debug, Clone)]
struct PrefixRule {
    capabilities: CapabilitySet,
    specificity: Specificity,
}

/// A compiled, immutable policy.
///
/// Rules are indexed three ways:
/// - exact patterns in a hash map
/// - plain `prefix*` patterns in an ordered map keyed by prefix
/// - `+` segment patterns in a list pre-sorted from most to least specific
#[derive(Debug, Clone)]
pub struct Policy {
    name: String,
    exact: HashMap<String, CapabilitySet>,
    prefixes: BTreeMap<String, PrefixRule>,
    segment_rules: Vec<PathRule>,
    rule_count: usize,
}

impl Policy {
    /// Compile a policy from already-parsed rules.
    ///
    /// Rules with identical patterns are merged by unioning their capabilities.
    pub fn new(name: impl Into<String>, rules: Vec<PathRule>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() || name.len() > MAX_POLICY_NAME_LENGTH {
            return Err(AuthError::InvalidPolicyName {
                name,
                max: MAX_POLICY_NAME_LENGTH,
            });
        }
        if rules.len() > MAX_RULES_PER_POLICY {
            return Err(AuthError::TooManyRules {
                policy: name,
                count: rules.len(),
                max: MAX_RULES_PER_POLICY,
            });
        }

        let rule_count = rules.len();
        let mut exact: HashMap<String, CapabilitySet> = HashMap::new();
        let mut prefixes: BTreeMap<String, PrefixRule> = BTreeMap::new();
        let mut segments: BTreeMap<String, PathRule> = BTreeMap::new();

        for rule in rules {
            if rule.pattern.is_exact() {
                let entry = exact.entry(rule.pattern.as_str().to_string()).or_default();
                *entry = entry.union(rule.capabilities);
            } else if let Some(prefix) = rule.pattern.glob_prefix() {
                let entry = prefixes.entry(prefix.to_string()).or_insert_with(|| PrefixRule {
                    capabilities: CapabilitySet::empty(),
                    specificity: rule.pattern.specificity(),
                });
                entry.capabilities = entry.capabilities.union(rule.capabilities);
            } else {
                let caps = rule.capabilities;
                segments
                    .entry(rule.pattern.as_str().to_string())
                    .and_modify(|existing| existing.capabilities = existing.capabilities.union(caps))
                    .or_insert(rule);
            }
        }

        let mut segment_rules: Vec<PathRule> = segments.into_values().collect();
        segment_rules.sort_by_key(|rule| std::cmp::Reverse(rule.pattern.specificity()));

        Ok(Self {
            name,
            exact,
            prefixes,
            segment_rules,
            rule_count,
        })
    }

    /// Policy name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of rules the policy was compiled from.
    pub fn rule_count(&self) -> usize {
        self.rule_count
    }

    /// Capabilities granted by the most specific rule matching `path`.
    ///
    /// Returns `None` when no rule matches, which is distinct from a matching
    /// rule that grants nothing.
    pub fn capabilities_for(&self, path: &str) -> Option<CapabilitySet> {
        if let Some(caps) = self.exact.get(path) {
            return Some(*caps);
        }

        let prefix_hit = self.longest_prefix_match(path);
        let segment_hit = self.segment_rules.iter().find(|rule| rule.pattern.matches(path));

        match (prefix_hit, segment_hit) {
            (None, None) => None,
            (Some(prefix), None) => Some(prefix.capabilities),
            (None, Some(rule)) => Some(rule.capabilities),
            (Some(prefix), Some(rule)) if prefix.specificity > rule.pattern.specificity() => Some(prefix.capabilities),
            (Some(_), Some(rule)) => Some(rule.capabilities),
        }
    }

    /// Walk candidate prefixes of `path` from longest to shortest.
    fn longest_prefix_match(&self, path: &str) -> Option<&PrefixRule> {
        if self.prefixes.is_empty() {
            return None;
        }
        let mut end = path.len();
        loop {
            if path.is_char_boundary(end)
                && let Some(rule) = self.prefixes.get(&path[..end])
            {
                return Some(rule);
            }
            if end == 0 {
                return None;
            }
            end -= 1;
        }
    }
}

impl TryFrom<PolicyDocument> for Policy {
    type Error = AuthError;

    fn try_from(doc: PolicyDocument) -> Result<Self> {
        let rules = doc
            .rules
            .iter()
            .map(|rule| {
                let pattern = PathPattern::parse(&rule.path)?;
                let capabilities = rule
                    .capabilities
                    .iter()
                    .map(|name| name.parse::<Capability>())
                    .collect::<Result<CapabilitySet>>()?;
                Ok(PathRule { pattern, capabilities })
            })
            .collect::<Result<Vec<_>>>()?;
        Policy::new(doc.name, rules)
    }
}
