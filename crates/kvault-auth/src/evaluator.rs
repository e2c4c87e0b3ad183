//! Capability evaluation across a caller's policies.

use std::sync::Arc;

use tracing::trace;

use crate::capability::CapabilitySet;
use crate::constants::MAX_POLICIES_PER_CALLER;
use crate::error::AuthError;
use crate::error::Result;
use crate::policy::Policy;

/// Capabilities granted on `path` by a list of policies.
///
/// Each policy contributes the capabilities of its most specific matching
/// rule. Contributions are unioned. No matching rule anywhere yields the empty
/// set (implicit deny).
pub fn capabilities<'a>(policies: impl IntoIterator<Item = &'a Policy>, path: &str) -> CapabilitySet {
    policies
        .into_iter()
        .filter_map(|policy| policy.capabilities_for(path))
        .fold(CapabilitySet::empty(), CapabilitySet::union)
}

/// The policies attached to one caller.
///
/// Cheap to clone. Evaluation is pure: it reads nothing but the compiled
/// policies and has no side effects.
#[derive(Debug, Clone, Default)]
pub struct PolicySet {
    policies: Vec<Arc<Policy>>,
}

impl PolicySet {
    /// Build a policy set, enforcing the per-caller policy limit.
    pub fn new(policies: Vec<Arc<Policy>>) -> Result<Self> {
        if policies.len() > MAX_POLICIES_PER_CALLER {
            return Err(AuthError::TooManyPolicies {
                count: policies.len(),
                max: MAX_POLICIES_PER_CALLER,
            });
        }
        Ok(Self { policies })
    }

    /// A caller with no policies; every query is denied.
    pub fn deny_all() -> Self {
        Self::default()
    }

    /// Names of the attached policies.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.policies.iter().map(|p| p.name())
    }

    /// Capabilities granted on `path`.
    pub fn capabilities(&self, path: &str) -> CapabilitySet {
        let caps = capabilities(self.policies.iter().map(|p| p.as_ref()), path);
        trace!(path = %path, capabilities = %caps, "evaluated capabilities");
        caps
    }
}

impl From<Policy> for PolicySet {
    fn from(policy: Policy) -> Self {
        Self {
            policies: vec![Arc::new(policy)],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Capability;
    use crate::policy::PolicyDocument;
    use crate::policy::RuleDocument;

    fn policy(name: &str, rules: &[(&str, &[&str])]) -> Policy {
        Policy::try_from(PolicyDocument {
            name: name.into(),
            rules: rules.iter().map(|(path, caps)| RuleDocument::new(*path, caps)).collect(),
        })
        .unwrap()
    }

    #[test]
    fn test_union_across_policies() {
        let a = policy("a", &[("kv/data/*", &["read"])]);
        let b = policy("b", &[("kv/data/secret", &["update"])]);
        let caps = capabilities([&a, &b], "kv/data/secret");
        assert_eq!(caps, CapabilitySet::from([Capability::Read, Capability::Update]));
    }

    #[test]
    fn test_implicit_deny() {
        let a = policy("a", &[("kv/data/*", &["read"])]);
        assert!(capabilities([&a], "kv/metadata/secret").is_empty());
        assert!(PolicySet::deny_all().capabilities("kv/data/secret").is_empty());
    }

    #[test]
    fn test_sub_paths_are_independent() {
        let set = PolicySet::from(policy("p", &[("kv/data/secret", &["update"])]));
        assert!(set.capabilities("kv/data/secret").contains(Capability::Update));
        assert!(set.capabilities("kv/metadata/secret").is_empty());
    }

    #[test]
    fn test_too_many_policies() {
        let p = Arc::new(policy("p", &[]));
        let many = vec![p; MAX_POLICIES_PER_CALLER + 1];
        assert!(matches!(PolicySet::new(many), Err(AuthError::TooManyPolicies { .. })));
    }
}
