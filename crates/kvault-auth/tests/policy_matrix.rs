//! Capability evaluation against realistic KV mount policies.

use kvault_auth::Capability;
use kvault_auth::CapabilitySet;
use kvault_auth::Policy;
use kvault_auth::PolicyDocument;
use kvault_auth::PolicySet;
use kvault_auth::RuleDocument;
use proptest::prelude::*;
use rstest::rstest;

fn policy_set(rules: &[(&str, &[&str])]) -> PolicySet {
    let doc = PolicyDocument {
        name: "kv-v2-degrade".into(),
        rules: rules.iter().map(|(path, caps)| RuleDocument::new(*path, caps)).collect(),
    };
    PolicySet::from(Policy::try_from(doc).unwrap())
}

fn caps(names: &[Capability]) -> CapabilitySet {
    names.iter().copied().collect()
}

// =============================================================================
// Degraded-access policies
// =============================================================================

#[rstest]
#[case::data_exact("kv-v2/data/secret", &[Capability::Create, Capability::Read, Capability::Update])]
#[case::metadata_glob("kv-v2/metadata/secret", &[Capability::List])]
#[case::other_data_denied("kv-v2/data/other", &[])]
#[case::destroy_denied("kv-v2/destroy/secret", &[])]
fn test_restricted_metadata_policy(#[case] path: &str, #[case] expected: &[Capability]) {
    let set = policy_set(&[
        ("kv-v2/metadata/*", &["list"]),
        ("kv-v2/data/secret", &["create", "read", "update"]),
    ]);
    assert_eq!(set.capabilities(path), caps(expected), "{path}");
}

#[rstest]
#[case::destroy("kv-v2/destroy/secret", &[Capability::Update])]
#[case::metadata("kv-v2/metadata/secret", &[Capability::Update, Capability::Delete, Capability::List])]
#[case::delete_denied("kv-v2/delete/secret", &[])]
fn test_destroy_policy(#[case] path: &str, #[case] expected: &[Capability]) {
    let set = policy_set(&[
        ("kv-v2/destroy/*", &["update"]),
        ("kv-v2/metadata/*", &["list", "update", "delete"]),
        ("kv-v2/data/secret", &["create", "read", "update"]),
    ]);
    assert_eq!(set.capabilities(path), caps(expected), "{path}");
}

#[test]
fn test_mount_with_slash_in_name() {
    let set = policy_set(&[
        ("forward/slash/delete/secret", &["update"]),
        ("forward/slash/metadata/*", &["list", "read", "create", "update"]),
        ("forward/slash/data/*", &["create", "read"]),
    ]);
    assert!(set.capabilities("forward/slash/delete/secret").contains(Capability::Update));
    assert!(set.capabilities("forward/slash/delete/other").is_empty());
    assert!(set.capabilities("forward/slash/data/secret").contains(Capability::Read));
}

#[test]
fn test_segment_wildcards_write_only() {
    let set = policy_set(&[
        ("write-only/+/+", &["create", "update", "list"]),
        ("write-only/metadata/+", &["read"]),
        ("write-only/+", &["list"]),
    ]);
    assert_eq!(
        set.capabilities("write-only/data/secret"),
        caps(&[Capability::Create, Capability::Update, Capability::List])
    );
    assert_eq!(set.capabilities("write-only/metadata/secret"), caps(&[Capability::Read]));
    assert_eq!(set.capabilities("write-only/data"), caps(&[Capability::List]));
    assert!(set.capabilities("write-only/data/nested/secret").is_empty());
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// The rule with the longest literal prefix decides, whatever order the
    /// rules were written in.
    #[test]
    fn prop_longest_prefix_wins(
        segments in prop::collection::vec("[a-z]{1,6}", 2..6),
        reverse in any::<bool>(),
    ) {
        let path = segments.join("/");
        let mut rules: Vec<(String, Vec<&str>)> = Vec::new();
        for depth in 1..segments.len() {
            let prefix = segments[..depth].join("/");
            let cap = if depth % 2 == 0 { "read" } else { "list" };
            rules.push((format!("{prefix}/*"), vec![cap]));
        }
        if reverse {
            rules.reverse();
        }
        let doc = PolicyDocument {
            name: "p".into(),
            rules: rules.iter().map(|(p, c)| RuleDocument::new(p.clone(), c)).collect(),
        };
        let set = PolicySet::from(Policy::try_from(doc).unwrap());

        let deepest = segments.len() - 1;
        let expected = if deepest % 2 == 0 { Capability::Read } else { Capability::List };
        prop_assert_eq!(set.capabilities(&path), caps(&[expected]));
    }

    /// An exact rule always beats any glob covering the same path.
    #[test]
    fn prop_exact_beats_glob(segments in prop::collection::vec("[a-z]{1,6}", 1..5)) {
        let path = segments.join("/");
        let set = policy_set(&[("*", &["list"]), (path.as_str(), &["delete"])]);
        prop_assert_eq!(set.capabilities(&path), caps(&[Capability::Delete]));
    }
}
