//! Secret Store façade tests.
//!
//! Policies mirror the degraded-access setups a KV UI is exercised against:
//! each grants a different mix of sub-path capabilities, and the store must
//! honour exactly what is granted.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use kvault::Access;
use kvault::ConfigUpdate;
use kvault::SecretStore;
use kvault::SecretsError;
use kvault::permissions::METADATA_WRITE_ONLY_WARNING;
use kvault_auth::Capability;
use kvault_auth::Policy;
use kvault_auth::PolicyDocument;
use kvault_auth::PolicySet;
use kvault_auth::RuleDocument;
use kvault_secrets::InMemorySecretsBackend;
use kvault_secrets::SecretsBackend;
use kvault_secrets::kv::KvConfig;
use kvault_secrets::kv::SecretData;
use kvault_secrets::kv::WriteOptions;
use proptest::prelude::*;
use rstest::rstest;

fn policies(rules: &[(&str, &[&str])]) -> PolicySet {
    let doc = PolicyDocument {
        name: "kv-v2-degrade".into(),
        rules: rules.iter().map(|(path, caps)| RuleDocument::new(*path, caps)).collect(),
    };
    PolicySet::from(Policy::try_from(doc).unwrap())
}

fn root(mount: &str) -> PolicySet {
    let pattern = format!("{mount}/*");
    policies(&[(pattern.as_str(), &["create", "read", "update", "delete", "list"])])
}

fn make_store(mount: &str, config: KvConfig) -> SecretStore {
    SecretStore::new(mount, config, Arc::new(InMemorySecretsBackend::new()))
}

fn data(pairs: &[(&str, &str)]) -> SecretData {
    pairs.iter().copied().collect()
}

fn assert_denied(err: SecretsError, policy_path: &str, capability: Capability) {
    match err {
        SecretsError::PermissionDenied {
            path,
            capability: missing,
            ..
        } => {
            assert_eq!(path, policy_path);
            assert_eq!(missing, capability);
        }
        other => panic!("expected permission denied on {policy_path}, got {other}"),
    }
}

// =============================================================================
// Capability Independence
// =============================================================================

#[tokio::test]
async fn test_data_grant_does_not_imply_metadata() {
    let store = make_store("kv-v2", KvConfig::default());
    let caller = policies(&[("kv-v2/data/*", &["create", "read", "update", "delete", "list"])]);

    store.write(&caller, "app", data(&[("foo", "bar")]), WriteOptions::default()).await.unwrap();
    assert!(store.read(&caller, "app", None).await.is_ok());

    assert_denied(store.read_metadata(&caller, "app").await.unwrap_err(), "kv-v2/metadata/app", Capability::Read);
    assert_denied(store.list(&caller, "").await.unwrap_err(), "kv-v2/metadata/", Capability::List);
    assert_denied(
        store.delete_metadata(&caller, "app").await.unwrap_err(),
        "kv-v2/metadata/app",
        Capability::Delete,
    );

    let update = ConfigUpdate {
        max_versions: Some(3),
        ..ConfigUpdate::default()
    };
    assert_denied(
        store.update_config(&caller, "app", update).await.unwrap_err(),
        "kv-v2/metadata/app",
        Capability::Update,
    );
    let entries: BTreeMap<String, String> = [("owner".to_string(), "team".to_string())].into();
    assert_denied(
        store.update_custom_metadata(&caller, "app", entries).await.unwrap_err(),
        "kv-v2/metadata/app",
        Capability::Update,
    );
    assert_denied(
        store.delete_custom_metadata_keys(&caller, "app", &["owner".to_string()]).await.unwrap_err(),
        "kv-v2/metadata/app",
        Capability::Update,
    );

    let meta = store.read_metadata(&root("kv-v2"), "app").await.unwrap();
    assert_eq!(meta.max_versions, 0);
    assert!(meta.custom_metadata.is_empty());
}

#[tokio::test]
async fn test_metadata_grant_does_not_imply_data() {
    let store = make_store("kv-v2", KvConfig::default());
    store.write(&root("kv-v2"), "app", data(&[("foo", "bar")]), WriteOptions::default()).await.unwrap();

    let caller = policies(&[("kv-v2/metadata/*", &["create", "read", "update", "delete", "list"])]);
    let meta = store.read_metadata(&caller, "app").await.unwrap();
    assert_eq!(meta.current_version, 1);
    assert_eq!(store.list(&caller, "").await.unwrap().names(), vec!["app".to_string()]);

    assert_denied(store.read(&caller, "app", None).await.unwrap_err(), "kv-v2/data/app", Capability::Read);
    assert_denied(
        store.write(&caller, "app", data(&[("x", "y")]), WriteOptions::default()).await.unwrap_err(),
        "kv-v2/data/app",
        Capability::Update,
    );
}

const CAPABILITY_NAMES: [&str; 5] = ["create", "read", "update", "delete", "list"];

fn granted(mask: &[bool]) -> Vec<&'static str> {
    CAPABILITY_NAMES.iter().zip(mask).filter(|(_, on)| **on).map(|(name, _)| *name).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn test_sub_path_grants_stay_independent(
        data_mask in proptest::collection::vec(any::<bool>(), 5),
        metadata_mask in proptest::collection::vec(any::<bool>(), 5),
    ) {
        let data_caps = granted(&data_mask);
        let metadata_caps = granted(&metadata_mask);
        let caller = policies(&[
            ("kv-v2/data/*", data_caps.as_slice()),
            ("kv-v2/metadata/*", metadata_caps.as_slice()),
        ]);
        let store = make_store("kv-v2", KvConfig::default());

        let perms = store.effective_permissions(&caller, "app/db").unwrap();
        prop_assert_eq!(perms.can_create, data_mask[0] || data_mask[2]);
        prop_assert_eq!(perms.can_read_data, data_mask[1]);
        prop_assert_eq!(perms.can_update, data_mask[2]);
        prop_assert_eq!(perms.can_soft_delete_latest, data_mask[3]);
        prop_assert_eq!(perms.can_read_metadata, metadata_mask[1]);
        prop_assert_eq!(perms.can_edit_metadata, metadata_mask[0] || metadata_mask[2]);
        prop_assert_eq!(perms.can_destroy_all_versions, metadata_mask[3]);
        prop_assert_eq!(perms.can_list, metadata_mask[4]);
        prop_assert!(!perms.can_soft_delete_versions);
        prop_assert!(!perms.can_undelete);
        prop_assert!(!perms.can_destroy_versions);
    }
}

#[tokio::test]
async fn test_denied_write_mutates_nothing() {
    let store = make_store("kv-v2", KvConfig::default());
    let reader = policies(&[("kv-v2/data/*", &["read"])]);

    let err = store.write(&reader, "app", data(&[("a", "b")]), WriteOptions::default()).await.unwrap_err();
    assert_denied(err, "kv-v2/data/app", Capability::Create);

    let err = store.read(&reader, "app", None).await.unwrap_err();
    assert!(matches!(err, SecretsError::NotFound { .. }));
}

#[tokio::test]
async fn test_update_grant_writes_absent_secret() {
    let store = make_store("kv", KvConfig::default());
    let caller = policies(&[("kv/data/secret", &["update"])]);

    let perms = store.effective_permissions(&caller, "secret").unwrap();
    assert!(perms.can_create);
    assert!(perms.can_update);

    let first = store.write(&caller, "secret", data(&[("k", "v1")]), WriteOptions::default()).await.unwrap();
    assert_eq!(first.version, 1);
    let second = store.write(&caller, "secret", data(&[("k", "v2")]), WriteOptions::default()).await.unwrap();
    assert_eq!(second.version, 2);

    let read = store.read(&root("kv"), "secret", None).await.unwrap();
    assert_eq!(read.data.get("k"), Some("v2"));
}

// =============================================================================
// Concurrent Creation
// =============================================================================

/// In-memory backend that yields to the scheduler before every call.
#[derive(Default)]
struct YieldingBackend {
    inner: InMemorySecretsBackend,
}

#[async_trait]
impl SecretsBackend for YieldingBackend {
    async fn put(&self, key: &str, value: &[u8]) -> kvault_secrets::Result<()> {
        tokio::task::yield_now().await;
        self.inner.put(key, value).await
    }

    async fn get(&self, key: &str) -> kvault_secrets::Result<Option<Vec<u8>>> {
        tokio::task::yield_now().await;
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> kvault_secrets::Result<bool> {
        tokio::task::yield_now().await;
        self.inner.delete(key).await
    }

    async fn list(&self, prefix: &str) -> kvault_secrets::Result<Vec<String>> {
        tokio::task::yield_now().await;
        self.inner.list(prefix).await
    }
}

fn yielding_store(mount: &str) -> SecretStore {
    SecretStore::new(mount, KvConfig::default(), Arc::new(YieldingBackend::default()))
}

#[tokio::test]
async fn test_racing_creates_admit_one_writer() {
    let store = yielding_store("kv");
    let create_only = policies(&[("kv/data/*", &["create"])]);

    let (a, b) = tokio::join!(
        store.write(&create_only, "s", data(&[("k", "a")]), WriteOptions::default()),
        store.write(&create_only, "s", data(&[("k", "b")]), WriteOptions::default()),
    );
    let (won, lost) = match (a, b) {
        (Ok(won), Err(lost)) | (Err(lost), Ok(won)) => (won, lost),
        (a, b) => panic!("expected exactly one create to succeed, got {a:?} and {b:?}"),
    };
    assert_eq!(won.version, 1);
    assert_denied(lost, "kv/data/s", Capability::Update);

    let meta = store.read_metadata(&root("kv"), "s").await.unwrap();
    assert_eq!(meta.current_version, 1);
}

#[tokio::test]
async fn test_racing_config_creates_admit_one_caller() {
    let store = yielding_store("kv");
    let create_only = policies(&[("kv/metadata/*", &["create"])]);
    let update = |max_versions| ConfigUpdate {
        max_versions: Some(max_versions),
        ..ConfigUpdate::default()
    };

    let (a, b) = tokio::join!(
        store.update_config(&create_only, "s", update(3)),
        store.update_config(&create_only, "s", update(7)),
    );
    let (won, lost) = match (a, b) {
        (Ok(won), Err(lost)) | (Err(lost), Ok(won)) => (won, lost),
        (a, b) => panic!("expected exactly one config create to succeed, got {a:?} and {b:?}"),
    };
    assert_denied(lost, "kv/metadata/s", Capability::Update);

    let meta = store.read_metadata(&root("kv"), "s").await.unwrap();
    assert_eq!(meta.max_versions, won.max_versions);
}

// =============================================================================
// Degraded-Access Scenarios
// =============================================================================

#[tokio::test]
async fn test_write_only_metadata_shows_warning() {
    let store = make_store("no-metadata-read", KvConfig::default());
    let caller = policies(&[
        ("no-metadata-read/metadata/*", &["create", "update"]),
        ("no-metadata-read/data/*", &["create", "read", "update"]),
    ]);

    let custom: BTreeMap<String, String> = [("team".to_string(), "core".to_string())].into();
    let options = WriteOptions {
        custom_metadata: Some(custom),
        max_versions: Some(101),
        ..WriteOptions::default()
    };
    store
        .write(&caller, "secret-path", data(&[("secret-key", "secret-value")]), options)
        .await
        .unwrap();

    let read = store.read(&caller, "secret-path", None).await.unwrap();
    assert_eq!(read.data.get("secret-key"), Some("secret-value"));

    assert_denied(
        store.read_metadata(&caller, "secret-path").await.unwrap_err(),
        "no-metadata-read/metadata/secret-path",
        Capability::Read,
    );

    let perms = store.effective_permissions(&caller, "secret-path").unwrap();
    assert_eq!(perms.metadata_access, Access::WriteOnly);
    assert_eq!(perms.metadata_warning(), Some(METADATA_WRITE_ONLY_WARNING));
    assert!(perms.can_edit_metadata);
    assert!(!perms.can_list);
}

#[tokio::test]
async fn test_destroy_policy_permissions() {
    let store = make_store("kv-v2", KvConfig::default());
    let caller = policies(&[
        ("kv-v2/destroy/*", &["update"]),
        ("kv-v2/metadata/*", &["list", "update", "delete"]),
        ("kv-v2/data/secret", &["create", "read", "update"]),
    ]);

    let perms = store.effective_permissions(&caller, "secret").unwrap();
    assert!(perms.can_destroy_versions);
    assert!(perms.can_destroy_all_versions);
    assert!(!perms.can_soft_delete_latest);
    assert!(!perms.can_soft_delete_versions);
    assert!(!perms.can_read_metadata);

    store.write(&caller, "secret", data(&[("foo", "bar")]), WriteOptions::default()).await.unwrap();
    store.destroy(&caller, "secret", vec![1]).await.unwrap();
    let err = store.read(&caller, "secret", Some(1)).await.unwrap_err();
    assert!(matches!(err, SecretsError::NotFound { .. }));

    assert_denied(
        store.soft_delete_latest(&caller, "secret").await.unwrap_err(),
        "kv-v2/data/secret",
        Capability::Delete,
    );
    assert!(store.delete_metadata(&caller, "secret").await.unwrap());
}

#[tokio::test]
async fn test_delete_and_undelete_through_version_endpoints() {
    let store = make_store("kv-v2", KvConfig::default());
    let caller = policies(&[
        ("kv-v2/delete/*", &["update"]),
        ("kv-v2/undelete/*", &["update"]),
        ("kv-v2/metadata/*", &["list", "read", "create", "update"]),
        ("kv-v2/data/secret", &["create", "read"]),
    ]);

    store.write(&caller, "secret", data(&[("foo", "bar")]), WriteOptions::default()).await.unwrap();

    let perms = store.effective_permissions(&caller, "secret").unwrap();
    assert!(!perms.can_soft_delete_latest);
    assert!(perms.can_soft_delete_versions);
    assert!(perms.can_undelete);

    store.soft_delete_versions(&caller, "secret", vec![1]).await.unwrap();
    let err = store.read(&caller, "secret", None).await.unwrap_err();
    assert!(matches!(err, SecretsError::VersionDeleted { version: 1, .. }));

    store.undelete(&caller, "secret", vec![1]).await.unwrap();
    assert!(store.read(&caller, "secret", None).await.is_ok());
}

#[rstest]
#[case::nested_secret("kv-v2", "forward/slash", "kv-v2/delete/forward/slash")]
#[case::slashed_mount("forward/slash", "secret", "forward/slash/delete/secret")]
#[tokio::test]
async fn test_forward_slash_paths(#[case] mount: &str, #[case] path: &str, #[case] delete_rule: &str) {
    let store = make_store(mount, KvConfig::default());
    let data_rule = format!("{mount}/data/*");
    let metadata_rule = format!("{mount}/metadata/*");
    let caller = policies(&[
        (delete_rule, &["update"]),
        (metadata_rule.as_str(), &["list", "read", "create", "update"]),
        (data_rule.as_str(), &["create", "read"]),
    ]);

    store.write(&caller, path, data(&[("foo", "bar")]), WriteOptions::default()).await.unwrap();
    let perms = store.effective_permissions(&caller, path).unwrap();
    assert!(perms.can_soft_delete_versions);
    assert!(perms.can_delete_any());
}

// =============================================================================
// Metadata Operations
// =============================================================================

#[tokio::test]
async fn test_config_update_needs_create_then_update() {
    let store = make_store("kv-v2", KvConfig::default());
    let create_only = policies(&[("kv-v2/metadata/*", &["create"])]);
    let update = ConfigUpdate {
        max_versions: Some(5),
        ..ConfigUpdate::default()
    };

    let meta = store.update_config(&create_only, "app", update.clone()).await.unwrap();
    assert_eq!(meta.max_versions, 5);

    assert_denied(
        store.update_config(&create_only, "app", update).await.unwrap_err(),
        "kv-v2/metadata/app",
        Capability::Update,
    );
}

#[tokio::test]
async fn test_custom_metadata_validation_surfaces_before_commit() {
    let store = make_store("kv-v2", KvConfig::default());
    let caller = root("kv-v2");

    let long_key = "k".repeat(200);
    let entries: BTreeMap<String, String> = [(long_key, "v".to_string())].into();
    let err = store.update_custom_metadata(&caller, "app", entries).await.unwrap_err();
    assert!(err.to_string().starts_with("custom_metadata validation failed: length of key"));
    assert!(err.is_validation());
    assert!(matches!(
        store.read_metadata(&caller, "app").await.unwrap_err(),
        SecretsError::NotFound { .. }
    ));

    let entries: BTreeMap<String, String> = [("owner".to_string(), "team".to_string())].into();
    store.update_custom_metadata(&caller, "app", entries).await.unwrap();
    let meta = store
        .delete_custom_metadata_keys(&caller, "app", &["owner".to_string()])
        .await
        .unwrap();
    assert!(meta.custom_metadata.is_empty());
}

#[tokio::test]
async fn test_percent_encoded_paths() {
    let store = make_store("kv-v2", KvConfig::default());
    let caller = root("kv-v2");

    store.write(&caller, "space%20space", data(&[("k", "v")]), WriteOptions::default()).await.unwrap();
    assert!(store.read(&caller, "space space", None).await.is_ok());
    assert_eq!(store.list(&caller, "").await.unwrap().names(), vec!["space space".to_string()]);
}

#[tokio::test]
async fn test_nested_listing() {
    let store = make_store("kv-v2", KvConfig::default());
    let caller = root("kv-v2");
    for path in ["1/2/3/4", "1/2/other", "1/top"] {
        store.write(&caller, path, data(&[("k", "v")]), WriteOptions::default()).await.unwrap();
    }

    assert_eq!(store.list(&caller, "1/").await.unwrap().names(), vec!["2/".to_string(), "top".to_string()]);
    assert_eq!(store.list(&caller, "1/2/").await.unwrap().names(), vec!["3/".to_string(), "other".to_string()]);
    assert!(store.list(&caller, "missing/").await.unwrap().keys.is_empty());
}

// =============================================================================
// Legacy Mount
// =============================================================================

#[tokio::test]
async fn test_legacy_mount_uses_plain_paths() {
    let store = make_store("kv-v1", KvConfig::v1());
    let caller = policies(&[("kv-v1/*", &["create", "read", "update", "delete", "list"])]);

    store.write(&caller, "app", data(&[("foo", "bar")]), WriteOptions::default()).await.unwrap();
    store.write(&caller, "app", data(&[("foo", "baz")]), WriteOptions::default()).await.unwrap();
    assert_eq!(store.read(&caller, "app", None).await.unwrap().data.get("foo"), Some("baz"));
    assert_eq!(store.list(&caller, "").await.unwrap().names(), vec!["app".to_string()]);

    for err in [
        store.soft_delete_latest(&caller, "app").await.unwrap_err(),
        store.destroy(&caller, "app", vec![1]).await.unwrap_err(),
        store.read_metadata(&caller, "app").await.map(|_| ()).unwrap_err(),
    ] {
        assert!(err.is_validation(), "{err}");
    }

    let perms = store.effective_permissions(&caller, "app").unwrap();
    assert!(perms.can_destroy_all_versions);
    assert!(!perms.can_destroy_versions);

    assert!(store.delete_all_versions(&caller, "app").await.unwrap());
    assert!(matches!(
        store.read(&caller, "app", None).await.unwrap_err(),
        SecretsError::NotFound { .. }
    ));
}
