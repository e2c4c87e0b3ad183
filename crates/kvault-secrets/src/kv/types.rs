//! KV secrets engine types.
//!
//! Data structures for versioned secret storage, following HashiCorp Vault patterns.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::access::AccessCheck;
use crate::constants::DEFAULT_MAX_VERSIONS;
use crate::path::ListPrefix;
use crate::path::SecretPath;

/// Secret data stored in KV.
///
/// This is the actual secret content stored at each version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretData {
    /// Key-value pairs making up the secret, in key order.
    pub data: BTreeMap<String, String>,
}

impl SecretData {
    /// Create new secret data from a map.
    pub fn new(data: BTreeMap<String, String>) -> Self {
        Self { data }
    }

    /// Create empty secret data.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Get a value by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(|s| s.as_str())
    }

    /// Insert a key-value pair.
    pub fn insert(&mut self, key: String, value: String) {
        self.data.insert(key, value);
    }

    /// Get the total size in bytes (approximate).
    pub fn size_bytes(&self) -> usize {
        self.data.iter().map(|(k, v)| k.len() + v.len()).sum()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SecretData {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            data: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Lifecycle state of one version.
///
/// `Destroyed` and `Pruned` are terminal: every transition method returns
/// them unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VersionState {
    /// Readable. A scheduled deletion time, once reached, makes the version
    /// read as soft-deleted.
    Active {
        /// Scheduled deletion time (from `delete_version_after`).
        deletion_time_unix_ms: Option<u64>,
    },
    /// Soft-deleted; payload retained, can be undeleted.
    Deleted {
        /// When the version was deleted.
        deletion_time_unix_ms: u64,
    },
    /// Payload erased by an explicit destroy.
    Destroyed {
        /// When the version was destroyed.
        destroyed_time_unix_ms: u64,
    },
    /// Payload erased because the secret exceeded `max_versions`.
    Pruned {
        /// When the version was pruned.
        pruned_time_unix_ms: u64,
    },
}

/// What a reader sees when it looks at a version at a given time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionStatus {
    /// Payload can be returned.
    Readable,
    /// Soft-deleted (explicitly or by schedule) at the given time.
    Deleted {
        /// Effective deletion time.
        deletion_time_unix_ms: u64,
    },
    /// Payload is gone for good.
    Erased,
}

impl VersionState {
    /// Returns true for states nothing can leave.
    pub fn is_terminal(&self) -> bool {
        matches!(self, VersionState::Destroyed { .. } | VersionState::Pruned { .. })
    }

    /// Evaluate the state at `now_unix_ms`.
    pub fn status(&self, now_unix_ms: u64) -> VersionStatus {
        match *self {
            VersionState::Active {
                deletion_time_unix_ms: Some(at),
            } if at <= now_unix_ms => VersionStatus::Deleted {
                deletion_time_unix_ms: at,
            },
            VersionState::Active { .. } => VersionStatus::Readable,
            VersionState::Deleted { deletion_time_unix_ms } => VersionStatus::Deleted { deletion_time_unix_ms },
            VersionState::Destroyed { .. } | VersionState::Pruned { .. } => VersionStatus::Erased,
        }
    }

    /// Soft delete. Idempotent; terminal states are unchanged.
    #[must_use]
    pub fn soft_delete(self, now_unix_ms: u64) -> Self {
        match self.status(now_unix_ms) {
            VersionStatus::Readable => VersionState::Deleted {
                deletion_time_unix_ms: now_unix_ms,
            },
            VersionStatus::Deleted { deletion_time_unix_ms } => VersionState::Deleted { deletion_time_unix_ms },
            VersionStatus::Erased => self,
        }
    }

    /// Undo a soft delete.
    ///
    /// Returns `None` for terminal states. A version that is not deleted is
    /// returned unchanged, keeping any scheduled deletion.
    pub fn undelete(self, now_unix_ms: u64) -> Option<Self> {
        match self.status(now_unix_ms) {
            VersionStatus::Erased => None,
            VersionStatus::Readable => Some(self),
            VersionStatus::Deleted { .. } => Some(VersionState::Active {
                deletion_time_unix_ms: None,
            }),
        }
    }

    /// Permanently destroy. Idempotent; terminal states are unchanged.
    #[must_use]
    pub fn destroy(self, now_unix_ms: u64) -> Self {
        if self.is_terminal() {
            self
        } else {
            VersionState::Destroyed {
                destroyed_time_unix_ms: now_unix_ms,
            }
        }
    }

    /// Prune out of the retention window. Terminal states are unchanged.
    #[must_use]
    pub fn prune(self, now_unix_ms: u64) -> Self {
        if self.is_terminal() {
            self
        } else {
            VersionState::Pruned {
                pruned_time_unix_ms: now_unix_ms,
            }
        }
    }
}

/// Metadata for a specific version of a secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionMetadata {
    /// Version number (1-indexed).
    pub version: u64,
    /// Unix timestamp when this version was created.
    pub created_time_unix_ms: u64,
    /// Lifecycle state.
    pub state: VersionState,
}

impl VersionMetadata {
    /// Create metadata for a new version.
    pub fn new(version: u64, created_time_unix_ms: u64, deletion_time_unix_ms: Option<u64>) -> Self {
        Self {
            version,
            created_time_unix_ms,
            state: VersionState::Active { deletion_time_unix_ms },
        }
    }

    /// Deletion time, scheduled or actual.
    pub fn deletion_time_unix_ms(&self) -> Option<u64> {
        match self.state {
            VersionState::Active { deletion_time_unix_ms } => deletion_time_unix_ms,
            VersionState::Deleted { deletion_time_unix_ms } => Some(deletion_time_unix_ms),
            VersionState::Destroyed { .. } | VersionState::Pruned { .. } => None,
        }
    }

    /// Whether the payload has been erased (destroyed or pruned).
    pub fn destroyed(&self) -> bool {
        self.state.is_terminal()
    }
}

/// Metadata for a secret path (across all versions).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretMetadata {
    /// Highest version that is neither destroyed nor pruned (0 if none).
    pub current_version: u64,
    /// Lowest version that is neither destroyed nor pruned (0 if none).
    pub oldest_version: u64,
    /// Unix timestamp when this secret was first created.
    pub created_time_unix_ms: u64,
    /// Unix timestamp when this secret was last updated.
    pub updated_time_unix_ms: u64,
    /// Maximum number of versions to keep (0 = use engine default).
    pub max_versions: u32,
    /// Whether CAS is required for writes to this secret.
    pub cas_required: bool,
    /// Delay after which new versions are deleted. `None` follows the mount
    /// config; zero disables deletion for this secret.
    pub delete_version_after: Option<Duration>,
    /// Custom metadata (user-defined key-value pairs).
    pub custom_metadata: BTreeMap<String, String>,
    /// Version history, including destroyed and pruned markers.
    pub versions: BTreeMap<u64, VersionMetadata>,
}

impl SecretMetadata {
    /// Create new metadata for a secret.
    pub fn new(created_time_unix_ms: u64) -> Self {
        Self {
            current_version: 0,
            oldest_version: 0,
            created_time_unix_ms,
            updated_time_unix_ms: created_time_unix_ms,
            max_versions: 0,
            cas_required: false,
            delete_version_after: None,
            custom_metadata: BTreeMap::new(),
            versions: BTreeMap::new(),
        }
    }

    /// Get metadata for a specific version.
    pub fn version(&self, version: u64) -> Option<&VersionMetadata> {
        self.versions.get(&version)
    }

    /// Get mutable metadata for a specific version.
    pub fn version_mut(&mut self, version: u64) -> Option<&mut VersionMetadata> {
        self.versions.get_mut(&version)
    }

    /// Record a newly written version.
    pub fn push_version(&mut self, version: VersionMetadata) {
        self.updated_time_unix_ms = version.created_time_unix_ms;
        self.versions.insert(version.version, version);
        self.refresh_pointers();
    }

    /// Recompute `current_version` and `oldest_version` from the history.
    pub fn refresh_pointers(&mut self) {
        let mut live = self.versions.values().filter(|v| !v.destroyed()).map(|v| v.version);
        let oldest = live.next();
        let current = live.next_back().or(oldest);
        self.oldest_version = oldest.unwrap_or(0);
        self.current_version = current.unwrap_or(0);
    }

    /// Effective retention limit under the engine config.
    pub fn effective_max_versions(&self, config: &KvConfig) -> u32 {
        match config.version {
            KvVersion::V1 => 1,
            KvVersion::V2 if self.max_versions > 0 => self.max_versions,
            KvVersion::V2 => config.max_versions.max(1),
        }
    }

    /// Effective automatic deletion delay under the engine config.
    pub fn effective_delete_version_after(&self, config: &KvConfig) -> Duration {
        self.delete_version_after.unwrap_or(config.delete_version_after)
    }

    /// Prune the oldest non-erased versions beyond `max_versions`.
    ///
    /// Pruned versions keep a history marker. Returns the pruned version
    /// numbers; the caller erases their payloads.
    pub fn prune_versions(&mut self, max_versions: u32, now_unix_ms: u64) -> Vec<u64> {
        let live: Vec<u64> = self.versions.values().filter(|v| !v.destroyed()).map(|v| v.version).collect();
        let max_versions = max_versions.max(1) as usize;
        if live.len() <= max_versions {
            return vec![];
        }

        let to_prune = live.len() - max_versions;
        let pruned: Vec<u64> = live.into_iter().take(to_prune).collect();
        for v in &pruned {
            if let Some(meta) = self.versions.get_mut(v) {
                meta.state = meta.state.prune(now_unix_ms);
            }
        }
        self.refresh_pointers();
        pruned
    }

    /// Drop the oldest erased markers once the history exceeds `max_entries`.
    ///
    /// Live versions are never dropped.
    pub fn compact_history(&mut self, max_entries: usize) {
        let excess = self.versions.len().saturating_sub(max_entries);
        if excess == 0 {
            return;
        }
        let erased: Vec<u64> = self.versions.values().filter(|v| v.destroyed()).map(|v| v.version).take(excess).collect();
        for v in erased {
            self.versions.remove(&v);
        }
    }

    /// Total size of custom metadata in bytes.
    pub fn custom_metadata_bytes(&self) -> usize {
        self.custom_metadata.iter().map(|(k, v)| k.len() + v.len()).sum()
    }
}

/// KV engine flavour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KvVersion {
    /// Legacy unversioned mount: one version per secret, no sub-paths.
    V1,
    /// Versioned mount with data/metadata/delete/undelete/destroy sub-paths.
    #[default]
    V2,
}

impl fmt::Display for KvVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KvVersion::V1 => f.write_str("1"),
            KvVersion::V2 => f.write_str("2"),
        }
    }
}

impl std::str::FromStr for KvVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1" | "v1" => Ok(KvVersion::V1),
            "2" | "v2" => Ok(KvVersion::V2),
            _ => Err(format!("invalid kv version: {}", s)),
        }
    }
}

/// KV engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KvConfig {
    /// Engine flavour.
    #[serde(default)]
    pub version: KvVersion,
    /// Maximum number of versions to keep per secret.
    #[serde(default = "default_max_versions")]
    pub max_versions: u32,
    /// Whether CAS is required by default for all secrets.
    #[serde(default)]
    pub cas_required: bool,
    /// Delay after which new versions are automatically deleted (zero = never).
    #[serde(default, with = "duration_secs")]
    pub delete_version_after: Duration,
}

fn default_max_versions() -> u32 {
    DEFAULT_MAX_VERSIONS
}

impl Default for KvConfig {
    fn default() -> Self {
        Self {
            version: KvVersion::V2,
            max_versions: DEFAULT_MAX_VERSIONS,
            cas_required: false,
            delete_version_after: Duration::ZERO,
        }
    }
}

impl KvConfig {
    /// Config for a legacy, unversioned mount.
    pub fn v1() -> Self {
        Self {
            version: KvVersion::V1,
            max_versions: 1,
            ..Self::default()
        }
    }
}

/// Serde helper storing a `Duration` as whole seconds.
pub(crate) mod duration_secs {
    use std::time::Duration;

    use serde::Deserialize;
    use serde::Deserializer;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

/// Options accepted alongside a write.
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// Check-and-set version (None = no CAS unless required by config).
    pub cas: Option<u64>,
    /// Custom metadata merged into the secret's metadata.
    pub custom_metadata: Option<BTreeMap<String, String>>,
    /// Per-secret `max_versions` to set with this write.
    pub max_versions: Option<u32>,
    /// Per-secret `delete_version_after` to set with this write.
    pub delete_version_after: Option<Duration>,
}

/// Request to read a secret.
#[derive(Debug, Clone)]
pub struct ReadSecretRequest {
    /// Secret path.
    pub path: SecretPath,
    /// Specific version to read (None = current).
    pub version: Option<u64>,
}

impl ReadSecretRequest {
    /// Create a new read request for the current version.
    pub fn new(path: SecretPath) -> Self {
        Self { path, version: None }
    }

    /// Create a new read request for a specific version.
    pub fn with_version(path: SecretPath, version: u64) -> Self {
        Self {
            path,
            version: Some(version),
        }
    }
}

/// Response from reading a secret.
#[derive(Debug, Clone)]
pub struct ReadSecretResponse {
    /// The secret data.
    pub data: SecretData,
    /// Metadata for this version.
    pub metadata: VersionMetadata,
}

/// Request to write a secret.
#[derive(Debug, Clone)]
pub struct WriteSecretRequest {
    /// Secret path.
    pub path: SecretPath,
    /// Secret data to write.
    pub data: SecretData,
    /// CAS and metadata options.
    pub options: WriteOptions,
    /// Grants settled under the path lock before anything is written.
    pub access: Vec<AccessCheck>,
}

impl WriteSecretRequest {
    /// Create a new write request without CAS.
    pub fn new(path: SecretPath, data: SecretData) -> Self {
        Self {
            path,
            data,
            options: WriteOptions::default(),
            access: Vec::new(),
        }
    }

    /// Create a new write request with CAS.
    pub fn with_cas(path: SecretPath, data: SecretData, expected_version: u64) -> Self {
        Self {
            path,
            data,
            options: WriteOptions {
                cas: Some(expected_version),
                ..WriteOptions::default()
            },
            access: Vec::new(),
        }
    }

    /// Replace the write options.
    pub fn with_options(mut self, options: WriteOptions) -> Self {
        self.options = options;
        self
    }

    /// Add a grant the write must satisfy.
    pub fn with_access(mut self, check: AccessCheck) -> Self {
        self.access.push(check);
        self
    }
}

/// Response from writing a secret.
#[derive(Debug, Clone)]
pub struct WriteSecretResponse {
    /// Version number of the written secret.
    pub version: u64,
    /// Metadata for this version.
    pub metadata: VersionMetadata,
}

/// Request to soft-delete secret versions.
#[derive(Debug, Clone)]
pub struct DeleteSecretRequest {
    /// Secret path.
    pub path: SecretPath,
    /// Versions to delete (empty = delete current version).
    pub versions: Vec<u64>,
}

impl DeleteSecretRequest {
    /// Create a request to soft-delete the current version.
    pub fn current(path: SecretPath) -> Self {
        Self { path, versions: vec![] }
    }

    /// Create a request to soft-delete specific versions.
    pub fn versions(path: SecretPath, versions: Vec<u64>) -> Self {
        Self { path, versions }
    }
}

/// Request to permanently destroy secret versions.
#[derive(Debug, Clone)]
pub struct DestroySecretRequest {
    /// Secret path.
    pub path: SecretPath,
    /// Versions to destroy.
    pub versions: Vec<u64>,
}

impl DestroySecretRequest {
    /// Create a request to destroy specific versions.
    pub fn new(path: SecretPath, versions: Vec<u64>) -> Self {
        Self { path, versions }
    }
}

/// Request to undelete soft-deleted versions.
#[derive(Debug, Clone)]
pub struct UndeleteSecretRequest {
    /// Secret path.
    pub path: SecretPath,
    /// Versions to undelete.
    pub versions: Vec<u64>,
}

impl UndeleteSecretRequest {
    /// Create a request to undelete specific versions.
    pub fn new(path: SecretPath, versions: Vec<u64>) -> Self {
        Self { path, versions }
    }
}

/// Request to update a secret's configuration fields.
#[derive(Debug, Clone)]
pub struct UpdateConfigRequest {
    /// Secret path.
    pub path: SecretPath,
    /// Maximum versions to keep (None = don't change, 0 = engine default).
    pub max_versions: Option<u32>,
    /// Whether CAS is required (None = don't change).
    pub cas_required: Option<bool>,
    /// Automatic deletion delay (None = don't change, zero = never delete).
    pub delete_version_after: Option<Duration>,
    /// Grant settled under the path lock before the record is changed.
    pub access: Option<AccessCheck>,
}

impl UpdateConfigRequest {
    /// Create an empty config update request.
    pub fn new(path: SecretPath) -> Self {
        Self {
            path,
            max_versions: None,
            cas_required: None,
            delete_version_after: None,
            access: None,
        }
    }

    /// Set max_versions.
    pub fn with_max_versions(mut self, max_versions: u32) -> Self {
        self.max_versions = Some(max_versions);
        self
    }

    /// Set cas_required.
    pub fn with_cas_required(mut self, cas_required: bool) -> Self {
        self.cas_required = Some(cas_required);
        self
    }

    /// Set delete_version_after.
    pub fn with_delete_version_after(mut self, after: Duration) -> Self {
        self.delete_version_after = Some(after);
        self
    }

    /// Require a grant on the metadata path.
    pub fn with_access(mut self, check: AccessCheck) -> Self {
        self.access = Some(check);
        self
    }
}

/// Request to list secrets.
#[derive(Debug, Clone)]
pub struct ListSecretsRequest {
    /// Prefix to list.
    pub prefix: ListPrefix,
}

impl ListSecretsRequest {
    /// Create a new list request.
    pub fn new(prefix: ListPrefix) -> Self {
        Self { prefix }
    }
}

/// Whether a listed child is a secret or an intermediate prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListEntryKind {
    /// A secret at exactly this path.
    Secret,
    /// A prefix with secrets below it.
    Prefix,
}

/// One child of a listed prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    /// Child segment name, without a trailing slash.
    pub name: String,
    /// Secret or prefix.
    pub kind: ListEntryKind,
}

impl ListEntry {
    /// Parse a backend listing key (`name` or `name/`).
    pub fn from_listing(key: &str) -> Self {
        match key.strip_suffix('/') {
            Some(name) => Self {
                name: name.to_string(),
                kind: ListEntryKind::Prefix,
            },
            None => Self {
                name: key.to_string(),
                kind: ListEntryKind::Secret,
            },
        }
    }
}

impl fmt::Display for ListEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ListEntryKind::Secret => f.write_str(&self.name),
            ListEntryKind::Prefix => write!(f, "{}/", self.name),
        }
    }
}

/// Response from listing secrets.
#[derive(Debug, Clone, Default)]
pub struct ListSecretsResponse {
    /// Children of the prefix, sorted by rendered name.
    pub keys: Vec<ListEntry>,
}

impl ListSecretsResponse {
    /// Rendered names; prefixes end in `/`.
    pub fn names(&self) -> Vec<String> {
        self.keys.iter().map(|k| k.to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_machine_terminal() {
        let destroyed = VersionState::Destroyed {
            destroyed_time_unix_ms: 5,
        };
        assert_eq!(destroyed.soft_delete(10), destroyed);
        assert_eq!(destroyed.destroy(10), destroyed);
        assert_eq!(destroyed.prune(10), destroyed);
        assert_eq!(destroyed.undelete(10), None);

        let pruned = VersionState::Pruned { pruned_time_unix_ms: 5 };
        assert_eq!(pruned.destroy(10), pruned);
        assert_eq!(pruned.undelete(10), None);
    }

    #[test]
    fn test_soft_delete_round_trip() {
        let active = VersionState::Active {
            deletion_time_unix_ms: None,
        };
        let deleted = active.soft_delete(100);
        assert_eq!(
            deleted.status(200),
            VersionStatus::Deleted {
                deletion_time_unix_ms: 100
            }
        );
        assert_eq!(deleted.soft_delete(300), deleted);
        assert_eq!(deleted.undelete(400), Some(active));
    }

    #[test]
    fn test_scheduled_deletion() {
        let scheduled = VersionState::Active {
            deletion_time_unix_ms: Some(1_000),
        };
        assert_eq!(scheduled.status(999), VersionStatus::Readable);
        assert_eq!(
            scheduled.status(1_000),
            VersionStatus::Deleted {
                deletion_time_unix_ms: 1_000
            }
        );
        // Not yet deleted: undelete leaves the schedule alone.
        assert_eq!(scheduled.undelete(500), Some(scheduled));
        // Past the schedule: undelete clears it.
        assert_eq!(
            scheduled.undelete(2_000),
            Some(VersionState::Active {
                deletion_time_unix_ms: None
            })
        );
    }

    #[test]
    fn test_prune_keeps_markers_and_pointers() {
        let mut meta = SecretMetadata::new(0);
        for v in 1..=3 {
            meta.push_version(VersionMetadata::new(v, v, None));
        }
        assert_eq!((meta.oldest_version, meta.current_version), (1, 3));

        let pruned = meta.prune_versions(1, 10);
        assert_eq!(pruned, vec![1, 2]);
        assert_eq!(meta.versions.len(), 3);
        assert!(meta.version(1).unwrap().destroyed());
        assert_eq!((meta.oldest_version, meta.current_version), (3, 3));
    }

    #[test]
    fn test_prune_skips_destroyed_versions() {
        let mut meta = SecretMetadata::new(0);
        for v in 1..=3 {
            meta.push_version(VersionMetadata::new(v, v, None));
        }
        let v2 = meta.version_mut(2).unwrap();
        v2.state = v2.state.destroy(5);
        meta.refresh_pointers();

        assert!(meta.prune_versions(2, 10).is_empty());
        assert_eq!((meta.oldest_version, meta.current_version), (1, 3));
    }

    #[test]
    fn test_effective_limits() {
        let config = KvConfig::default();
        let mut meta = SecretMetadata::new(0);
        assert_eq!(meta.effective_max_versions(&config), DEFAULT_MAX_VERSIONS);
        meta.max_versions = 3;
        assert_eq!(meta.effective_max_versions(&config), 3);
        assert_eq!(meta.effective_max_versions(&KvConfig::v1()), 1);
    }

    #[test]
    fn test_list_entry_rendering() {
        assert_eq!(ListEntry::from_listing("b/").to_string(), "b/");
        assert_eq!(ListEntry::from_listing("b").kind, ListEntryKind::Secret);
    }
}
