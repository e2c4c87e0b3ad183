//! Metadata Store: per-secret configuration and custom metadata.
//!
//! Owns the storage handle, the mount configuration, the per-path lock table
//! and the clock. The [`VersionManager`](super::VersionManager) shares one
//! `MetadataStore` so both sides serialize on the same locks.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;
use tracing::warn;

use crate::access::AccessCheck;
use crate::backend::SecretsBackend;
use crate::clock::Clock;
use crate::clock::SystemClock;
use crate::constants::MAX_VERSIONS_PER_SECRET;
use crate::error::Result;
use crate::error::SecretsError;
use crate::kv::storage::KvStorage;
use crate::kv::types::KvConfig;
use crate::kv::types::KvVersion;
use crate::kv::types::ListEntry;
use crate::kv::types::ListSecretsResponse;
use crate::kv::types::SecretMetadata;
use crate::kv::types::UpdateConfigRequest;
use crate::kv::validation::validate_custom_metadata;
use crate::kv::validation::validate_max_versions;
use crate::locks::PathLocks;
use crate::path::ListPrefix;
use crate::path::SecretPath;

/// Per-secret metadata records for one mount.
pub struct MetadataStore {
    storage: KvStorage,
    config: RwLock<KvConfig>,
    locks: PathLocks,
    clock: Arc<dyn Clock>,
}

impl MetadataStore {
    /// Create a store over `backend` with the system clock.
    pub fn new(backend: Arc<dyn SecretsBackend>, config: KvConfig) -> Self {
        Self::with_clock(backend, config, Arc::new(SystemClock))
    }

    /// Create a store with an explicit clock.
    pub fn with_clock(backend: Arc<dyn SecretsBackend>, config: KvConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            storage: KvStorage::new(backend),
            config: RwLock::new(config),
            locks: PathLocks::new(),
            clock,
        }
    }

    pub(crate) fn storage(&self) -> &KvStorage {
        &self.storage
    }

    pub(crate) fn locks(&self) -> &PathLocks {
        &self.locks
    }

    pub(crate) fn now_unix_ms(&self) -> u64 {
        self.clock.now_unix_ms()
    }

    /// Snapshot of the mount configuration.
    pub async fn read_config(&self) -> KvConfig {
        self.config.read().await.clone()
    }

    /// Replace the mount configuration.
    ///
    /// Existing secrets are pruned lazily, on their next write or config
    /// update.
    pub async fn set_mount_config(&self, config: KvConfig) -> Result<()> {
        if config.max_versions == 0 || config.max_versions > MAX_VERSIONS_PER_SECRET {
            return Err(SecretsError::invalid(
                "config",
                "max_versions",
                format!("must be between 1 and {}", MAX_VERSIONS_PER_SECRET),
            ));
        }
        if config.version == KvVersion::V1 && config.cas_required {
            return Err(SecretsError::invalid("config", "cas_required", "not supported on a version 1 mount"));
        }
        debug!(
            version = %config.version,
            max_versions = config.max_versions,
            cas_required = config.cas_required,
            "Updated mount config"
        );
        *self.config.write().await = config;
        Ok(())
    }

    /// Fail with `InvalidArgument` unless the mount is versioned.
    pub(crate) async fn require_versioned(&self, path: &SecretPath, operation: &str) -> Result<KvConfig> {
        let config = self.read_config().await;
        if config.version == KvVersion::V1 {
            return Err(SecretsError::invalid(
                path.as_str(),
                "operation",
                format!("{operation} is not supported on a version 1 mount"),
            ));
        }
        Ok(config)
    }

    /// Load a secret's metadata, if any.
    pub async fn load(&self, path: &SecretPath) -> Result<Option<SecretMetadata>> {
        self.storage.load_metadata(path).await
    }

    /// Read a secret's metadata.
    pub async fn get_metadata(&self, path: &SecretPath) -> Result<SecretMetadata> {
        self.load(path).await?.ok_or_else(|| SecretsError::not_found(path.as_str(), None))
    }

    /// Merge configuration fields into a secret's metadata.
    ///
    /// Creates the record when absent. A lowered `max_versions` prunes
    /// immediately.
    pub async fn update_config(&self, request: UpdateConfigRequest) -> Result<SecretMetadata> {
        let path = &request.path;
        let config = self.require_versioned(path, "metadata update").await?;
        if let Some(max_versions) = request.max_versions {
            validate_max_versions(path, max_versions, true)?;
        }

        let _guard = self.locks.lock(path.as_str()).await;
        let now = self.now_unix_ms();
        let existing = self.load(path).await?;
        if let Some(check) = &request.access {
            check.authorize(existing.is_some())?;
        }
        let mut metadata = existing.unwrap_or_else(|| SecretMetadata::new(now));

        if let Some(max_versions) = request.max_versions {
            metadata.max_versions = max_versions;
        }
        if let Some(cas_required) = request.cas_required {
            metadata.cas_required = cas_required;
        }
        if let Some(after) = request.delete_version_after {
            metadata.delete_version_after = Some(after);
        }
        metadata.updated_time_unix_ms = now;

        let pruned = metadata.prune_versions(metadata.effective_max_versions(&config), now);
        self.storage.save_metadata(path, &metadata).await?;
        self.erase_payloads(path, &pruned).await;

        debug!(
            path = %path,
            max_versions = metadata.max_versions,
            cas_required = metadata.cas_required,
            pruned = pruned.len(),
            "Updated secret config"
        );
        Ok(metadata)
    }

    /// Merge custom metadata entries, all or nothing.
    pub async fn update_custom_metadata(
        &self,
        path: &SecretPath,
        entries: BTreeMap<String, String>,
        access: Option<&AccessCheck>,
    ) -> Result<SecretMetadata> {
        self.require_versioned(path, "custom metadata update").await?;

        let _guard = self.locks.lock(path.as_str()).await;
        let now = self.now_unix_ms();
        let existing = self.load(path).await?;
        if let Some(check) = access {
            check.authorize(existing.is_some())?;
        }
        let mut metadata = existing.unwrap_or_else(|| SecretMetadata::new(now));

        validate_custom_metadata(path, &metadata.custom_metadata, &entries)?;

        let count = entries.len();
        metadata.custom_metadata.extend(entries);
        metadata.updated_time_unix_ms = now;
        self.storage.save_metadata(path, &metadata).await?;

        debug!(path = %path, entries = count, "Updated custom metadata");
        Ok(metadata)
    }

    /// Remove custom metadata keys. Absent keys are ignored.
    pub async fn delete_custom_metadata_keys(&self, path: &SecretPath, keys: &[String]) -> Result<SecretMetadata> {
        self.require_versioned(path, "custom metadata delete").await?;

        let _guard = self.locks.lock(path.as_str()).await;
        let mut metadata = self.get_metadata(path).await?;

        let before = metadata.custom_metadata.len();
        for key in keys {
            metadata.custom_metadata.remove(key);
        }
        if metadata.custom_metadata.len() != before {
            metadata.updated_time_unix_ms = self.now_unix_ms();
            self.storage.save_metadata(path, &metadata).await?;
        }

        debug!(path = %path, removed = before - metadata.custom_metadata.len(), "Deleted custom metadata keys");
        Ok(metadata)
    }

    /// Remove a secret entirely: metadata, every payload and the version
    /// sequence. Returns whether the secret existed.
    pub async fn delete_metadata(&self, path: &SecretPath) -> Result<bool> {
        self.require_versioned(path, "metadata delete").await?;

        let _guard = self.locks.lock(path.as_str()).await;
        let metadata = match self.load(path).await? {
            Some(m) => m,
            None => return Ok(false),
        };

        self.storage.delete_metadata(path).await?;
        self.storage.delete_sequence(path).await?;

        let versions: Vec<u64> = metadata.versions.keys().copied().collect();
        self.erase_payloads(path, &versions).await;

        debug!(path = %path, versions = versions.len(), "Deleted secret metadata and all versions");
        Ok(true)
    }

    /// List the immediate children of a prefix.
    pub async fn list(&self, prefix: &ListPrefix) -> Result<ListSecretsResponse> {
        let keys = self.storage.list(prefix).await?;
        Ok(ListSecretsResponse {
            keys: keys.iter().map(|k| ListEntry::from_listing(k)).collect(),
        })
    }

    /// Best-effort payload erasure after a committed metadata change.
    pub(crate) async fn erase_payloads(&self, path: &SecretPath, versions: &[u64]) {
        // Tiger Style: log and continue; the metadata already records the versions as erased
        for version in versions {
            if let Err(e) = self.storage.delete_data(path, *version).await {
                warn!(path = %path, version = %version, error = %e, "Failed to delete secret version data");
            }
        }
    }
}
