//! Version Manager: CAS-gated writes and the soft-delete/undelete/destroy
//! state machine.
//!
//! Every mutation holds the path lock from the moment it loads the current
//! metadata until the new metadata is saved. Payloads are written before the
//! metadata that references them and erased only after the metadata that
//! stops referencing them has been saved.

use std::sync::Arc;

use tracing::debug;

use crate::access::authorize_all;
use crate::constants::MAX_VERSION_HISTORY;
use crate::error::Result;
use crate::error::SecretsError;
use crate::kv::metadata::MetadataStore;
use crate::kv::types::DeleteSecretRequest;
use crate::kv::types::DestroySecretRequest;
use crate::kv::types::KvConfig;
use crate::kv::types::KvVersion;
use crate::kv::types::ReadSecretRequest;
use crate::kv::types::ReadSecretResponse;
use crate::kv::types::SecretMetadata;
use crate::kv::types::UndeleteSecretRequest;
use crate::kv::types::VersionMetadata;
use crate::kv::types::VersionStatus;
use crate::kv::types::WriteOptions;
use crate::kv::types::WriteSecretRequest;
use crate::kv::types::WriteSecretResponse;
use crate::kv::validation::validate_custom_metadata;
use crate::kv::validation::validate_data;
use crate::kv::validation::validate_max_versions;
use crate::kv::validation::validate_version_list;
use crate::path::SecretPath;

/// Ordered version history per secret path.
#[derive(Clone)]
pub struct VersionManager {
    metadata: Arc<MetadataStore>,
}

impl VersionManager {
    /// Create a version manager sharing `metadata`'s storage and locks.
    pub fn new(metadata: Arc<MetadataStore>) -> Self {
        Self { metadata }
    }

    /// Options a legacy mount cannot honour.
    fn check_v1_options(path: &SecretPath, options: &WriteOptions) -> Result<()> {
        let field = if options.cas.is_some() {
            "cas"
        } else if options.custom_metadata.is_some() {
            "custom_metadata"
        } else if options.max_versions.is_some() {
            "max_versions"
        } else if options.delete_version_after.is_some() {
            "delete_version_after"
        } else {
            return Ok(());
        };
        Err(SecretsError::invalid(path.as_str(), field, "not supported on a version 1 mount"))
    }

    fn check_cas(path: &SecretPath, config: &KvConfig, metadata: Option<&SecretMetadata>, cas: Option<u64>) -> Result<()> {
        let current = metadata.map_or(0, |m| m.current_version);
        let cas_required = config.cas_required || metadata.is_some_and(|m| m.cas_required);
        match cas {
            Some(expected) if expected != current => Err(SecretsError::CasMismatch {
                path: path.to_string(),
                expected: Some(expected),
                actual: current,
            }),
            None if cas_required => Err(SecretsError::CasMismatch {
                path: path.to_string(),
                expected: None,
                actual: current,
            }),
            _ => Ok(()),
        }
    }

    /// Write a new version.
    pub async fn write(&self, request: WriteSecretRequest) -> Result<WriteSecretResponse> {
        let WriteSecretRequest {
            path,
            data,
            options,
            access,
        } = request;
        validate_data(&path, &data)?;
        if let Some(max_versions) = options.max_versions {
            validate_max_versions(&path, max_versions, false)?;
        }

        let config = self.metadata.read_config().await;
        if config.version == KvVersion::V1 {
            Self::check_v1_options(&path, &options)?;
        }

        let storage = self.metadata.storage();
        let _guard = self.metadata.locks().lock(path.as_str()).await;
        let now = self.metadata.now_unix_ms();

        let existing = storage.load_metadata(&path).await?;
        authorize_all(&access, existing.is_some())?;
        Self::check_cas(&path, &config, existing.as_ref(), options.cas)?;

        let mut metadata = existing.unwrap_or_else(|| SecretMetadata::new(now));
        if let Some(custom) = &options.custom_metadata {
            validate_custom_metadata(&path, &metadata.custom_metadata, custom)?;
        }

        let version = storage.load_sequence(&path).await?.checked_add(1).ok_or_else(|| SecretsError::Internal {
            reason: format!("version sequence exhausted for {path}"),
        })?;

        if let Some(custom) = options.custom_metadata {
            metadata.custom_metadata.extend(custom);
        }
        if let Some(max_versions) = options.max_versions {
            metadata.max_versions = max_versions;
        }
        if let Some(after) = options.delete_version_after {
            metadata.delete_version_after = Some(after);
        }

        let delete_after = metadata.effective_delete_version_after(&config);
        let deletion_time = if delete_after.is_zero() {
            None
        } else {
            let after_ms = u64::try_from(delete_after.as_millis()).unwrap_or(u64::MAX);
            Some(now.saturating_add(after_ms))
        };

        // Payload first: metadata never references a version without data.
        storage.save_data(&path, version, &data).await?;
        storage.save_sequence(&path, version).await?;

        metadata.push_version(VersionMetadata::new(version, now, deletion_time));
        let pruned = metadata.prune_versions(metadata.effective_max_versions(&config), now);
        metadata.compact_history(MAX_VERSION_HISTORY);
        storage.save_metadata(&path, &metadata).await?;
        self.metadata.erase_payloads(&path, &pruned).await;

        debug!(path = %path, version = %version, pruned = pruned.len(), "Wrote secret");

        let version_meta = metadata.version(version).cloned().ok_or_else(|| SecretsError::Internal {
            reason: format!("version {} missing after creation", version),
        })?;

        Ok(WriteSecretResponse {
            version,
            metadata: version_meta,
        })
    }

    /// Read a version (the current one by default).
    pub async fn read(&self, request: ReadSecretRequest) -> Result<ReadSecretResponse> {
        let path = &request.path;
        if request.version == Some(0) {
            return Err(SecretsError::invalid(path.as_str(), "version", "version numbers start at 1"));
        }

        let storage = self.metadata.storage();
        let metadata = storage
            .load_metadata(path)
            .await?
            .ok_or_else(|| SecretsError::not_found(path.as_str(), request.version))?;

        let version = request.version.unwrap_or(metadata.current_version);
        if version == 0 {
            return Err(SecretsError::not_found(path.as_str(), None));
        }

        let version_meta = metadata.version(version).ok_or_else(|| SecretsError::not_found(path.as_str(), Some(version)))?;

        match version_meta.state.status(self.metadata.now_unix_ms()) {
            VersionStatus::Erased => return Err(SecretsError::not_found(path.as_str(), Some(version))),
            VersionStatus::Deleted { deletion_time_unix_ms } => {
                return Err(SecretsError::VersionDeleted {
                    path: path.to_string(),
                    version,
                    deletion_time_unix_ms,
                });
            }
            VersionStatus::Readable => {}
        }

        let data = match storage.load_data(path, version).await? {
            Some(d) => d,
            None => {
                // Lost a race with prune/destroy or metadata delete: recheck.
                let erased = storage
                    .load_metadata(path)
                    .await?
                    .and_then(|m| m.version(version).map(|v| v.destroyed()))
                    .unwrap_or(true);
                if erased {
                    return Err(SecretsError::not_found(path.as_str(), Some(version)));
                }
                return Err(SecretsError::Internal {
                    reason: format!("version {} of {} has metadata but no data", version, path),
                });
            }
        };

        debug!(path = %path, version = %version, "Read secret");

        Ok(ReadSecretResponse {
            data,
            metadata: version_meta.clone(),
        })
    }

    /// Soft-delete versions (the current one when none are listed).
    pub async fn soft_delete(&self, request: DeleteSecretRequest) -> Result<()> {
        let path = &request.path;
        self.metadata.require_versioned(path, "soft delete").await?;
        validate_version_list(path, &request.versions, true)?;

        let _guard = self.metadata.locks().lock(path.as_str()).await;
        let now = self.metadata.now_unix_ms();
        let mut metadata = self.metadata.get_metadata(path).await?;

        let versions = if request.versions.is_empty() {
            vec![metadata.current_version]
        } else {
            request.versions.clone()
        };

        let mut changed = 0usize;
        for version in versions {
            if let Some(meta) = metadata.version_mut(version) {
                let next = meta.state.soft_delete(now);
                if next != meta.state {
                    meta.state = next;
                    changed += 1;
                    debug!(path = %path, version = %version, "Soft-deleted secret version");
                }
            }
        }

        if changed > 0 {
            metadata.updated_time_unix_ms = now;
            self.metadata.storage().save_metadata(path, &metadata).await?;
        }
        Ok(())
    }

    /// Undo soft deletes. Every listed version is checked before any changes.
    pub async fn undelete(&self, request: UndeleteSecretRequest) -> Result<()> {
        let path = &request.path;
        self.metadata.require_versioned(path, "undelete").await?;
        validate_version_list(path, &request.versions, false)?;

        let _guard = self.metadata.locks().lock(path.as_str()).await;
        let now = self.metadata.now_unix_ms();
        let mut metadata = self.metadata.get_metadata(path).await?;

        let mut updates = Vec::with_capacity(request.versions.len());
        for &version in &request.versions {
            let next = metadata
                .version(version)
                .and_then(|meta| meta.state.undelete(now))
                .ok_or_else(|| SecretsError::not_found(path.as_str(), Some(version)))?;
            updates.push((version, next));
        }

        for (version, next) in updates {
            if let Some(meta) = metadata.version_mut(version) {
                meta.state = next;
                debug!(path = %path, version = %version, "Undeleted secret version");
            }
        }

        metadata.updated_time_unix_ms = now;
        self.metadata.storage().save_metadata(path, &metadata).await
    }

    /// Permanently destroy versions. Idempotent; unknown versions are ignored.
    pub async fn destroy(&self, request: DestroySecretRequest) -> Result<()> {
        let path = &request.path;
        self.metadata.require_versioned(path, "destroy").await?;
        validate_version_list(path, &request.versions, false)?;

        let _guard = self.metadata.locks().lock(path.as_str()).await;
        let now = self.metadata.now_unix_ms();
        let mut metadata = self.metadata.get_metadata(path).await?;

        let mut erased = Vec::with_capacity(request.versions.len());
        for &version in &request.versions {
            if let Some(meta) = metadata.version_mut(version) {
                meta.state = meta.state.destroy(now);
                erased.push(version);
                debug!(path = %path, version = %version, "Destroyed secret version");
            }
        }

        metadata.refresh_pointers();
        metadata.updated_time_unix_ms = now;
        self.metadata.storage().save_metadata(path, &metadata).await?;
        self.metadata.erase_payloads(path, &erased).await;
        Ok(())
    }

    /// Remove the whole history of a secret on a legacy mount.
    ///
    /// The version sequence is kept, so numbers are never reused. Returns
    /// whether the secret existed.
    pub async fn delete_all_versions(&self, path: &SecretPath) -> Result<bool> {
        let config = self.metadata.read_config().await;
        if config.version != KvVersion::V1 {
            return Err(SecretsError::invalid(
                path.as_str(),
                "operation",
                "delete of all versions is only supported on a version 1 mount",
            ));
        }

        let _guard = self.metadata.locks().lock(path.as_str()).await;
        let storage = self.metadata.storage();
        let metadata = match storage.load_metadata(path).await? {
            Some(m) => m,
            None => return Ok(false),
        };

        storage.delete_metadata(path).await?;
        let versions: Vec<u64> = metadata.versions.keys().copied().collect();
        self.metadata.erase_payloads(path, &versions).await;

        debug!(path = %path, versions = versions.len(), "Deleted all secret versions");
        Ok(true)
    }
}
