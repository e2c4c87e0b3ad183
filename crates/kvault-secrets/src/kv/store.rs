//! KV secrets store implementation.
//!
//! Provides versioned key-value storage with soft delete, hard delete (destroy),
//! and check-and-set semantics following HashiCorp Vault patterns.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::access::AccessCheck;
use crate::backend::SecretsBackend;
use crate::clock::Clock;
use crate::clock::SystemClock;
use crate::error::Result;
use crate::kv::metadata::MetadataStore;
use crate::kv::types::DeleteSecretRequest;
use crate::kv::types::DestroySecretRequest;
use crate::kv::types::KvConfig;
use crate::kv::types::ListSecretsRequest;
use crate::kv::types::ListSecretsResponse;
use crate::kv::types::ReadSecretRequest;
use crate::kv::types::ReadSecretResponse;
use crate::kv::types::SecretMetadata;
use crate::kv::types::UndeleteSecretRequest;
use crate::kv::types::UpdateConfigRequest;
use crate::kv::types::WriteSecretRequest;
use crate::kv::types::WriteSecretResponse;
use crate::kv::versions::VersionManager;
use crate::path::SecretPath;

/// KV secrets engine store.
///
/// Provides versioned key-value storage with:
/// - Multiple versions per secret (configurable max)
/// - Soft delete (can be undeleted)
/// - Hard delete / destroy (permanent)
/// - Check-and-set writes
/// - Secret metadata (custom key-values)
/// - Time-based version expiration
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read a secret at a specific path/version.
    async fn read(&self, request: ReadSecretRequest) -> Result<ReadSecretResponse>;

    /// Write a secret at a specific path.
    async fn write(&self, request: WriteSecretRequest) -> Result<WriteSecretResponse>;

    /// Soft-delete secret versions (can be undeleted).
    async fn delete(&self, request: DeleteSecretRequest) -> Result<()>;

    /// Permanently destroy secret versions (cannot be recovered).
    async fn destroy(&self, request: DestroySecretRequest) -> Result<()>;

    /// Undelete soft-deleted versions.
    async fn undelete(&self, request: UndeleteSecretRequest) -> Result<()>;

    /// Remove every version of a secret on a legacy mount.
    async fn delete_all_versions(&self, path: &SecretPath) -> Result<bool>;

    /// Whether a metadata record exists for the path.
    async fn exists(&self, path: &SecretPath) -> Result<bool>;

    /// Read secret metadata.
    async fn read_metadata(&self, path: &SecretPath) -> Result<SecretMetadata>;

    /// Update a secret's configuration fields.
    async fn update_metadata(&self, request: UpdateConfigRequest) -> Result<SecretMetadata>;

    /// Merge custom metadata entries, all or nothing.
    ///
    /// `access`, when given, is settled under the path lock.
    async fn update_custom_metadata(
        &self,
        path: &SecretPath,
        entries: BTreeMap<String, String>,
        access: Option<&AccessCheck>,
    ) -> Result<SecretMetadata>;

    /// Remove custom metadata keys.
    async fn delete_custom_metadata_keys(&self, path: &SecretPath, keys: &[String]) -> Result<SecretMetadata>;

    /// Delete secret and all its versions (metadata delete).
    async fn delete_metadata(&self, path: &SecretPath) -> Result<bool>;

    /// List secrets under a path prefix.
    async fn list(&self, request: ListSecretsRequest) -> Result<ListSecretsResponse>;

    /// Update engine configuration.
    async fn update_config(&self, config: KvConfig) -> Result<()>;

    /// Read the engine configuration.
    ///
    /// Tiger Style: Prefer async method over sync method that would need to
    /// either panic or use unsafe sync locks for data behind an async lock.
    async fn read_config(&self) -> KvConfig;
}

/// Default KV store composing a [`MetadataStore`] and a [`VersionManager`].
pub struct DefaultKvStore {
    metadata: Arc<MetadataStore>,
    versions: VersionManager,
}

impl DefaultKvStore {
    /// Create a new KV store with the given backend.
    pub fn new(backend: Arc<dyn SecretsBackend>) -> Self {
        Self::with_config(backend, KvConfig::default())
    }

    /// Create a new KV store with custom configuration.
    pub fn with_config(backend: Arc<dyn SecretsBackend>, config: KvConfig) -> Self {
        Self::with_clock(backend, config, Arc::new(SystemClock))
    }

    /// Create a new KV store with custom configuration and clock.
    pub fn with_clock(backend: Arc<dyn SecretsBackend>, config: KvConfig, clock: Arc<dyn Clock>) -> Self {
        let metadata = Arc::new(MetadataStore::with_clock(backend, config, clock));
        Self {
            versions: VersionManager::new(Arc::clone(&metadata)),
            metadata,
        }
    }

    /// The metadata store.
    pub fn metadata_store(&self) -> &MetadataStore {
        &self.metadata
    }

    /// The version manager.
    pub fn version_manager(&self) -> &VersionManager {
        &self.versions
    }
}

#[async_trait]
impl KvStore for DefaultKvStore {
    async fn read(&self, request: ReadSecretRequest) -> Result<ReadSecretResponse> {
        self.versions.read(request).await
    }

    async fn write(&self, request: WriteSecretRequest) -> Result<WriteSecretResponse> {
        self.versions.write(request).await
    }

    async fn delete(&self, request: DeleteSecretRequest) -> Result<()> {
        self.versions.soft_delete(request).await
    }

    async fn destroy(&self, request: DestroySecretRequest) -> Result<()> {
        self.versions.destroy(request).await
    }

    async fn undelete(&self, request: UndeleteSecretRequest) -> Result<()> {
        self.versions.undelete(request).await
    }

    async fn delete_all_versions(&self, path: &SecretPath) -> Result<bool> {
        self.versions.delete_all_versions(path).await
    }

    async fn exists(&self, path: &SecretPath) -> Result<bool> {
        Ok(self.metadata.load(path).await?.is_some())
    }

    async fn read_metadata(&self, path: &SecretPath) -> Result<SecretMetadata> {
        self.metadata.get_metadata(path).await
    }

    async fn update_metadata(&self, request: UpdateConfigRequest) -> Result<SecretMetadata> {
        self.metadata.update_config(request).await
    }

    async fn update_custom_metadata(
        &self,
        path: &SecretPath,
        entries: BTreeMap<String, String>,
        access: Option<&AccessCheck>,
    ) -> Result<SecretMetadata> {
        self.metadata.update_custom_metadata(path, entries, access).await
    }

    async fn delete_custom_metadata_keys(&self, path: &SecretPath, keys: &[String]) -> Result<SecretMetadata> {
        self.metadata.delete_custom_metadata_keys(path, keys).await
    }

    async fn delete_metadata(&self, path: &SecretPath) -> Result<bool> {
        self.metadata.delete_metadata(path).await
    }

    async fn list(&self, request: ListSecretsRequest) -> Result<ListSecretsResponse> {
        self.metadata.list(&request.prefix).await
    }

    async fn update_config(&self, config: KvConfig) -> Result<()> {
        self.metadata.set_mount_config(config).await
    }

    async fn read_config(&self) -> KvConfig {
        self.metadata.read_config().await
    }
}
