//! Secret Store façade.
//!
//! Every operation resolves the policy path it needs, checks the caller's
//! capabilities on it and only then delegates to the KV engine. Grants are
//! never inferred across sub-paths: `read` on `data/p` says nothing about
//! `metadata/p`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use kvault_auth::Capability;
use kvault_auth::PolicySet;
use kvault_secrets::AccessCheck;
use kvault_secrets::Clock;
use kvault_secrets::KvVersion;
use kvault_secrets::ListPrefix;
use kvault_secrets::Result;
use kvault_secrets::SecretMetadata;
use kvault_secrets::SecretPath;
use kvault_secrets::SecretsBackend;
use kvault_secrets::SecretsError;
use kvault_secrets::kv::DefaultKvStore;
use kvault_secrets::kv::DeleteSecretRequest;
use kvault_secrets::kv::DestroySecretRequest;
use kvault_secrets::kv::KvConfig;
use kvault_secrets::kv::KvStore;
use kvault_secrets::kv::ListSecretsRequest;
use kvault_secrets::kv::ListSecretsResponse;
use kvault_secrets::kv::ReadSecretRequest;
use kvault_secrets::kv::ReadSecretResponse;
use kvault_secrets::kv::SecretData;
use kvault_secrets::kv::UndeleteSecretRequest;
use kvault_secrets::kv::UpdateConfigRequest;
use kvault_secrets::kv::WriteOptions;
use kvault_secrets::kv::WriteSecretRequest;
use kvault_secrets::kv::WriteSecretResponse;
use tracing::debug;
use tracing::warn;

use crate::permissions::EffectivePermissions;
use crate::permissions::SubPathCapabilities;
use crate::subpath::SubPath;
use crate::subpath::normalize_mount;

/// Policy path segment, under the mount, guarding the mount configuration.
const MOUNT_CONFIG_SEGMENT: &str = "config";

/// Per-secret configuration fields to change. `None` keeps the prior value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigUpdate {
    /// Versions to retain (0 = mount default).
    pub max_versions: Option<u32>,
    /// Whether writes must carry `cas`.
    pub cas_required: Option<bool>,
    /// Automatic deletion delay for new versions (zero = never delete).
    pub delete_version_after: Option<Duration>,
}

/// One mount of the secret store, with access control.
pub struct SecretStore {
    mount: String,
    version: KvVersion,
    kv: Arc<dyn KvStore>,
}

impl SecretStore {
    /// Create a mount over `backend`.
    pub fn new(mount: &str, config: KvConfig, backend: Arc<dyn SecretsBackend>) -> Self {
        let version = config.version;
        Self::from_kv(mount, version, Arc::new(DefaultKvStore::with_config(backend, config)))
    }

    /// Create a mount with an explicit clock.
    pub fn with_clock(mount: &str, config: KvConfig, backend: Arc<dyn SecretsBackend>, clock: Arc<dyn Clock>) -> Self {
        let version = config.version;
        Self::from_kv(mount, version, Arc::new(DefaultKvStore::with_clock(backend, config, clock)))
    }

    /// Wrap an existing KV engine.
    pub fn from_kv(mount: &str, version: KvVersion, kv: Arc<dyn KvStore>) -> Self {
        Self {
            mount: normalize_mount(mount),
            version,
            kv,
        }
    }

    /// The normalized mount name.
    pub fn mount(&self) -> &str {
        &self.mount
    }

    /// The mount's KV version.
    pub fn version(&self) -> KvVersion {
        self.version
    }

    /// The underlying engine, without access control.
    pub fn kv(&self) -> &Arc<dyn KvStore> {
        &self.kv
    }

    fn policy_path(&self, sub: SubPath, path: &str) -> String {
        sub.policy_path(&self.mount, self.version, path)
    }

    fn require(
        &self,
        policies: &PolicySet,
        sub: SubPath,
        path: &str,
        capability: Capability,
        operation: &str,
    ) -> Result<()> {
        let policy_path = self.policy_path(sub, path);
        self.require_at(policies, policy_path, capability, operation)
    }

    fn require_at(&self, policies: &PolicySet, policy_path: String, capability: Capability, operation: &str) -> Result<()> {
        if policies.capabilities(&policy_path).contains(capability) {
            return Ok(());
        }
        warn!(
            policy_path = %policy_path,
            capability = %capability,
            operation = operation,
            "Permission denied"
        );
        Err(SecretsError::PermissionDenied {
            path: policy_path,
            capability,
            operation: operation.to_string(),
        })
    }

    fn require_version(&self, path: &str, expected: KvVersion, operation: &str) -> Result<()> {
        if self.version == expected {
            return Ok(());
        }
        Err(SecretsError::InvalidArgument {
            path: path.to_string(),
            field: "operation".to_string(),
            reason: format!("{operation} is not supported on a version {} mount", self.version),
        })
    }

    /// Parse a secret path. On a legacy mount the top-level name `config`
    /// is reserved: its policy path is the mount config path.
    fn secret_path(&self, raw: &str) -> Result<SecretPath> {
        let path = SecretPath::parse(raw)?;
        if self.version == KvVersion::V1 && path.as_str() == MOUNT_CONFIG_SEGMENT {
            return Err(SecretsError::InvalidArgument {
                path: path.to_string(),
                field: "path".to_string(),
                reason: format!("'{MOUNT_CONFIG_SEGMENT}' is reserved for the mount configuration"),
            });
        }
        Ok(path)
    }

    /// Create-or-update grant on a sub-path, settled by the engine under the
    /// path lock.
    fn access(&self, policies: &PolicySet, sub: SubPath, path: &SecretPath, operation: &str) -> AccessCheck {
        let policy_path = self.policy_path(sub, path.as_str());
        let capabilities = policies.capabilities(&policy_path);
        AccessCheck::new(policy_path, capabilities, operation)
    }

    /// Write a new version.
    ///
    /// An absent secret needs `create` or `update` on the data sub-path, an
    /// existing one needs `update`. Metadata options in `options` also need
    /// `create` (absent) or `update` (existing) on the metadata sub-path.
    pub async fn write(
        &self,
        policies: &PolicySet,
        path: &str,
        data: SecretData,
        options: WriteOptions,
    ) -> Result<WriteSecretResponse> {
        let path = self.secret_path(path)?;
        let mut request = WriteSecretRequest::new(path.clone(), data)
            .with_access(self.access(policies, SubPath::Data, &path, "write").update_may_create());

        let touches_metadata = options.custom_metadata.is_some()
            || options.max_versions.is_some()
            || options.delete_version_after.is_some();
        if touches_metadata && self.version == KvVersion::V2 {
            request = request.with_access(self.access(policies, SubPath::Metadata, &path, "write metadata"));
        }

        self.kv.write(request.with_options(options)).await
    }

    /// Read a version (the current one by default).
    pub async fn read(&self, policies: &PolicySet, path: &str, version: Option<u64>) -> Result<ReadSecretResponse> {
        let path = self.secret_path(path)?;
        self.require(policies, SubPath::Data, path.as_str(), Capability::Read, "read")?;
        self.kv.read(ReadSecretRequest { path, version }).await
    }

    /// List the children of a prefix.
    pub async fn list(&self, policies: &PolicySet, prefix: &str) -> Result<ListSecretsResponse> {
        let prefix = ListPrefix::parse(prefix)?;
        let sub = match self.version {
            KvVersion::V2 => SubPath::Metadata,
            KvVersion::V1 => SubPath::Data,
        };
        self.require(policies, sub, prefix.as_str(), Capability::List, "list")?;
        self.kv.list(ListSecretsRequest::new(prefix)).await
    }

    /// Soft-delete the latest version.
    pub async fn soft_delete_latest(&self, policies: &PolicySet, path: &str) -> Result<()> {
        self.require_version(path, KvVersion::V2, "soft delete")?;
        let path = self.secret_path(path)?;
        self.require(policies, SubPath::Data, path.as_str(), Capability::Delete, "soft delete latest")?;
        self.kv.delete(DeleteSecretRequest::current(path)).await
    }

    /// Soft-delete named versions.
    pub async fn soft_delete_versions(&self, policies: &PolicySet, path: &str, versions: Vec<u64>) -> Result<()> {
        self.require_version(path, KvVersion::V2, "soft delete")?;
        let path = self.secret_path(path)?;
        if versions.is_empty() {
            return Err(SecretsError::InvalidArgument {
                path: path.to_string(),
                field: "versions".to_string(),
                reason: "no versions specified".to_string(),
            });
        }
        self.require(policies, SubPath::Delete, path.as_str(), Capability::Update, "soft delete versions")?;
        self.kv.delete(DeleteSecretRequest::versions(path, versions)).await
    }

    /// Undelete named versions.
    pub async fn undelete(&self, policies: &PolicySet, path: &str, versions: Vec<u64>) -> Result<()> {
        self.require_version(path, KvVersion::V2, "undelete")?;
        let path = self.secret_path(path)?;
        self.require(policies, SubPath::Undelete, path.as_str(), Capability::Update, "undelete")?;
        self.kv.undelete(UndeleteSecretRequest::new(path, versions)).await
    }

    /// Destroy named versions.
    pub async fn destroy(&self, policies: &PolicySet, path: &str, versions: Vec<u64>) -> Result<()> {
        self.require_version(path, KvVersion::V2, "destroy")?;
        let path = self.secret_path(path)?;
        self.require(policies, SubPath::Destroy, path.as_str(), Capability::Update, "destroy")?;
        self.kv.destroy(DestroySecretRequest::new(path, versions)).await
    }

    /// Read a secret's metadata.
    pub async fn read_metadata(&self, policies: &PolicySet, path: &str) -> Result<SecretMetadata> {
        self.require_version(path, KvVersion::V2, "metadata read")?;
        let path = self.secret_path(path)?;
        self.require(policies, SubPath::Metadata, path.as_str(), Capability::Read, "read metadata")?;
        self.kv.read_metadata(&path).await
    }

    /// Change per-secret configuration.
    pub async fn update_config(&self, policies: &PolicySet, path: &str, update: ConfigUpdate) -> Result<SecretMetadata> {
        self.require_version(path, KvVersion::V2, "metadata update")?;
        let path = self.secret_path(path)?;
        let access = self.access(policies, SubPath::Metadata, &path, "update config");

        let request = UpdateConfigRequest {
            path,
            max_versions: update.max_versions,
            cas_required: update.cas_required,
            delete_version_after: update.delete_version_after,
            access: Some(access),
        };
        self.kv.update_metadata(request).await
    }

    /// Merge custom metadata entries.
    pub async fn update_custom_metadata(
        &self,
        policies: &PolicySet,
        path: &str,
        entries: BTreeMap<String, String>,
    ) -> Result<SecretMetadata> {
        self.require_version(path, KvVersion::V2, "custom metadata update")?;
        let path = self.secret_path(path)?;
        let access = self.access(policies, SubPath::Metadata, &path, "update custom metadata");
        self.kv.update_custom_metadata(&path, entries, Some(&access)).await
    }

    /// Remove custom metadata keys.
    pub async fn delete_custom_metadata_keys(
        &self,
        policies: &PolicySet,
        path: &str,
        keys: &[String],
    ) -> Result<SecretMetadata> {
        self.require_version(path, KvVersion::V2, "custom metadata delete")?;
        let path = self.secret_path(path)?;
        self.require(policies, SubPath::Metadata, path.as_str(), Capability::Update, "delete custom metadata")?;
        self.kv.delete_custom_metadata_keys(&path, keys).await
    }

    /// Delete the metadata and every version of a secret.
    pub async fn delete_metadata(&self, policies: &PolicySet, path: &str) -> Result<bool> {
        self.require_version(path, KvVersion::V2, "metadata delete")?;
        let path = self.secret_path(path)?;
        self.require(policies, SubPath::Metadata, path.as_str(), Capability::Delete, "delete metadata")?;
        let existed = self.kv.delete_metadata(&path).await?;
        debug!(mount = %self.mount, path = %path, existed, "Metadata delete");
        Ok(existed)
    }

    /// Delete every version of a secret on a legacy mount.
    pub async fn delete_all_versions(&self, policies: &PolicySet, path: &str) -> Result<bool> {
        self.require_version(path, KvVersion::V1, "delete of all versions")?;
        let path = self.secret_path(path)?;
        self.require(policies, SubPath::Data, path.as_str(), Capability::Delete, "delete all versions")?;
        self.kv.delete_all_versions(&path).await
    }

    /// Replace the mount configuration. Requires `update` on `<mount>/config`.
    ///
    /// The KV version of a mount cannot change.
    pub async fn configure_mount(&self, policies: &PolicySet, config: KvConfig) -> Result<()> {
        self.require_at(policies, self.config_path(), Capability::Update, "configure mount")?;
        if config.version != self.version {
            return Err(SecretsError::InvalidArgument {
                path: self.config_path(),
                field: "version".to_string(),
                reason: format!("cannot change a version {} mount to version {}", self.version, config.version),
            });
        }
        self.kv.update_config(config).await
    }

    /// Read the mount configuration. Requires `read` on `<mount>/config`.
    pub async fn read_mount_config(&self, policies: &PolicySet) -> Result<KvConfig> {
        self.require_at(policies, self.config_path(), Capability::Read, "read mount config")?;
        Ok(self.kv.read_config().await)
    }

    fn config_path(&self) -> String {
        format!("{}/{}", self.mount, MOUNT_CONFIG_SEGMENT)
    }

    /// What the caller may do with `path`, derived from capabilities alone.
    pub fn effective_permissions(&self, policies: &PolicySet, path: &str) -> Result<EffectivePermissions> {
        let path = self.secret_path(path)?;
        let caps = SubPathCapabilities::evaluate(policies, &self.mount, self.version, path.as_str());
        Ok(EffectivePermissions::from_capabilities(self.version, &caps))
    }
}
