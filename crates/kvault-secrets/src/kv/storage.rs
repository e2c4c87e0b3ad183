//! Typed record access on top of a [`SecretsBackend`].
//!
//! Layout, per secret path `p`:
//! - `metadata/p`: [`SecretMetadata`] (postcard)
//! - `data/p/{version}`: [`SecretData`] (postcard)
//! - `sequence/p`: last allocated version number (postcard `u64`)

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::backend::SecretsBackend;
use crate::constants::DATA_PREFIX;
use crate::constants::METADATA_PREFIX;
use crate::constants::SEQUENCE_PREFIX;
use crate::error::Result;
use crate::error::SecretsError;
use crate::kv::types::SecretData;
use crate::kv::types::SecretMetadata;
use crate::path::ListPrefix;
use crate::path::SecretPath;

/// Typed storage for secret records.
#[derive(Clone)]
pub struct KvStorage {
    backend: Arc<dyn SecretsBackend>,
}

impl KvStorage {
    /// Wrap a backend.
    pub fn new(backend: Arc<dyn SecretsBackend>) -> Self {
        Self { backend }
    }

    fn metadata_key(path: &SecretPath) -> String {
        format!("{METADATA_PREFIX}{path}")
    }

    fn data_key(path: &SecretPath, version: u64) -> String {
        format!("{DATA_PREFIX}{path}/{version}")
    }

    fn sequence_key(path: &SecretPath) -> String {
        format!("{SEQUENCE_PREFIX}{path}")
    }

    async fn load<T: DeserializeOwned>(&self, key: &str, what: &str) -> Result<Option<T>> {
        match self.backend.get(key).await? {
            Some(bytes) => postcard::from_bytes(&bytes).map(Some).map_err(|e| SecretsError::Internal {
                reason: format!("corrupted {what} at {key}: {e}"),
            }),
            None => Ok(None),
        }
    }

    async fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = postcard::to_allocvec(value).map_err(|e| SecretsError::Serialization { reason: e.to_string() })?;
        self.backend.put(key, &bytes).await
    }

    /// Load a secret's metadata record.
    pub async fn load_metadata(&self, path: &SecretPath) -> Result<Option<SecretMetadata>> {
        self.load(&Self::metadata_key(path), "metadata").await
    }

    /// Save a secret's metadata record.
    pub async fn save_metadata(&self, path: &SecretPath, metadata: &SecretMetadata) -> Result<()> {
        self.save(&Self::metadata_key(path), metadata).await
    }

    /// Remove a secret's metadata record.
    pub async fn delete_metadata(&self, path: &SecretPath) -> Result<bool> {
        self.backend.delete(&Self::metadata_key(path)).await
    }

    /// Load one version's payload.
    pub async fn load_data(&self, path: &SecretPath, version: u64) -> Result<Option<SecretData>> {
        self.load(&Self::data_key(path, version), "secret data").await
    }

    /// Save one version's payload.
    pub async fn save_data(&self, path: &SecretPath, version: u64, data: &SecretData) -> Result<()> {
        self.save(&Self::data_key(path, version), data).await
    }

    /// Erase one version's payload.
    pub async fn delete_data(&self, path: &SecretPath, version: u64) -> Result<bool> {
        self.backend.delete(&Self::data_key(path, version)).await
    }

    /// Last allocated version number (0 if none).
    pub async fn load_sequence(&self, path: &SecretPath) -> Result<u64> {
        Ok(self.load(&Self::sequence_key(path), "version sequence").await?.unwrap_or(0))
    }

    /// Record the last allocated version number.
    pub async fn save_sequence(&self, path: &SecretPath, sequence: u64) -> Result<()> {
        self.save(&Self::sequence_key(path), &sequence).await
    }

    /// Forget the version sequence.
    pub async fn delete_sequence(&self, path: &SecretPath) -> Result<bool> {
        self.backend.delete(&Self::sequence_key(path)).await
    }

    /// List the children of a prefix from the metadata namespace.
    pub async fn list(&self, prefix: &ListPrefix) -> Result<Vec<String>> {
        self.backend.list(&format!("{METADATA_PREFIX}{prefix}")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemorySecretsBackend;

    #[tokio::test]
    async fn test_sequence_defaults_to_zero() {
        let storage = KvStorage::new(Arc::new(InMemorySecretsBackend::new()));
        let path = SecretPath::parse("a/b").unwrap();
        assert_eq!(storage.load_sequence(&path).await.unwrap(), 0);
        storage.save_sequence(&path, 7).await.unwrap();
        assert_eq!(storage.load_sequence(&path).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_corrupted_record_is_internal() {
        let backend = Arc::new(InMemorySecretsBackend::new());
        backend.put("metadata/a", &[0xff, 0xff, 0xff]).await.unwrap();
        let storage = KvStorage::new(backend);
        let err = storage.load_metadata(&SecretPath::parse("a").unwrap()).await.unwrap_err();
        assert!(matches!(err, SecretsError::Internal { .. }));
    }

    #[tokio::test]
    async fn test_list_uses_metadata_namespace() {
        let storage = KvStorage::new(Arc::new(InMemorySecretsBackend::new()));
        let a = SecretPath::parse("app/a").unwrap();
        storage.save_metadata(&a, &SecretMetadata::new(0)).await.unwrap();
        storage.save_data(&a, 1, &SecretData::empty()).await.unwrap();
        storage.save_sequence(&a, 1).await.unwrap();

        assert_eq!(storage.list(&ListPrefix::root()).await.unwrap(), vec!["app/".to_string()]);
        assert_eq!(storage.list(&ListPrefix::parse("app").unwrap()).await.unwrap(), vec!["a".to_string()]);
    }
}
