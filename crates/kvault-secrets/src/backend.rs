//! Storage backend trait for the secrets engine.
//!
//! Provides an abstraction layer between the KV engine and the underlying
//! byte store. Only an in-memory backend ships with this crate; durable
//! storage is plugged in by implementing [`SecretsBackend`].

use std::collections::BTreeSet;
use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;

/// Storage backend for the secrets engine.
///
/// Single-key operations must be atomic: a `get` observes either the whole
/// previous value or the whole new one.
#[async_trait]
pub trait SecretsBackend: Send + Sync {
    /// Store a value at the given path.
    async fn put(&self, path: &str, value: &[u8]) -> Result<()>;

    /// Get a value at the given path.
    ///
    /// Returns `None` if the path doesn't exist.
    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>>;

    /// Delete a value at the given path.
    ///
    /// Returns `true` if the value existed and was deleted.
    async fn delete(&self, path: &str) -> Result<bool>;

    /// List the immediate children under a prefix.
    ///
    /// Returns relative names, sorted. Names ending in `/` are "directories"
    /// (prefixes with children).
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Check if a path exists.
    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.get(path).await?.is_some())
    }
}

/// In-memory secrets backend.
#[derive(Default)]
pub struct InMemorySecretsBackend {
    data: tokio::sync::RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemorySecretsBackend {
    /// Create a new in-memory backend.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecretsBackend for InMemorySecretsBackend {
    async fn put(&self, path: &str, value: &[u8]) -> Result<()> {
        let mut data = self.data.write().await;
        data.insert(path.to_string(), value.to_vec());
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let data = self.data.read().await;
        Ok(data.get(path).cloned())
    }

    async fn delete(&self, path: &str) -> Result<bool> {
        let mut data = self.data.write().await;
        Ok(data.remove(path).is_some())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let data = self.data.read().await;
        let mut keys = BTreeSet::new();

        for key in data.keys() {
            if let Some(relative) = key.strip_prefix(prefix) {
                if let Some(slash_pos) = relative.find('/') {
                    keys.insert(format!("{}/", &relative[..slash_pos]));
                } else if !relative.is_empty() {
                    keys.insert(relative.to_string());
                }
            }
        }

        Ok(keys.into_iter().collect())
    }
}
