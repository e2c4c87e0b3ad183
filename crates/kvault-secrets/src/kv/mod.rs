//! KV secrets engine.
//!
//! Provides versioned key-value secrets storage with:
//! - Multiple versions per secret, numbered monotonically and never reused
//! - Soft delete and undelete
//! - Hard delete (destroy) and `max_versions` pruning
//! - Check-and-set writes
//! - Per-secret configuration and custom metadata
//! - Time-based version expiration
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use kvault_secrets::kv::{KvStore, DefaultKvStore, WriteSecretRequest, ReadSecretRequest, SecretData};
//! use kvault_secrets::backend::InMemorySecretsBackend;
//! use kvault_secrets::SecretPath;
//! use std::sync::Arc;
//!
//! // Create a store
//! let backend = Arc::new(InMemorySecretsBackend::new());
//! let store = DefaultKvStore::new(backend);
//!
//! // Write a secret
//! let path = SecretPath::parse("db/creds")?;
//! let data: SecretData = [("username", "admin")].into_iter().collect();
//! store.write(WriteSecretRequest::new(path.clone(), data)).await?;
//!
//! // Read it back
//! let secret = store.read(ReadSecretRequest::new(path)).await?;
//! println!("username: {:?}", secret.data.get("username"));
//! ```

mod metadata;
mod storage;
mod store;
mod types;
mod validation;
mod versions;

pub use metadata::MetadataStore;
pub use store::DefaultKvStore;
pub use store::KvStore;
pub use types::DeleteSecretRequest;
pub use types::DestroySecretRequest;
pub use types::KvConfig;
pub use types::KvVersion;
pub use types::ListEntry;
pub use types::ListEntryKind;
pub use types::ListSecretsRequest;
pub use types::ListSecretsResponse;
pub use types::ReadSecretRequest;
pub use types::ReadSecretResponse;
pub use types::SecretData;
pub use types::SecretMetadata;
pub use types::UndeleteSecretRequest;
pub use types::UpdateConfigRequest;
pub use types::VersionMetadata;
pub use types::VersionState;
pub use types::VersionStatus;
pub use types::WriteOptions;
pub use types::WriteSecretRequest;
pub use types::WriteSecretResponse;
pub use versions::VersionManager;
