//! Versioned KV secrets engine for kvault.
//!
//! - **Version Manager**: ordered version history per path, check-and-set
//!   writes, soft delete, undelete, destroy and `max_versions` pruning.
//! - **Metadata Store**: per-path configuration (`max_versions`,
//!   `cas_required`, `delete_version_after`) and custom metadata.
//! - **Storage**: records are postcard-encoded into a [`SecretsBackend`].
//!
//! Policy evaluation lives one layer up. Mutations may carry
//! [`AccessCheck`]s, which the engine settles under the path lock once it
//! knows whether the secret exists.

pub mod access;
pub mod backend;
pub mod clock;
pub mod constants;
pub mod error;
pub mod kv;
pub mod locks;
pub mod path;

pub use access::AccessCheck;
pub use backend::InMemorySecretsBackend;
pub use backend::SecretsBackend;
pub use clock::Clock;
pub use clock::ManualClock;
pub use clock::SystemClock;
pub use constants::*;
pub use error::ErrorKind;
pub use error::Result;
pub use error::SecretsError;
pub use kv::DefaultKvStore;
pub use kv::KvConfig;
pub use kv::KvStore;
pub use kv::KvVersion;
pub use kv::MetadataStore;
pub use kv::SecretData;
pub use kv::SecretMetadata;
pub use kv::VersionManager;
pub use locks::PathLocks;
pub use path::ListPrefix;
pub use path::PathTarget;
pub use path::SecretPath;
