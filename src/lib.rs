//! kvault: a versioned KV secret store with capability-based access control.
//!
//! One [`SecretStore`] is one mount. Callers present a [`PolicySet`]; every
//! operation checks the capability it needs on the matching sub-path
//! (`data/`, `metadata/`, `delete/`, `undelete/`, `destroy/`) before the
//! engine in [`kvault_secrets`] runs it.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use kvault::KvaultConfig;
//! use kvault_secrets::InMemorySecretsBackend;
//!
//! let config = KvaultConfig::load_with_layers(Some(Path::new("kvault.toml")))?;
//! let store = config.build_store(Arc::new(InMemorySecretsBackend::new()));
//! let caller = config.policy_set(&["app-readers"])?;
//!
//! let secret = store.read(&caller, "app/db", None).await?;
//! let perms = store.effective_permissions(&caller, "app/db")?;
//! ```

pub mod config;
pub mod permissions;
pub mod store;
pub mod subpath;

pub use config::ConfigError;
pub use config::EnvOverrides;
pub use config::KvaultConfig;
pub use kvault_auth::Capability;
pub use kvault_auth::CapabilitySet;
pub use kvault_auth::PolicySet;
pub use kvault_secrets::ErrorKind;
pub use kvault_secrets::SecretsError;
pub use permissions::Access;
pub use permissions::EffectivePermissions;
pub use permissions::SubPathCapabilities;
pub use store::ConfigUpdate;
pub use store::SecretStore;
pub use subpath::SubPath;
