//! Mount configuration.
//!
//! Configuration is loaded in layers with the following precedence (lowest to highest):
//! 1. Built-in defaults
//! 2. TOML configuration file
//! 3. Environment variables (KVAULT_*)

use std::path::Path;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use kvault_auth::AuthError;
use kvault_auth::Policy;
use kvault_auth::PolicyDocument;
use kvault_auth::PolicySet;
use kvault_secrets::KvVersion;
use kvault_secrets::MAX_VERSIONS_PER_SECRET;
use kvault_secrets::SecretsBackend;
use kvault_secrets::kv::KvConfig;
use serde::Deserialize;
use serde::Serialize;
use snafu::ResultExt;
use snafu::Snafu;

use crate::store::SecretStore;
use crate::subpath::normalize_mount;

/// Configuration for one kvault mount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KvaultConfig {
    /// Mount name; policy paths start with it. May contain `/`.
    #[serde(default = "default_mount")]
    pub mount: String,

    /// KV engine settings.
    #[serde(default)]
    pub kv: KvConfig,

    /// Policies available to callers of this mount.
    #[serde(default)]
    pub policies: Vec<PolicyDocument>,
}

impl Default for KvaultConfig {
    fn default() -> Self {
        Self {
            mount: default_mount(),
            kv: KvConfig::default(),
            policies: Vec::new(),
        }
    }
}

/// Values read from `KVAULT_*` environment variables. `None` = not set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    /// `KVAULT_MOUNT`
    pub mount: Option<String>,
    /// `KVAULT_MAX_VERSIONS`
    pub max_versions: Option<u32>,
    /// `KVAULT_CAS_REQUIRED`
    pub cas_required: Option<bool>,
    /// `KVAULT_DELETE_VERSION_AFTER_SECS`
    pub delete_version_after_secs: Option<u64>,
    /// `KVAULT_KV_VERSION` (`1` or `2`)
    pub kv_version: Option<KvVersion>,
}

impl EnvOverrides {
    /// Read overrides from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read overrides through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            mount: lookup("KVAULT_MOUNT"),
            max_versions: parse_var(&lookup, "KVAULT_MAX_VERSIONS")?,
            cas_required: parse_var(&lookup, "KVAULT_CAS_REQUIRED")?,
            delete_version_after_secs: parse_var(&lookup, "KVAULT_DELETE_VERSION_AFTER_SECS")?,
            kv_version: parse_var(&lookup, "KVAULT_KV_VERSION")?,
        })
    }

    /// Apply the overrides that are set.
    pub fn apply(self, config: &mut KvaultConfig) {
        if let Some(mount) = self.mount {
            config.mount = mount;
        }
        if let Some(max_versions) = self.max_versions {
            config.kv.max_versions = max_versions;
        }
        if let Some(cas_required) = self.cas_required {
            config.kv.cas_required = cas_required;
        }
        if let Some(secs) = self.delete_version_after_secs {
            config.kv.delete_version_after = Duration::from_secs(secs);
        }
        if let Some(version) = self.kv_version {
            config.kv.version = version;
        }
    }
}

impl KvaultConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).context(ReadFileSnafu { path })?;
        let config: Self = toml::from_str(&content).context(ParseTomlSnafu { path })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from defaults plus environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        EnvOverrides::from_env()?.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Load defaults, then the optional file, then the environment.
    pub fn load_with_layers(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_lookup(path, |key| std::env::var(key).ok())
    }

    /// [`load_with_layers`](Self::load_with_layers) with an explicit
    /// environment lookup.
    pub fn load_with_lookup(path: Option<&Path>, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path).context(ReadFileSnafu { path })?;
                toml::from_str(&content).context(ParseTomlSnafu { path })?
            }
            None => Self::default(),
        };
        EnvOverrides::from_lookup(lookup)?.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if normalize_mount(&self.mount).is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "mount".into(),
                reason: "mount name must not be empty".into(),
            });
        }
        if self.kv.max_versions == 0 || self.kv.max_versions > MAX_VERSIONS_PER_SECRET {
            return Err(ConfigError::InvalidValue {
                key: "kv.max_versions".into(),
                reason: format!("must be between 1 and {}", MAX_VERSIONS_PER_SECRET),
            });
        }
        if self.kv.version == KvVersion::V1 && self.kv.cas_required {
            return Err(ConfigError::InvalidValue {
                key: "kv.cas_required".into(),
                reason: "not supported on a version 1 mount".into(),
            });
        }
        self.compile_policies()?;
        Ok(())
    }

    /// Compile the configured policy documents.
    pub fn compile_policies(&self) -> Result<Vec<Policy>, ConfigError> {
        self.policies
            .iter()
            .map(|doc| Policy::try_from(doc.clone()).context(PolicySnafu { name: doc.name.clone() }))
            .collect()
    }

    /// Policy set holding the named policies, in the given order.
    pub fn policy_set(&self, names: &[&str]) -> Result<PolicySet, ConfigError> {
        let compiled = self.compile_policies()?;
        let mut selected = Vec::with_capacity(names.len());
        for name in names {
            let policy = compiled.iter().find(|p| p.name() == *name).ok_or_else(|| ConfigError::InvalidValue {
                key: "policies".into(),
                reason: format!("no policy named '{name}'"),
            })?;
            selected.push(Arc::new(policy.clone()));
        }
        PolicySet::new(selected).context(PolicySnafu {
            name: names.join(","),
        })
    }

    /// Build the mount over `backend`.
    pub fn build_store(&self, backend: Arc<dyn SecretsBackend>) -> SecretStore {
        SecretStore::new(&self.mount, self.kv.clone(), backend)
    }
}

fn default_mount() -> String {
    "secret".into()
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        Some(value) => value.trim().parse().map(Some).map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            reason: format!("cannot parse '{value}'"),
        }),
        None => Ok(None),
    }
}

/// Configuration loading and parsing errors.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ConfigError {
    #[snafu(display("failed to read config file {}: {source}", path.display()))]
    ReadFile { path: PathBuf, source: std::io::Error },

    #[snafu(display("failed to parse TOML config file {}: {source}", path.display()))]
    ParseToml { path: PathBuf, source: toml::de::Error },

    #[snafu(display("invalid configuration value for {key}: {reason}"))]
    InvalidValue { key: String, reason: String },

    #[snafu(display("invalid policy '{name}': {source}"))]
    Policy { name: String, source: AuthError },
}
