//! Error types for the KV secrets engine.
//!
//! Every caller-facing variant carries the secret path and, where it applies,
//! the offending version or field, so a UI can render a targeted message.

use kvault_auth::Capability;
use thiserror::Error;

/// Errors returned by the secrets engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SecretsError {
    /// Unknown path, unknown version, or a destroyed/pruned version.
    #[error("secret not found: {path}{}", version_suffix(.version))]
    NotFound {
        /// Secret path.
        path: String,
        /// Requested version, if one was named.
        version: Option<u64>,
    },

    /// The version is soft-deleted and can still be undeleted.
    #[error("secret version {version} at {path} is deleted (since {deletion_time_unix_ms}ms)")]
    VersionDeleted {
        /// Secret path.
        path: String,
        /// Deleted version.
        version: u64,
        /// When the version was (or was scheduled to be) deleted.
        deletion_time_unix_ms: u64,
    },

    /// A check-and-set write named a stale or missing version.
    #[error("check-and-set failed for {path}: expected {}, current version is {actual}", expected_display(.expected))]
    CasMismatch {
        /// Secret path.
        path: String,
        /// The `cas` value the caller supplied (None when CAS was required but absent).
        expected: Option<u64>,
        /// The secret's current version at commit time.
        actual: u64,
    },

    /// A custom metadata entry broke a key/value rule.
    #[error("custom_metadata validation failed: {reason}")]
    CustomMetadataValidation {
        /// Secret path.
        path: String,
        /// Offending custom metadata key.
        key: String,
        /// What rule was broken.
        reason: String,
    },

    /// The caller lacks the capability an operation requires.
    #[error("permission denied: {operation} on {path} requires '{capability}'")]
    PermissionDenied {
        /// The policy path that was checked.
        path: String,
        /// The missing capability.
        capability: Capability,
        /// The operation that was attempted.
        operation: String,
    },

    /// Malformed request argument.
    #[error("invalid {field} for {path}: {reason}")]
    InvalidArgument {
        /// Secret path (or raw input when the path itself is invalid).
        path: String,
        /// Offending field.
        field: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The storage backend failed.
    #[error("storage backend error: {reason}")]
    Backend {
        /// Backend error description.
        reason: String,
    },

    /// A record could not be encoded.
    #[error("serialization error: {reason}")]
    Serialization {
        /// Encoder error description.
        reason: String,
    },

    /// Internal consistency error (e.g. corrupted record).
    #[error("internal error: {reason}")]
    Internal {
        /// Description of the internal error.
        reason: String,
    },
}

fn version_suffix(version: &Option<u64>) -> String {
    match version {
        Some(v) => format!(" (version {v})"),
        None => String::new(),
    }
}

fn expected_display(expected: &Option<u64>) -> String {
    match expected {
        Some(v) => v.to_string(),
        None => "a cas value".to_string(),
    }
}

/// Coarse error category, for callers that only branch on the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`SecretsError::NotFound`].
    NotFound,
    /// See [`SecretsError::VersionDeleted`].
    VersionDeleted,
    /// See [`SecretsError::CasMismatch`].
    CasMismatch,
    /// See [`SecretsError::CustomMetadataValidation`].
    CustomMetadataValidation,
    /// See [`SecretsError::PermissionDenied`].
    PermissionDenied,
    /// See [`SecretsError::InvalidArgument`].
    InvalidArgument,
    /// Backend, serialization or internal failures.
    Storage,
}

impl SecretsError {
    /// The error's category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SecretsError::NotFound { .. } => ErrorKind::NotFound,
            SecretsError::VersionDeleted { .. } => ErrorKind::VersionDeleted,
            SecretsError::CasMismatch { .. } => ErrorKind::CasMismatch,
            SecretsError::CustomMetadataValidation { .. } => ErrorKind::CustomMetadataValidation,
            SecretsError::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            SecretsError::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            SecretsError::Backend { .. } | SecretsError::Serialization { .. } | SecretsError::Internal { .. } => {
                ErrorKind::Storage
            }
        }
    }

    /// Returns true for errors detected before any mutation was attempted.
    pub fn is_validation(&self) -> bool {
        matches!(self.kind(), ErrorKind::CustomMetadataValidation | ErrorKind::InvalidArgument)
    }

    /// The secret or policy path this error refers to, if any.
    pub fn path(&self) -> Option<&str> {
        match self {
            SecretsError::NotFound { path, .. }
            | SecretsError::VersionDeleted { path, .. }
            | SecretsError::CasMismatch { path, .. }
            | SecretsError::CustomMetadataValidation { path, .. }
            | SecretsError::PermissionDenied { path, .. }
            | SecretsError::InvalidArgument { path, .. } => Some(path),
            SecretsError::Backend { .. } | SecretsError::Serialization { .. } | SecretsError::Internal { .. } => None,
        }
    }

    pub(crate) fn invalid(path: impl Into<String>, field: &str, reason: impl Into<String>) -> Self {
        SecretsError::InvalidArgument {
            path: path.into(),
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn not_found(path: impl Into<String>, version: Option<u64>) -> Self {
        SecretsError::NotFound {
            path: path.into(),
            version,
        }
    }
}

/// Result type for secrets operations.
pub type Result<T, E = SecretsError> = std::result::Result<T, E>;
