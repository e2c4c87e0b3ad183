//! Error types for policy compilation.
//!
//! Uses thiserror for derive macro error implementation as per project conventions.

use thiserror::Error;

/// Errors that can occur while compiling policy documents.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Policy name is empty or too long.
    #[error("invalid policy name '{name}': must be 1..={max} bytes")]
    InvalidPolicyName {
        /// The rejected name.
        name: String,
        /// Maximum allowed length.
        max: usize,
    },

    /// A path pattern could not be compiled.
    #[error("invalid path pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The rejected pattern.
        pattern: String,
        /// Why the pattern was rejected.
        reason: String,
    },

    /// A rule names a capability outside {create, read, update, delete, list}.
    #[error("unknown capability '{name}'")]
    UnknownCapability {
        /// The unrecognized capability name.
        name: String,
    },

    /// Policy has too many rules.
    #[error("too many rules in policy '{policy}': {count} exceeds max {max}")]
    TooManyRules {
        /// Policy name.
        policy: String,
        /// Number of rules supplied.
        count: usize,
        /// Maximum allowed.
        max: usize,
    },

    /// Caller has too many policies attached.
    #[error("too many policies: {count} exceeds max {max}")]
    TooManyPolicies {
        /// Number of policies supplied.
        count: usize,
        /// Maximum allowed.
        max: usize,
    },
}

/// Result type for policy operations.
pub type Result<T, E = AuthError> = std::result::Result<T, E>;
