//! Tiger Style constants for policy evaluation.
//!
//! These constants bound policy size so that compiling and evaluating a
//! policy set stays predictable.

/// Maximum number of rules in a single policy (1,024).
///
/// Tiger Style: Bounded to prevent oversized policy documents.
pub const MAX_RULES_PER_POLICY: usize = 1_024;

/// Maximum length of a path pattern in bytes (1 KB).
pub const MAX_PATTERN_LENGTH: usize = 1_024;

/// Maximum number of policies attached to a single caller (64).
pub const MAX_POLICIES_PER_CALLER: usize = 64;

/// Maximum policy name length in bytes (128).
pub const MAX_POLICY_NAME_LENGTH: usize = 128;
