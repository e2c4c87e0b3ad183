//! Secret path parsing.
//!
//! Raw paths arrive percent-encoded from the transport. They are decoded once
//! here, at the boundary, and normalized:
//! - a leading `/` is dropped
//! - a trailing `/` makes the path a list target, never a secret target
//! - empty, `.` and `..` segments are rejected
//!
//! Everything else (case, spaces, quotes, punctuation) is preserved as given.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::constants::MAX_SECRET_PATH_LENGTH;
use crate::error::Result;
use crate::error::SecretsError;

/// A normalized path identifying one secret's version history.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SecretPath(String);

/// A normalized list prefix: empty (mount root) or ending in `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListPrefix(String);

/// What a raw path addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathTarget {
    /// A single secret.
    Secret(SecretPath),
    /// The children of a prefix.
    List(ListPrefix),
}

impl PathTarget {
    /// Decode and classify a raw, percent-encoded path.
    pub fn parse(raw: &str) -> Result<Self> {
        let decoded = decode(raw)?;
        Self::from_decoded(&decoded)
    }

    /// Classify a path that is already decoded.
    pub fn from_decoded(path: &str) -> Result<Self> {
        let normalized = path.strip_prefix('/').unwrap_or(path);
        if normalized.is_empty() || normalized.ends_with('/') {
            ListPrefix::from_decoded(normalized).map(PathTarget::List)
        } else {
            SecretPath::from_decoded(normalized).map(PathTarget::Secret)
        }
    }
}

impl SecretPath {
    /// Decode and validate a raw, percent-encoded secret path.
    pub fn parse(raw: &str) -> Result<Self> {
        let decoded = decode(raw)?;
        Self::from_decoded(&decoded)
    }

    /// Validate an already-decoded secret path.
    pub fn from_decoded(path: &str) -> Result<Self> {
        let normalized = path.strip_prefix('/').unwrap_or(path);
        if normalized.is_empty() {
            return Err(SecretsError::invalid(path, "path", "secret path is empty"));
        }
        if normalized.ends_with('/') {
            return Err(SecretsError::invalid(
                path,
                "path",
                "a path ending in '/' is a list target, not a secret",
            ));
        }
        validate_segments(path, normalized)?;
        Ok(Self(normalized.to_string()))
    }

    /// The normalized path.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The parent list prefix (the mount root for a top-level secret).
    pub fn parent(&self) -> ListPrefix {
        match self.0.rfind('/') {
            Some(pos) => ListPrefix(self.0[..=pos].to_string()),
            None => ListPrefix(String::new()),
        }
    }

    /// The last path segment.
    pub fn name(&self) -> &str {
        match self.0.rfind('/') {
            Some(pos) => &self.0[pos + 1..],
            None => &self.0,
        }
    }
}

impl ListPrefix {
    /// The mount root.
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Decode and validate a raw, percent-encoded list prefix.
    ///
    /// A missing trailing `/` is added.
    pub fn parse(raw: &str) -> Result<Self> {
        let decoded = decode(raw)?;
        Self::from_decoded(&decoded)
    }

    /// Validate an already-decoded list prefix, adding a trailing `/` if missing.
    pub fn from_decoded(path: &str) -> Result<Self> {
        let normalized = path.strip_prefix('/').unwrap_or(path);
        if normalized.is_empty() {
            return Ok(Self::root());
        }
        let body = normalized.strip_suffix('/').unwrap_or(normalized);
        validate_segments(path, body)?;
        Ok(Self(format!("{body}/")))
    }

    /// The normalized prefix.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for the mount root.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

fn decode(raw: &str) -> Result<String> {
    urlencoding::decode(raw)
        .map(|cow| cow.into_owned())
        .map_err(|e| SecretsError::invalid(raw, "path", format!("invalid percent-encoding: {e}")))
}

fn validate_segments(original: &str, body: &str) -> Result<()> {
    if body.len() > MAX_SECRET_PATH_LENGTH {
        return Err(SecretsError::invalid(
            original,
            "path",
            format!("length {} exceeds max {}", body.len(), MAX_SECRET_PATH_LENGTH),
        ));
    }
    for segment in body.split('/') {
        match segment {
            "" => return Err(SecretsError::invalid(original, "path", "path contains an empty segment")),
            "." | ".." => {
                return Err(SecretsError::invalid(original, "path", "relative segments are not allowed"));
            }
            _ => {}
        }
    }
    Ok(())
}

impl fmt::Display for SecretPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ListPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SecretPath {
    type Error = SecretsError;

    fn try_from(value: String) -> Result<Self> {
        SecretPath::from_decoded(&value)
    }
}

impl From<SecretPath> for String {
    fn from(path: SecretPath) -> Self {
        path.0
    }
}

impl AsRef<str> for SecretPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::plain("app/db", "app/db")]
    #[case::leading_slash("/app/db", "app/db")]
    #[case::space("space%20space", "space space")]
    #[case::quote("%22some/2", "\"some/2")]
    #[case::backslash("%5Csome/2", "\\some/2")]
    #[case::plus_kept("+some/2", "+some/2")]
    #[case::case_preserved("CamelCase/Key", "CamelCase/Key")]
    fn test_parse_secret(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(SecretPath::parse(raw).unwrap().as_str(), expected);
    }

    #[rstest]
    #[case::empty("")]
    #[case::trailing_slash("app/")]
    #[case::double_slash("app//db")]
    #[case::dot_dot("app/../db")]
    fn test_parse_secret_rejects(#[case] raw: &str) {
        let err = SecretPath::parse(raw).unwrap_err();
        assert!(err.is_validation(), "{raw}: {err}");
    }

    #[test]
    fn test_target_classification() {
        assert!(matches!(PathTarget::parse("a/b/").unwrap(), PathTarget::List(p) if p.as_str() == "a/b/"));
        assert!(matches!(PathTarget::parse("").unwrap(), PathTarget::List(p) if p.is_root()));
        assert!(matches!(PathTarget::parse("a/b").unwrap(), PathTarget::Secret(p) if p.as_str() == "a/b"));
    }

    #[test]
    fn test_list_prefix_adds_slash() {
        assert_eq!(ListPrefix::parse("1/2/3").unwrap().as_str(), "1/2/3/");
        assert!(ListPrefix::parse("/").unwrap().is_root());
    }

    #[test]
    fn test_parent_and_name() {
        let path = SecretPath::parse("1/2/3/secret").unwrap();
        assert_eq!(path.parent().as_str(), "1/2/3/");
        assert_eq!(path.name(), "secret");
        assert!(SecretPath::parse("top").unwrap().parent().is_root());
    }
}
