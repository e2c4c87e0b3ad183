//! Logical sub-path namespace of a mount.
//!
//! A versioned mount exposes each secret under five policy paths:
//! `data/`, `metadata/`, `delete/`, `undelete/` and `destroy/`. A legacy
//! mount has no sub-paths; policies name `<mount>/<path>` directly.

use std::fmt;

use kvault_secrets::KvVersion;

/// One of the per-mount sub-path namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubPath {
    /// Secret payloads.
    Data,
    /// Version bookkeeping, configuration and custom metadata.
    Metadata,
    /// Soft delete of named versions.
    Delete,
    /// Undelete of named versions.
    Undelete,
    /// Destroy of named versions.
    Destroy,
}

impl SubPath {
    /// All sub-paths.
    pub const ALL: [SubPath; 5] = [
        SubPath::Data,
        SubPath::Metadata,
        SubPath::Delete,
        SubPath::Undelete,
        SubPath::Destroy,
    ];

    /// The sub-path segment.
    pub fn as_str(&self) -> &'static str {
        match self {
            SubPath::Data => "data",
            SubPath::Metadata => "metadata",
            SubPath::Delete => "delete",
            SubPath::Undelete => "undelete",
            SubPath::Destroy => "destroy",
        }
    }

    /// The policy path checked for `path` under this sub-path.
    ///
    /// `path` is a normalized secret path or list prefix (no leading `/`).
    /// On a legacy mount the sub-path is dropped.
    pub fn policy_path(&self, mount: &str, version: KvVersion, path: &str) -> String {
        match version {
            KvVersion::V2 => format!("{}/{}/{}", mount, self.as_str(), path),
            KvVersion::V1 => format!("{}/{}", mount, path),
        }
    }
}

impl fmt::Display for SubPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalize a mount name: no leading or trailing `/`.
pub fn normalize_mount(mount: &str) -> String {
    mount.trim_matches('/').to_string()
}
