//! Effective permissions for one secret path.
//!
//! Everything here is derived from per-sub-path capability sets. No
//! storage is consulted, so the result can be computed before any request is
//! made and used to decide which actions and warnings a UI shows.

use kvault_auth::Capability;
use kvault_auth::CapabilitySet;
use kvault_auth::PolicySet;
use kvault_secrets::KvVersion;

use crate::subpath::SubPath;

/// Message shown when metadata can be written but not read.
pub const METADATA_WRITE_ONLY_WARNING: &str = "In order to edit secret metadata access, the UI requires read permissions; otherwise, data may be deleted. Edits can still be made via the API and CLI.";

/// Message shown when secret data can be written but not read.
pub const DATA_WRITE_ONLY_WARNING: &str =
    "You do not have permission to read this secret. Writing a new version replaces its current contents.";

/// How much of a sub-path the caller can see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// `read` is granted.
    Readable,
    /// `create` or `update` is granted, `read` is not.
    WriteOnly,
    /// None of read, create or update.
    Hidden,
}

impl Access {
    fn from_capabilities(caps: CapabilitySet) -> Self {
        if caps.contains(Capability::Read) {
            Access::Readable
        } else if caps.contains_any(&[Capability::Create, Capability::Update]) {
            Access::WriteOnly
        } else {
            Access::Hidden
        }
    }
}

/// Capability sets for each sub-path of one secret.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubPathCapabilities {
    /// `data/<p>` (or `<p>` on a legacy mount).
    pub data: CapabilitySet,
    /// `metadata/<p>`.
    pub metadata: CapabilitySet,
    /// `metadata/<p>/` (or `<p>/`), where `list` is checked.
    pub list: CapabilitySet,
    /// `delete/<p>`.
    pub delete: CapabilitySet,
    /// `undelete/<p>`.
    pub undelete: CapabilitySet,
    /// `destroy/<p>`.
    pub destroy: CapabilitySet,
}

impl SubPathCapabilities {
    /// Evaluate every sub-path of `path` against `policies`.
    pub fn evaluate(policies: &PolicySet, mount: &str, version: KvVersion, path: &str) -> Self {
        let caps = |sub: SubPath, p: &str| policies.capabilities(&sub.policy_path(mount, version, p));
        let list_path = format!("{path}/");
        match version {
            KvVersion::V2 => Self {
                data: caps(SubPath::Data, path),
                metadata: caps(SubPath::Metadata, path),
                list: caps(SubPath::Metadata, &list_path),
                delete: caps(SubPath::Delete, path),
                undelete: caps(SubPath::Undelete, path),
                destroy: caps(SubPath::Destroy, path),
            },
            KvVersion::V1 => Self {
                data: caps(SubPath::Data, path),
                list: caps(SubPath::Data, &list_path),
                ..Self::default()
            },
        }
    }
}

/// What a caller may do with one secret path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectivePermissions {
    /// Write the first version (`create` or `update` on the data path).
    pub can_create: bool,
    /// Write a new version of an existing secret.
    pub can_update: bool,
    /// Read secret data.
    pub can_read_data: bool,
    /// List children below the path.
    pub can_list: bool,
    /// Soft-delete the latest version.
    pub can_soft_delete_latest: bool,
    /// Soft-delete named versions.
    pub can_soft_delete_versions: bool,
    /// Undelete named versions.
    pub can_undelete: bool,
    /// Destroy named versions.
    pub can_destroy_versions: bool,
    /// Delete the metadata and every version.
    pub can_destroy_all_versions: bool,
    /// Read metadata.
    pub can_read_metadata: bool,
    /// Edit configuration and custom metadata. `create` covers a secret
    /// without a metadata record, `update` an existing one.
    pub can_edit_metadata: bool,
    /// Visibility of secret data.
    pub data_access: Access,
    /// Visibility of metadata.
    pub metadata_access: Access,
}

impl EffectivePermissions {
    /// Derive permissions from per-sub-path capabilities.
    pub fn from_capabilities(version: KvVersion, caps: &SubPathCapabilities) -> Self {
        match version {
            KvVersion::V2 => Self {
                can_create: caps.data.contains_any(&[Capability::Create, Capability::Update]),
                can_update: caps.data.contains(Capability::Update),
                can_read_data: caps.data.contains(Capability::Read),
                can_list: caps.list.contains(Capability::List),
                can_soft_delete_latest: caps.data.contains(Capability::Delete),
                can_soft_delete_versions: caps.delete.contains(Capability::Update),
                can_undelete: caps.undelete.contains(Capability::Update),
                can_destroy_versions: caps.destroy.contains(Capability::Update),
                can_destroy_all_versions: caps.metadata.contains(Capability::Delete),
                can_read_metadata: caps.metadata.contains(Capability::Read),
                can_edit_metadata: caps.metadata.contains_any(&[Capability::Create, Capability::Update]),
                data_access: Access::from_capabilities(caps.data),
                metadata_access: Access::from_capabilities(caps.metadata),
            },
            KvVersion::V1 => Self {
                can_create: caps.data.contains_any(&[Capability::Create, Capability::Update]),
                can_update: caps.data.contains(Capability::Update),
                can_read_data: caps.data.contains(Capability::Read),
                can_list: caps.list.contains(Capability::List),
                can_soft_delete_latest: false,
                can_soft_delete_versions: false,
                can_undelete: false,
                can_destroy_versions: false,
                can_destroy_all_versions: caps.data.contains(Capability::Delete),
                can_read_metadata: false,
                can_edit_metadata: false,
                data_access: Access::from_capabilities(caps.data),
                metadata_access: Access::Hidden,
            },
        }
    }

    /// Whether any delete action is available.
    pub fn can_delete_any(&self) -> bool {
        self.can_soft_delete_latest
            || self.can_soft_delete_versions
            || self.can_destroy_versions
            || self.can_destroy_all_versions
    }

    /// Warning to show on the metadata view, if any.
    pub fn metadata_warning(&self) -> Option<&'static str> {
        (self.metadata_access == Access::WriteOnly).then_some(METADATA_WRITE_ONLY_WARNING)
    }

    /// Warning to show on the data view, if any.
    pub fn data_warning(&self) -> Option<&'static str> {
        (self.data_access == Access::WriteOnly).then_some(DATA_WRITE_ONLY_WARNING)
    }
}
