//! Pre-flight validation.
//!
//! Everything here runs before a mutation touches storage. A request that
//! fails any check leaves the secret exactly as it was.

use std::collections::BTreeMap;

use crate::constants::MAX_CUSTOM_METADATA_BYTES;
use crate::constants::MAX_CUSTOM_METADATA_KEY_LENGTH;
use crate::constants::MAX_CUSTOM_METADATA_KEYS;
use crate::constants::MAX_CUSTOM_METADATA_VALUE_LENGTH;
use crate::constants::MAX_KV_PAIRS_PER_SECRET;
use crate::constants::MAX_KV_SECRET_SIZE;
use crate::constants::MAX_SECRET_KEY_NAME_LENGTH;
use crate::constants::MAX_VERSIONS_PER_REQUEST;
use crate::constants::MAX_VERSIONS_PER_SECRET;
use crate::error::Result;
use crate::error::SecretsError;
use crate::kv::types::SecretData;
use crate::path::SecretPath;

/// Validate a secret payload against the size bounds.
pub fn validate_data(path: &SecretPath, data: &SecretData) -> Result<()> {
    if data.data.len() > MAX_KV_PAIRS_PER_SECRET {
        return Err(SecretsError::invalid(
            path.as_str(),
            "data",
            format!("{} keys exceeds max {}", data.data.len(), MAX_KV_PAIRS_PER_SECRET),
        ));
    }

    for k in data.data.keys() {
        if k.is_empty() {
            return Err(SecretsError::invalid(path.as_str(), "data", "empty key name"));
        }
        if k.len() > MAX_SECRET_KEY_NAME_LENGTH {
            return Err(SecretsError::invalid(
                path.as_str(),
                "data",
                format!("key name length {} exceeds max {}", k.len(), MAX_SECRET_KEY_NAME_LENGTH),
            ));
        }
    }

    let size = data.size_bytes();
    if size > MAX_KV_SECRET_SIZE {
        return Err(SecretsError::invalid(
            path.as_str(),
            "data",
            format!("size {} exceeds max {}", size, MAX_KV_SECRET_SIZE),
        ));
    }

    Ok(())
}

/// Validate a requested `max_versions` value.
///
/// `allow_default` permits 0, which means "use the mount default".
pub fn validate_max_versions(path: &SecretPath, max_versions: u32, allow_default: bool) -> Result<()> {
    if max_versions == 0 && !allow_default {
        return Err(SecretsError::invalid(path.as_str(), "max_versions", "must be at least 1"));
    }
    if max_versions > MAX_VERSIONS_PER_SECRET {
        return Err(SecretsError::invalid(
            path.as_str(),
            "max_versions",
            format!("{} exceeds max {}", max_versions, MAX_VERSIONS_PER_SECRET),
        ));
    }
    Ok(())
}

/// Validate the version list of a delete/undelete/destroy request.
pub fn validate_version_list(path: &SecretPath, versions: &[u64], allow_empty: bool) -> Result<()> {
    if versions.is_empty() && !allow_empty {
        return Err(SecretsError::invalid(path.as_str(), "versions", "no versions specified"));
    }
    if versions.len() > MAX_VERSIONS_PER_REQUEST {
        return Err(SecretsError::invalid(
            path.as_str(),
            "versions",
            format!("{} versions exceeds max {}", versions.len(), MAX_VERSIONS_PER_REQUEST),
        ));
    }
    if versions.contains(&0) {
        return Err(SecretsError::invalid(path.as_str(), "versions", "version numbers start at 1"));
    }
    Ok(())
}

fn custom_metadata_error(path: &SecretPath, key: &str, reason: String) -> SecretsError {
    SecretsError::CustomMetadataValidation {
        path: path.to_string(),
        key: key.to_string(),
        reason,
    }
}

/// Validate a batch of custom metadata entries as merged into `existing`.
///
/// Per-entry rules are checked for every entry in `entries`; the key-count and
/// aggregate size limits are checked against the merged result.
pub fn validate_custom_metadata(
    path: &SecretPath,
    existing: &BTreeMap<String, String>,
    entries: &BTreeMap<String, String>,
) -> Result<()> {
    for (key, value) in entries {
        if key.is_empty() {
            return Err(custom_metadata_error(path, key, "keys must not be empty".to_string()));
        }
        if key.len() > MAX_CUSTOM_METADATA_KEY_LENGTH {
            return Err(custom_metadata_error(
                path,
                key,
                format!("length of key \"{}\" is {} which exceeds max {}", key, key.len(), MAX_CUSTOM_METADATA_KEY_LENGTH),
            ));
        }
        if value.is_empty() {
            return Err(custom_metadata_error(path, key, format!("value for key \"{key}\" must not be empty")));
        }
        if value.len() > MAX_CUSTOM_METADATA_VALUE_LENGTH {
            return Err(custom_metadata_error(
                path,
                key,
                format!(
                    "length of value for key \"{}\" is {} which exceeds max {}",
                    key,
                    value.len(),
                    MAX_CUSTOM_METADATA_VALUE_LENGTH
                ),
            ));
        }
        if value.contains('\\') {
            return Err(custom_metadata_error(path, key, "Custom values cannot contain a backward slash.".to_string()));
        }
    }

    let mut merged = existing.clone();
    merged.extend(entries.iter().map(|(k, v)| (k.clone(), v.clone())));

    if merged.len() > MAX_CUSTOM_METADATA_KEYS {
        let key = entries.keys().next().map(String::as_str).unwrap_or_default();
        return Err(custom_metadata_error(
            path,
            key,
            format!("{} keys exceeds max {}", merged.len(), MAX_CUSTOM_METADATA_KEYS),
        ));
    }

    let total: usize = merged.iter().map(|(k, v)| k.len() + v.len()).sum();
    if total > MAX_CUSTOM_METADATA_BYTES {
        let key = entries.keys().next().map(String::as_str).unwrap_or_default();
        return Err(custom_metadata_error(
            path,
            key,
            format!("total size {} bytes exceeds max {}", total, MAX_CUSTOM_METADATA_BYTES),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn path() -> SecretPath {
        SecretPath::parse("app/db").unwrap()
    }

    fn entries(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[rstest]
    #[case::backslash("team", "a\\b", "backward slash")]
    #[case::empty_value("team", "", "must not be empty")]
    #[case::empty_key("", "x", "keys must not be empty")]
    fn test_custom_metadata_rejects(#[case] key: &str, #[case] value: &str, #[case] fragment: &str) {
        let err = validate_custom_metadata(&path(), &BTreeMap::new(), &entries(&[(key, value)])).unwrap_err();
        assert!(err.to_string().contains(fragment), "{err}");
        assert!(err.is_validation());
    }

    #[test]
    fn test_long_key_message() {
        let key = "k".repeat(MAX_CUSTOM_METADATA_KEY_LENGTH + 1);
        let err = validate_custom_metadata(&path(), &BTreeMap::new(), &entries(&[(&key, "v")])).unwrap_err();
        assert!(err.to_string().starts_with("custom_metadata validation failed: length of key"));
    }

    #[test]
    fn test_key_count_counts_merged_result() {
        let existing: BTreeMap<String, String> =
            (0..MAX_CUSTOM_METADATA_KEYS).map(|i| (format!("k{i}"), "v".to_string())).collect();
        // Overwriting an existing key keeps the count.
        assert!(validate_custom_metadata(&path(), &existing, &entries(&[("k0", "w")])).is_ok());
        assert!(validate_custom_metadata(&path(), &existing, &entries(&[("new", "w")])).is_err());
    }

    #[rstest]
    #[case::zero_rejected(0, false, false)]
    #[case::zero_default(0, true, true)]
    #[case::one(1, false, true)]
    #[case::too_many(MAX_VERSIONS_PER_SECRET + 1, true, false)]
    fn test_max_versions(#[case] value: u32, #[case] allow_default: bool, #[case] ok: bool) {
        assert_eq!(validate_max_versions(&path(), value, allow_default).is_ok(), ok);
    }

    #[test]
    fn test_version_list() {
        assert!(validate_version_list(&path(), &[], true).is_ok());
        assert!(validate_version_list(&path(), &[], false).is_err());
        assert!(validate_version_list(&path(), &[0], true).is_err());
        assert!(validate_version_list(&path(), &[1, 2], false).is_ok());
    }

    #[test]
    fn test_data_bounds() {
        let mut data = SecretData::empty();
        data.insert("".into(), "v".into());
        assert!(validate_data(&path(), &data).is_err());

        let data: SecretData = [("user", "admin")].into_iter().collect();
        assert!(validate_data(&path(), &data).is_ok());
    }
}
