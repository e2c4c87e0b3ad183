//! Tiger Style constants for the KV secrets engine.
//!
//! Fixed limits keep secret records, metadata and request sizes bounded.

/// Default number of versions retained per secret (10).
pub const DEFAULT_MAX_VERSIONS: u32 = 10;

/// Upper bound accepted for a `max_versions` setting (1,000).
///
/// Tiger Style: Bounded so a single secret cannot hold unbounded history.
pub const MAX_VERSIONS_PER_SECRET: u32 = 1_000;

/// Maximum history entries (live versions plus erased markers) kept per secret (2,000).
///
/// Beyond this the oldest destroyed/pruned markers are dropped.
pub const MAX_VERSION_HISTORY: usize = 2_000;

/// Maximum number of versions named in a single delete/undelete/destroy request (100).
pub const MAX_VERSIONS_PER_REQUEST: usize = 100;

/// Maximum secret path length in bytes (512).
pub const MAX_SECRET_PATH_LENGTH: usize = 512;

/// Maximum number of key-value pairs in one secret version (256).
pub const MAX_KV_PAIRS_PER_SECRET: usize = 256;

/// Maximum length of a key inside a secret payload (256 bytes).
pub const MAX_SECRET_KEY_NAME_LENGTH: usize = 256;

/// Maximum total payload size of one secret version (512 KB).
pub const MAX_KV_SECRET_SIZE: usize = 512 * 1024;

/// Maximum number of custom metadata keys per secret (64).
pub const MAX_CUSTOM_METADATA_KEYS: usize = 64;

/// Maximum custom metadata key length (128 bytes).
pub const MAX_CUSTOM_METADATA_KEY_LENGTH: usize = 128;

/// Maximum custom metadata value length (512 bytes).
pub const MAX_CUSTOM_METADATA_VALUE_LENGTH: usize = 512;

/// Maximum aggregate size of all custom metadata keys and values (16 KB).
pub const MAX_CUSTOM_METADATA_BYTES: usize = 16 * 1024;

/// Storage prefix for per-secret metadata records.
pub const METADATA_PREFIX: &str = "metadata/";

/// Storage prefix for version payloads.
pub const DATA_PREFIX: &str = "data/";

/// Storage prefix for per-secret version sequence counters.
pub const SEQUENCE_PREFIX: &str = "sequence/";
