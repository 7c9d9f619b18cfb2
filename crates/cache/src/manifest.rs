use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

pub const MANIFEST_SCHEMA_VERSION: u32 = 1;

/// Persisted record of what was indexed and under which configuration.
///
/// One manifest per (repository, branch) slot. It is only ever written by a
/// successful build, atomically, and is the authority for cache validity:
/// a fingerprint or hash mismatch against the current inputs makes the slot
/// stale.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Manifest {
    pub schema_version: u32,

    /// Repository identity as supplied by the content provider (e.g. URL)
    pub repository: String,

    pub branch: String,

    /// Resolved commit or whole-content hash of the indexed snapshot
    pub content_hash: String,

    /// Backend identity + dimension + chunking parameters
    pub embedder_fingerprint: String,

    /// Per-file content hash table, keyed by relative path
    pub file_hashes: BTreeMap<String, String>,

    /// Entry count of the paired vector store snapshot
    pub chunk_count: usize,

    pub built_at_unix_ms: u64,
}

impl Manifest {
    #[must_use]
    pub fn new(
        repository: impl Into<String>,
        branch: impl Into<String>,
        content_hash: impl Into<String>,
        embedder_fingerprint: impl Into<String>,
        file_hashes: BTreeMap<String, String>,
        chunk_count: usize,
    ) -> Self {
        Self {
            schema_version: MANIFEST_SCHEMA_VERSION,
            repository: repository.into(),
            branch: branch.into(),
            content_hash: content_hash.into(),
            embedder_fingerprint: embedder_fingerprint.into(),
            file_hashes,
            chunk_count,
            built_at_unix_ms: unix_now_ms(),
        }
    }
}

#[must_use]
pub fn unix_now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
