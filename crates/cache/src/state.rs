use crate::manifest::{Manifest, MANIFEST_SCHEMA_VERSION};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// State of one (repository, branch) cache slot.
///
/// `Building` is a runtime-only state held while a build lock is taken; it
/// is never persisted. Transitions:
/// `Absent -> Building -> Valid`, `Valid -> Stale -> Building -> Valid`,
/// and a failed build leaves the prior state untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotState {
    Absent,
    Valid,
    Stale,
    Building,
}

/// Why a slot was judged stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaleReason {
    ManifestMissing,
    ManifestCorrupt,
    IndexMissing,
    /// Embedder or chunking configuration changed; auto-invalidates the
    /// cache instead of silently serving vectors from another config
    FingerprintMismatch,
    /// Resolved repository content hash moved
    ContentMismatch,
    /// Per-file hash table differs from the snapshot
    FileHashMismatch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaleAssessment {
    pub state: SlotState,
    pub reasons: Vec<StaleReason>,
}

/// Current build inputs a stored manifest is compared against.
#[derive(Debug, Clone)]
pub struct BuildInputs<'a> {
    pub content_hash: &'a str,
    pub embedder_fingerprint: &'a str,
    pub file_hashes: &'a BTreeMap<String, String>,
}

/// Decide hit vs. rebuild for a slot.
///
/// `manifest` is the stored manifest if it parsed; `manifest_corrupt` marks
/// an unreadable one. A half-written slot (manifest without index, or the
/// reverse) is detected here and treated as stale, never silently loaded.
#[must_use]
pub fn assess_staleness(
    manifest: Option<&Manifest>,
    manifest_corrupt: bool,
    index_exists: bool,
    current: &BuildInputs<'_>,
) -> StaleAssessment {
    let mut reasons = Vec::new();

    let Some(manifest) = manifest else {
        if manifest_corrupt {
            reasons.push(StaleReason::ManifestCorrupt);
            if !index_exists {
                reasons.push(StaleReason::IndexMissing);
            }
            return StaleAssessment {
                state: SlotState::Stale,
                reasons,
            };
        }
        return StaleAssessment {
            state: SlotState::Absent,
            reasons: vec![StaleReason::ManifestMissing],
        };
    };

    if manifest.schema_version != MANIFEST_SCHEMA_VERSION {
        reasons.push(StaleReason::ManifestCorrupt);
    }
    if !index_exists {
        reasons.push(StaleReason::IndexMissing);
    }
    if manifest.embedder_fingerprint != current.embedder_fingerprint {
        reasons.push(StaleReason::FingerprintMismatch);
    }
    if manifest.content_hash != current.content_hash {
        reasons.push(StaleReason::ContentMismatch);
    }
    if &manifest.file_hashes != current.file_hashes {
        reasons.push(StaleReason::FileHashMismatch);
    }

    if reasons.is_empty() {
        StaleAssessment {
            state: SlotState::Valid,
            reasons,
        }
    } else {
        StaleAssessment {
            state: SlotState::Stale,
            reasons,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn manifest(fingerprint: &str, content: &str, files: &[(&str, &str)]) -> Manifest {
        Manifest::new(
            "https://example.com/repo.git",
            "main",
            content,
            fingerprint,
            files
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            7,
        )
    }

    fn inputs<'a>(
        fingerprint: &'a str,
        content: &'a str,
        files: &'a BTreeMap<String, String>,
    ) -> BuildInputs<'a> {
        BuildInputs {
            content_hash: content,
            embedder_fingerprint: fingerprint,
            file_hashes: files,
        }
    }

    #[test]
    fn absent_when_no_manifest() {
        let files = BTreeMap::new();
        let out = assess_staleness(None, false, false, &inputs("fp", "c1", &files));
        assert_eq!(out.state, SlotState::Absent);
        assert_eq!(out.reasons, vec![StaleReason::ManifestMissing]);
    }

    #[test]
    fn stale_when_manifest_corrupt() {
        let files = BTreeMap::new();
        let out = assess_staleness(None, true, true, &inputs("fp", "c1", &files));
        assert_eq!(out.state, SlotState::Stale);
        assert_eq!(out.reasons, vec![StaleReason::ManifestCorrupt]);
    }

    #[test]
    fn stale_when_index_file_missing() {
        let m = manifest("fp", "c1", &[("a.rs", "h1")]);
        let files = m.file_hashes.clone();
        let out = assess_staleness(Some(&m), false, false, &inputs("fp", "c1", &files));
        assert_eq!(out.state, SlotState::Stale);
        assert_eq!(out.reasons, vec![StaleReason::IndexMissing]);
    }

    #[test]
    fn stale_when_fingerprint_changes() {
        let m = manifest("fp-old", "c1", &[("a.rs", "h1")]);
        let files = m.file_hashes.clone();
        let out = assess_staleness(Some(&m), false, true, &inputs("fp-new", "c1", &files));
        assert_eq!(out.state, SlotState::Stale);
        assert_eq!(out.reasons, vec![StaleReason::FingerprintMismatch]);
    }

    #[test]
    fn stale_when_one_file_hash_moves() {
        let m = manifest("fp", "c1", &[("a.rs", "h1"), ("b.rs", "h2")]);
        let mut files = m.file_hashes.clone();
        files.insert("b.rs".to_string(), "h2-modified".to_string());
        let out = assess_staleness(Some(&m), false, true, &inputs("fp", "c2", &files));
        assert_eq!(out.state, SlotState::Stale);
        assert_eq!(
            out.reasons,
            vec![StaleReason::ContentMismatch, StaleReason::FileHashMismatch]
        );
    }

    #[test]
    fn valid_when_everything_matches() {
        let m = manifest("fp", "c1", &[("a.rs", "h1")]);
        let files = m.file_hashes.clone();
        let out = assess_staleness(Some(&m), false, true, &inputs("fp", "c1", &files));
        assert_eq!(out.state, SlotState::Valid);
        assert!(out.reasons.is_empty());
    }
}
