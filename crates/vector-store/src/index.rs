use crate::error::{Result, VectorStoreError};
use crate::types::{ChunkMeta, Hit, SimilarityMetric};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Entry {
    vector: Vec<f32>,
    meta: ChunkMeta,
}

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    schema_version: u32,
    dimension: usize,
    metric: SimilarityMetric,
    entries: BTreeMap<String, Entry>,
}

/// Flat similarity index with deterministic ordering.
///
/// Entries live in a `BTreeMap` keyed by chunk id, so iteration order,
/// tie-breaking, and snapshot layout are all reproducible.
#[derive(Debug)]
pub struct VectorIndex {
    dimension: usize,
    metric: SimilarityMetric,
    entries: BTreeMap<String, Entry>,
}

impl VectorIndex {
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self::with_metric(dimension, SimilarityMetric::default())
    }

    #[must_use]
    pub fn with_metric(dimension: usize, metric: SimilarityMetric) -> Self {
        Self {
            dimension,
            metric,
            entries: BTreeMap::new(),
        }
    }

    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    #[must_use]
    pub const fn metric(&self) -> SimilarityMetric {
        self.metric
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert or replace an entry.
    pub fn upsert(&mut self, chunk_id: impl Into<String>, vector: Vec<f32>, meta: ChunkMeta) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(VectorStoreError::InvalidDimension {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        self.entries.insert(chunk_id.into(), Entry { vector, meta });
        Ok(())
    }

    /// Remove an entry; no-op when absent.
    pub fn delete(&mut self, chunk_id: &str) -> bool {
        self.entries.remove(chunk_id).is_some()
    }

    /// Remove every chunk belonging to one file. Supports per-file delta
    /// rebuilds without touching other files' entries.
    pub fn delete_file(&mut self, file_path: &str) -> usize {
        let doomed: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.meta.file_path == file_path)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &doomed {
            self.entries.remove(id);
        }
        doomed.len()
    }

    #[must_use]
    pub fn get(&self, chunk_id: &str) -> Option<(&[f32], &ChunkMeta)> {
        self.entries
            .get(chunk_id)
            .map(|entry| (entry.vector.as_slice(), &entry.meta))
    }

    #[must_use]
    pub fn chunk_ids(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Exact k-nearest query, descending by score, ties broken by ascending
    /// chunk id.
    pub fn query(&self, vector: &[f32], k: usize) -> Result<Vec<Hit>> {
        if vector.len() != self.dimension {
            return Err(VectorStoreError::InvalidDimension {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        let mut hits: Vec<Hit> = self
            .entries
            .iter()
            .map(|(id, entry)| Hit {
                chunk_id: id.clone(),
                score: cosine_similarity(vector, &entry.vector),
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });
        hits.truncate(k);
        Ok(hits)
    }

    /// Serialize the index to `path` via write-to-temp and atomic rename.
    pub async fn persist(&self, path: &Path) -> Result<()> {
        let snapshot = Snapshot {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            dimension: self.dimension,
            metric: self.metric,
            entries: self.entries.clone(),
        };
        let bytes = serde_json::to_vec(&snapshot)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, path).await?;
        log::debug!("Persisted index with {} entries to {}", self.entries.len(), path.display());
        Ok(())
    }

    /// Load a snapshot, verifying schema version and internal dimension
    /// consistency. Any mismatch is `IndexCorruption`.
    pub async fn load(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let snapshot: Snapshot = serde_json::from_slice(&bytes).map_err(|err| {
            VectorStoreError::IndexCorruption(format!(
                "unreadable snapshot {}: {err}",
                path.display()
            ))
        })?;

        if snapshot.schema_version != SNAPSHOT_SCHEMA_VERSION {
            return Err(VectorStoreError::IndexCorruption(format!(
                "unsupported snapshot schema {} (expected {SNAPSHOT_SCHEMA_VERSION})",
                snapshot.schema_version
            )));
        }
        for (id, entry) in &snapshot.entries {
            if entry.vector.len() != snapshot.dimension {
                return Err(VectorStoreError::IndexCorruption(format!(
                    "entry '{id}' has dimension {} (index dimension {})",
                    entry.vector.len(),
                    snapshot.dimension
                )));
            }
        }

        log::debug!(
            "Loaded index with {} entries from {}",
            snapshot.entries.len(),
            path.display()
        );
        Ok(Self {
            dimension: snapshot.dimension,
            metric: snapshot.metric,
            entries: snapshot.entries,
        })
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn meta(file: &str, line: usize) -> ChunkMeta {
        ChunkMeta {
            file_path: file.to_string(),
            start_line: line,
            end_line: line + 5,
            content_hash: format!("hash-{file}-{line}"),
            text: format!("body of {file} at line {line}"),
        }
    }

    #[test]
    fn upsert_and_query_rank_by_similarity() {
        let mut index = VectorIndex::new(3);
        index.upsert("a", vec![1.0, 0.0, 0.0], meta("a.rs", 1)).unwrap();
        index.upsert("b", vec![0.9, 0.1, 0.0], meta("b.rs", 1)).unwrap();
        index.upsert("c", vec![0.0, 1.0, 0.0], meta("c.rs", 1)).unwrap();

        let hits = index.query(&[1.0, 0.0, 0.0], 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk_id, "a");
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert_eq!(hits[1].chunk_id, "b");
        assert!(hits[1].score > 0.9);
    }

    #[test]
    fn ties_break_by_chunk_id() {
        let mut index = VectorIndex::new(2);
        // Same vector under three ids, inserted out of order.
        for id in ["m", "a", "z"] {
            index.upsert(id, vec![1.0, 0.0], meta("f.rs", 1)).unwrap();
        }
        let hits = index.query(&[1.0, 0.0], 3).unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "m", "z"]);
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let mut index = VectorIndex::new(3);
        assert!(matches!(
            index.upsert("a", vec![1.0, 0.0], meta("a.rs", 1)),
            Err(VectorStoreError::InvalidDimension { expected: 3, actual: 2 })
        ));
        assert!(index.query(&[1.0], 1).is_err());
    }

    #[test]
    fn upsert_replaces_and_delete_is_idempotent() {
        let mut index = VectorIndex::new(2);
        index.upsert("a", vec![1.0, 0.0], meta("a.rs", 1)).unwrap();
        index.upsert("a", vec![0.0, 1.0], meta("a.rs", 9)).unwrap();
        assert_eq!(index.len(), 1);
        let (vector, meta) = index.get("a").unwrap();
        assert_eq!(vector, &[0.0, 1.0]);
        assert_eq!(meta.start_line, 9);

        assert!(index.delete("a"));
        assert!(!index.delete("a"));
        assert!(index.is_empty());
    }

    #[test]
    fn delete_file_removes_only_that_file() {
        let mut index = VectorIndex::new(2);
        index.upsert("a1", vec![1.0, 0.0], meta("a.rs", 1)).unwrap();
        index.upsert("a2", vec![0.5, 0.5], meta("a.rs", 10)).unwrap();
        index.upsert("b1", vec![0.0, 1.0], meta("b.rs", 1)).unwrap();

        assert_eq!(index.delete_file("a.rs"), 2);
        assert_eq!(index.chunk_ids(), vec!["b1".to_string()]);
    }

    #[tokio::test]
    async fn persist_then_load_round_trips() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("index.json");

        let mut index = VectorIndex::new(2);
        index.upsert("a", vec![1.0, 0.0], meta("a.rs", 1)).unwrap();
        index.upsert("b", vec![0.0, 1.0], meta("b.rs", 1)).unwrap();
        index.persist(&path).await.unwrap();

        let loaded = VectorIndex::load(&path).await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.dimension(), 2);
        assert_eq!(loaded.metric(), SimilarityMetric::Cosine);
        let (vector, _) = loaded.get("a").unwrap();
        assert_eq!(vector, &[1.0, 0.0]);
    }

    #[tokio::test]
    async fn load_rejects_garbage_as_corruption() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("index.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        let err = VectorIndex::load(&path).await.unwrap_err();
        assert!(err.is_corruption());
    }

    #[tokio::test]
    async fn load_rejects_dimension_inconsistency() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("index.json");
        let snapshot = serde_json::json!({
            "schema_version": SNAPSHOT_SCHEMA_VERSION,
            "dimension": 3,
            "metric": "cosine",
            "entries": {
                "a": {
                    "vector": [1.0, 0.0],
                    "meta": {
                        "file_path": "a.rs",
                        "start_line": 1,
                        "end_line": 2,
                        "content_hash": "h",
                        "text": "fn a() {}"
                    }
                }
            }
        });
        tokio::fs::write(&path, snapshot.to_string()).await.unwrap();

        let err = VectorIndex::load(&path).await.unwrap_err();
        assert!(err.is_corruption());
    }
}
