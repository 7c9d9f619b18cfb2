use serde::{Deserialize, Serialize};

/// Similarity metric an index was built with. Query-time scoring always uses
/// the metric recorded in the snapshot; mixing metrics is a configuration
/// error surfaced at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMetric {
    /// Cosine similarity, scores in [-1, 1]
    #[default]
    Cosine,
}

impl SimilarityMetric {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
        }
    }
}

/// Metadata stored alongside each vector. Every entry has exactly one
/// metadata record; there are no orphaned vectors. The chunk text is kept
/// here so retrieval can render snippets from the snapshot alone, without
/// re-reading source files.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkMeta {
    pub file_path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub content_hash: String,
    pub text: String,
}

/// One nearest-neighbor query result.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub chunk_id: String,
    pub score: f32,
}
