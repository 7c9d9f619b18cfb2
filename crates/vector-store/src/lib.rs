//! # Review Context Vector Store
//!
//! Persistent similarity index over `chunk_id -> (vector, metadata)`.
//!
//! The index is a flat exact scan: correct, deterministic, and naturally
//! incremental (`upsert`/`delete` touch single entries). An ANN structure is
//! a possible upgrade, not a requirement, at PR-review corpus sizes.
//!
//! The similarity metric is cosine over the stored vectors, fixed when the
//! index is created and recorded in the snapshot; `load` refuses a snapshot
//! built with a different metric or dimension instead of silently rescoring.
//! Scores are in `[-1, 1]`; with unit-normalized inputs they equal the dot
//! product.

mod error;
mod index;
mod types;

pub use error::{Result, VectorStoreError};
pub use index::VectorIndex;
pub use types::{ChunkMeta, Hit, SimilarityMetric};
