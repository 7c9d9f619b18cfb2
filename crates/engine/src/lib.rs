//! # Review Context Engine
//!
//! Orchestrates the retrieval pipeline for PR-review context: repository
//! processing, chunking, embedding, vector search, and manifest-driven
//! caching, behind a small async API.
//!
//! The engine is given resolved snapshots (`RepoSnapshot`); it never fetches
//! repositories or talks to an LLM. Callers index a snapshot, then retrieve
//! scored snippets for review questions:
//!
//! ```no_run
//! use revctx_engine::{RagConfig, RagEngine, RepoSnapshot};
//!
//! # async fn run() -> revctx_engine::Result<()> {
//! let engine = RagEngine::new(RagConfig::with_cache_dir("/var/cache/revctx"))?;
//! let snapshot = RepoSnapshot {
//!     repository: "https://example.com/repo.git".to_string(),
//!     branch: "main".to_string(),
//!     content_hash: "3f2a9c".to_string(),
//!     root: "/tmp/checkout".into(),
//! };
//! engine.index(&snapshot, false).await?;
//! let context = engine
//!     .retrieve_context(&snapshot, "where is retry handled?", None)
//!     .await?;
//! println!("{}", engine.render_context(&context.snippets));
//! # Ok(())
//! # }
//! ```

mod config;
mod engine;
mod error;
mod retriever;

pub use config::{RagConfig, RetrieverConfig};
pub use engine::{
    ClearOutcome, IndexOutcome, RagEngine, RepoSnapshot, RetrievedContext, SlotStatus,
};
pub use error::{RagError, Result};
pub use retriever::{ContextSnippet, Retriever};
