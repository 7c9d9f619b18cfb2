use revctx_cache::CacheError;
use revctx_embedder::{EmbedFailure, EmbedderError};
use revctx_processor::ProcessorError;
use revctx_splitter::SplitterError;
use revctx_vector_store::VectorStoreError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

/// Engine-level error surface.
///
/// File-level problems (unreadable, binary, oversized) never appear here:
/// the processor absorbs and counts them. Transient embedding failures are
/// retried below this level; what surfaces is permanent.
#[derive(Error, Debug)]
pub enum RagError {
    #[error("Repository access failed: {0}")]
    RepositoryAccess(String),

    #[error("Embedding failed: {reason} ({} chunks affected)", chunk_ids.len())]
    Embedding {
        reason: String,
        chunk_ids: Vec<String>,
    },

    #[error("Vector index corrupt: {0}")]
    IndexCorruption(String),

    #[error("Cache lock held by another build for slot {slot} (waited {waited_ms}ms)")]
    CacheLock { slot: String, waited_ms: u64 },

    #[error("Configuration mismatch: {0}")]
    ConfigMismatch(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RagError {
    pub(crate) fn from_failures(failures: &[EmbedFailure]) -> Self {
        let reason = failures
            .first()
            .map_or_else(|| "unknown".to_string(), |f| f.reason.clone());
        Self::Embedding {
            reason,
            chunk_ids: failures.iter().map(|f| f.chunk_id.clone()).collect(),
        }
    }
}

impl From<ProcessorError> for RagError {
    fn from(err: ProcessorError) -> Self {
        match err {
            ProcessorError::InvalidPattern { .. } => Self::Config(err.to_string()),
            other => Self::RepositoryAccess(other.to_string()),
        }
    }
}

impl From<SplitterError> for RagError {
    fn from(err: SplitterError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<EmbedderError> for RagError {
    fn from(err: EmbedderError) -> Self {
        match err {
            EmbedderError::InvalidConfig(msg) => Self::Config(msg),
            other => Self::Embedding {
                reason: other.to_string(),
                chunk_ids: Vec::new(),
            },
        }
    }
}

impl From<VectorStoreError> for RagError {
    fn from(err: VectorStoreError) -> Self {
        match err {
            VectorStoreError::Io(err) => Self::Io(err),
            VectorStoreError::InvalidDimension { expected, actual } => Self::ConfigMismatch(
                format!("vector dimension {actual} does not match index dimension {expected}"),
            ),
            other => Self::IndexCorruption(other.to_string()),
        }
    }
}

impl From<CacheError> for RagError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::CacheLock { slot, waited_ms } => Self::CacheLock { slot, waited_ms },
            CacheError::Io(err) => Self::Io(err),
            other => Self::Cache(other.to_string()),
        }
    }
}
