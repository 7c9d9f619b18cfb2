use thiserror::Error;

pub type Result<T> = std::result::Result<T, CacheError>;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache lock held by another build (waited {waited_ms}ms): {slot}")]
    CacheLock { slot: String, waited_ms: u64 },

    #[error("Corrupt manifest at {path}: {reason}")]
    ManifestCorrupt { path: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}
