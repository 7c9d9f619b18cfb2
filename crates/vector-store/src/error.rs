use thiserror::Error;

pub type Result<T> = std::result::Result<T, VectorStoreError>;

#[derive(Error, Debug)]
pub enum VectorStoreError {
    #[error("Invalid vector dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("Index corruption: {0}")]
    IndexCorruption(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl VectorStoreError {
    /// Whether a `load` failure means the snapshot itself is unusable and a
    /// rebuild should be forced.
    #[must_use]
    pub const fn is_corruption(&self) -> bool {
        matches!(self, Self::IndexCorruption(_))
    }
}
