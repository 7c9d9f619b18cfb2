use thiserror::Error;

pub type Result<T> = std::result::Result<T, EmbedderError>;

#[derive(Error, Debug)]
pub enum EmbedderError {
    /// Worth retrying with backoff (timeouts, connection drops, 429/5xx)
    #[error("Transient embedding error: {0}")]
    Transient(String),

    /// Retrying will not help (bad request, contract violation by a backend)
    #[error("Permanent embedding error: {0}")]
    Permanent(String),

    #[error("Invalid embedder config: {0}")]
    InvalidConfig(String),
}

impl EmbedderError {
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}
