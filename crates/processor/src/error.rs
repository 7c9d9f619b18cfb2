use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProcessorError>;

#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("Repository access error: {0}")]
    RepositoryAccess(String),

    #[error("Invalid glob pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
