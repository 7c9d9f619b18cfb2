use thiserror::Error;

pub type Result<T> = std::result::Result<T, SplitterError>;

#[derive(Error, Debug)]
pub enum SplitterError {
    #[error("Invalid splitter config: {0}")]
    InvalidConfig(String),
}
