use thiserror::Error;

pub type Result<T> = std::result::Result<T, RebaseError>;

#[derive(Error, Debug)]
pub enum RebaseError {
    #[error("cache I/O error: {0}")]
    CacheIo(#[from] std::io::Error),

    #[error("cache format error: {0}")]
    CacheFormat(#[from] serde_json::Error),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("{0}")]
    Other(String),
}
