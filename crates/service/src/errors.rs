use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("datafile corrupt: {corrupt} of {total} lines unreadable")]
    Corrupt { corrupt: usize, total: usize },
    #[error("unique constraint violated: _id {0} already exists")]
    UniqueViolation(String),
    #[error("invalid query: {0}")]
    Query(String),
}
