use thiserror::Error;

/// Errors raised by document store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate key for index '{index}'")]
    Duplicate { index: String },

    #[error("document has no string '{field}' field")]
    MissingId { field: &'static str },

    #[error("entity did not serialize to a JSON object")]
    NotAnObject,

    #[error("invalid update on field '{field}': {reason}")]
    InvalidUpdate { field: String, reason: String },

    #[error("document (de)serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[cfg(feature = "mongo")]
    #[error("mongodb error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, StoreError::Duplicate { .. })
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
