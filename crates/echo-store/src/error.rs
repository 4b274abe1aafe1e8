use std::path::PathBuf;

use echo_types::TypeError;

/// Errors from object store operations.
///
/// Every variant except [`StoreError::InvalidObject`] means the storage
/// medium itself misbehaved; callers surface these as environment faults.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The object carries no usable id for its type.
    #[error(transparent)]
    InvalidObject(#[from] TypeError),

    /// Serialization failure while writing.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A finished temporary file could not be moved into place.
    #[error("cannot persist {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
