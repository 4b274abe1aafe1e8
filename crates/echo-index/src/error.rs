//! Error types for the index crate.

/// Errors that can occur during index operations.
///
/// A corrupt index is not an error: it is reported as
/// [`crate::IndexLoad::Corrupt`] and healed by the manager.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] echo_store::StoreError),

    /// I/O error reading or removing the index artifact.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for index results.
pub type IndexResult<T> = Result<T, IndexError>;
