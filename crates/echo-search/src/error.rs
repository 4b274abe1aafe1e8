/// Errors from search operations.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The operator is not one of `equals`, `contains`, `prefix`.
    #[error("Unsupported search op '{0}'. Use one of: equals, contains, prefix")]
    UnsupportedOp(String),

    /// The field name is blank.
    #[error("search field must be a non-empty string")]
    EmptyField,

    /// Reading the index failed at the storage level.
    #[error("index error: {0}")]
    Index(#[from] echo_index::IndexError),

    /// Reading an object failed at the storage level.
    #[error("store error: {0}")]
    Store(#[from] echo_store::StoreError),
}

/// Result alias for search operations.
pub type SearchResult<T> = Result<T, SearchError>;
