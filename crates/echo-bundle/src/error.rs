use std::path::PathBuf;

use echo_index::IndexError;
use echo_schema::SchemaError;
use echo_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    /// One entry per failing item, `objects[i]: ...`. Nothing was stored.
    #[error("bundle validation failed:\n{}", .0.join("\n"))]
    Validation(Vec<String>),

    #[error("invalid bundle: {0}")]
    Malformed(String),

    #[error("cannot read bundle {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Index(#[from] IndexError),
}

impl BundleError {
    /// Per-item errors of a rejected bundle.
    pub fn item_errors(&self) -> &[String] {
        match self {
            Self::Validation(errors) => errors,
            _ => &[],
        }
    }
}

pub type BundleResult<T> = Result<T, BundleError>;
