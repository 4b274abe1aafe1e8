use std::path::PathBuf;

use echo_bundle::BundleError;
use echo_index::IndexError;
use echo_rank::RankError;
use echo_schema::{FieldError, SchemaError, SignaturePolicyViolation};
use echo_search::SearchError;
use echo_store::StoreError;
use echo_types::{ObjectType, TypeError};

/// Errors returned by node operations.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// The object failed schema validation. Every violation is listed.
    #[error("validation failed for {object_type}: {}", join_errors(.errors))]
    Validation {
        object_type: ObjectType,
        errors: Vec<FieldError>,
    },

    #[error("object not found: {object_type}:{id}")]
    NotFound { object_type: ObjectType, id: String },

    #[error(transparent)]
    Type(#[from] TypeError),

    /// The type's schema could not be resolved.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// A bundle was rejected or failed to apply.
    #[error(transparent)]
    Bundle(BundleError),

    #[error(transparent)]
    SignaturePolicyViolation(#[from] SignaturePolicyViolation),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// The storage medium failed.
    #[error("storage error: {0}")]
    Store(String),

    #[error("invalid configuration {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    #[error(transparent)]
    Rank(#[from] RankError),
}

impl NodeError {
    /// Field errors of a rejected object, empty for other kinds.
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            Self::Validation { errors, .. } => errors,
            _ => &[],
        }
    }

    /// Whether the failure is in the environment rather than the request.
    pub fn is_environmental(&self) -> bool {
        matches!(self, Self::Store(_) | Self::Config { .. })
    }
}

fn join_errors(errors: &[FieldError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

impl From<StoreError> for NodeError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::InvalidObject(e) => Self::Type(e),
            other => Self::Store(other.to_string()),
        }
    }
}

impl From<IndexError> for NodeError {
    fn from(e: IndexError) -> Self {
        match e {
            IndexError::Store(e) => e.into(),
            other => Self::Store(other.to_string()),
        }
    }
}

impl From<SearchError> for NodeError {
    fn from(e: SearchError) -> Self {
        match e {
            SearchError::UnsupportedOp(_) | SearchError::EmptyField => Self::InvalidQuery(e.to_string()),
            SearchError::Index(e) => e.into(),
            SearchError::Store(e) => e.into(),
        }
    }
}

impl From<BundleError> for NodeError {
    fn from(e: BundleError) -> Self {
        match e {
            BundleError::Schema(e) => Self::Schema(e),
            BundleError::Store(e) => e.into(),
            BundleError::Index(e) => e.into(),
            other => Self::Bundle(other),
        }
    }
}

pub type NodeResult<T> = Result<T, NodeError>;
