use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("Unknown type '{given}'. Allowed types: {allowed}")]
    UnknownType { given: String, allowed: String },

    #[error("Missing or invalid id field '{field}' for type '{object_type}'")]
    MissingId { object_type: String, field: String },

    #[error("object must be a JSON object")]
    NotAnObject,

    #[error("Unable to infer object type: none of known id fields present")]
    NoIdField,

    #[error("Unable to infer object type: multiple id fields present ({0})")]
    AmbiguousIdFields(String),

    #[error("cannot decode {object_type} '{id}': {reason}")]
    Decode {
        object_type: String,
        id: String,
        reason: String,
    },
}
