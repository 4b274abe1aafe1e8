use std::path::PathBuf;

use echo_types::TypeError;

/// Errors raised while resolving a schema.
///
/// These are configuration faults: the operation that hit one is aborted.
/// Validation failures of an instance are not errors; they are returned as
/// [`crate::FieldError`] lists.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// The type tag is not one of the protocol's object types.
    #[error(transparent)]
    UnknownType(#[from] TypeError),

    /// The manifest file could not be read.
    #[error("cannot read manifest {path}: {source}")]
    ManifestRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The manifest is not a JSON object or is not valid JSON.
    #[error("invalid manifest: {0}")]
    ManifestInvalid(String),

    /// The manifest has no usable entry for a family.
    #[error("manifest missing schema mapping for '{family}': {reason}")]
    MissingSchemaMapping { family: String, reason: String },

    /// `schema_files` names a file that does not match the `schema_id`.
    #[error("manifest schema mismatch for '{family}': schema_id '{schema_id}' expects '{expected}', got '{got}'")]
    SchemaMismatch {
        family: String,
        schema_id: String,
        expected: String,
        got: String,
    },

    /// The resolved schema file does not exist.
    #[error("Schema not found for type '{object_type}': {path}")]
    SchemaFileNotFound { object_type: String, path: PathBuf },

    /// The schema document is not valid JSON or not a JSON object.
    #[error("cannot parse schema {path}: {reason}")]
    SchemaParse { path: PathBuf, reason: String },

    /// A `pattern` the regex engine cannot compile.
    #[error("unsupported pattern '{pattern}' in schema: {reason}")]
    UnsupportedPattern { pattern: String, reason: String },

    /// I/O failure while reading a schema document.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;
