use std::path::{Path, PathBuf};

use echo_types::ObjectType;
use serde_json::{json, Map, Value};

use crate::error::{SchemaError, SchemaResult};

/// The protocol manifest: versions plus the family -> schema mapping.
///
/// The manifest is owned by the protocol repository, not by the node, so it
/// is read leniently: only the fields the node needs are interpreted and the
/// rest is kept as-is.
#[derive(Clone, Debug, PartialEq)]
pub struct Manifest {
    raw: Map<String, Value>,
}

impl Manifest {
    /// An empty manifest with the given versions.
    pub fn new(manifest_version: impl Into<String>, protocol_version: impl Into<String>) -> Self {
        let mut raw = Map::new();
        raw.insert("manifest_version".into(), Value::String(manifest_version.into()));
        raw.insert("protocol_version".into(), Value::String(protocol_version.into()));
        raw.insert("schemas".into(), Value::Object(Map::new()));
        Self { raw }
    }

    /// Map a type's family to a `schema_id`.
    pub fn with_schema(mut self, object_type: ObjectType, schema_id: impl Into<String>) -> Self {
        let schemas = self
            .raw
            .entry("schemas")
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(map) = schemas {
            map.insert(
                object_type.family().to_string(),
                json!({ "schema_id": schema_id.into() }),
            );
        }
        self
    }

    /// Parse a manifest from JSON. The top level must be an object.
    pub fn from_value(value: Value) -> SchemaResult<Self> {
        match value {
            Value::Object(raw) => Ok(Self { raw }),
            other => Err(SchemaError::ManifestInvalid(format!(
                "manifest must be a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Read and parse a manifest file.
    pub fn load(path: &Path) -> SchemaResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| SchemaError::ManifestRead {
            path: path.to_path_buf(),
            source,
        })?;
        let value: Value = serde_json::from_str(&text).map_err(|e| {
            SchemaError::ManifestInvalid(format!(
                "invalid JSON in {} (line {}, col {}): {e}",
                path.display(),
                e.line(),
                e.column()
            ))
        })?;
        Self::from_value(value)
    }

    /// `manifest_version` as written (null if absent).
    pub fn manifest_version(&self) -> Value {
        self.raw.get("manifest_version").cloned().unwrap_or(Value::Null)
    }

    /// `protocol_version` as written (null if absent).
    pub fn protocol_version(&self) -> Value {
        self.raw.get("protocol_version").cloned().unwrap_or(Value::Null)
    }

    /// `protocol_version` when it is a string.
    pub fn protocol_version_str(&self) -> Option<&str> {
        self.raw.get("protocol_version").and_then(Value::as_str)
    }

    /// The `schema_id` registered for a type's family.
    pub fn schema_id(&self, object_type: ObjectType) -> SchemaResult<String> {
        let family = object_type.family();
        let missing = |reason: &str| SchemaError::MissingSchemaMapping {
            family: family.to_string(),
            reason: reason.to_string(),
        };

        let schemas = self
            .raw
            .get("schemas")
            .and_then(Value::as_object)
            .ok_or_else(|| missing("manifest missing object: 'schemas'"))?;
        let entry = schemas
            .get(family)
            .and_then(Value::as_object)
            .ok_or_else(|| missing(&format!("manifest missing schemas['{family}'] entry")))?;
        entry
            .get("schema_id")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .ok_or_else(|| missing(&format!("manifest missing valid schema_id for '{family}'")))
    }

    /// Optional `schema_files` hint for a family, as a path relative to the
    /// manifest's directory.
    pub fn schema_file_hint(&self, object_type: ObjectType) -> Option<PathBuf> {
        self.raw
            .get("schema_files")
            .and_then(Value::as_object)
            .and_then(|files| files.get(object_type.family()))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
    }

    /// The manifest as JSON.
    pub fn to_value(&self) -> Value {
        Value::Object(self.raw.clone())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
