//! The bundled protocol fixtures: manifest, one schema per family and
//! sample objects. Also compiled in, so a node can run without touching
//! the filesystem.

use std::collections::HashMap;
use std::path::PathBuf;

use echo_schema::{Manifest, SchemaError, SchemaRegistry, SchemaResult};
use serde_json::Value;

const MANIFEST: &str = include_str!("../fixtures/manifest.json");
const SAMPLE_EO: &str = include_str!("../fixtures/eo.sample.json");
const SAMPLE_RR: &str = include_str!("../fixtures/rr.sample.json");

const SCHEMAS: [(&str, &str); 7] = [
    ("echo.eo.v1", include_str!("../fixtures/schemas/echo.eo.v1.json")),
    ("echo.trace.v1", include_str!("../fixtures/schemas/echo.trace.v1.json")),
    ("echo.request.v1", include_str!("../fixtures/schemas/echo.request.v1.json")),
    ("echo.rr.v1", include_str!("../fixtures/schemas/echo.rr.v1.json")),
    ("echo.aao.v1", include_str!("../fixtures/schemas/echo.aao.v1.json")),
    ("echo.referral.v1", include_str!("../fixtures/schemas/echo.referral.v1.json")),
    ("echo.seedupdate.v1", include_str!("../fixtures/schemas/echo.seedupdate.v1.json")),
];

/// Directory holding the fixture files.
pub fn dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

pub fn manifest_path() -> PathBuf {
    dir().join("manifest.json")
}

pub fn schemas_dir() -> PathBuf {
    dir().join("schemas")
}

/// A registry over the compiled-in manifest and schemas.
pub fn registry() -> SchemaResult<SchemaRegistry> {
    let manifest: Value = serde_json::from_str(MANIFEST).map_err(|e| SchemaError::ManifestInvalid(e.to_string()))?;
    let manifest = Manifest::from_value(manifest)?;
    let mut documents = HashMap::new();
    for (schema_id, text) in SCHEMAS {
        let document: Value = serde_json::from_str(text).map_err(|e| SchemaError::SchemaParse {
            path: PathBuf::from(format!("{schema_id}.json")),
            reason: e.to_string(),
        })?;
        documents.insert(schema_id.to_string(), document);
    }
    Ok(SchemaRegistry::in_memory(manifest, documents))
}

/// The sample experience object, `echo.eo.sample.v1`.
pub fn sample_eo() -> Value {
    serde_json::from_str(SAMPLE_EO).unwrap_or(Value::Null)
}

/// The sample reuse receipt, `echo.rr.1`.
pub fn sample_rr() -> Value {
    serde_json::from_str(SAMPLE_RR).unwrap_or(Value::Null)
}
