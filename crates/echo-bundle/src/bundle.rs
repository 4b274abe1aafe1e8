use std::path::Path;

use echo_schema::Manifest;
use echo_store::write_json_atomic;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{BundleError, BundleResult};

/// A portable snapshot of stored objects.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    #[serde(default)]
    pub manifest_version: Value,
    #[serde(default)]
    pub protocol_version: Value,
    pub objects: Vec<Value>,
}

impl Bundle {
    /// A bundle stamped with the manifest's versions.
    pub fn new(manifest: &Manifest, objects: Vec<Value>) -> Self {
        Self {
            manifest_version: manifest.manifest_version(),
            protocol_version: manifest.protocol_version(),
            objects,
        }
    }

    /// Parse a bundle document. Items are not inspected here.
    pub fn from_value(value: Value) -> BundleResult<Self> {
        let Value::Object(mut map) = value else {
            return Err(BundleError::Malformed("bundle must be a JSON object".into()));
        };
        let objects = match map.remove("objects") {
            Some(Value::Array(objects)) => objects,
            _ => {
                return Err(BundleError::Malformed(
                    "bundle must contain an 'objects' array".into(),
                ))
            }
        };
        Ok(Self {
            manifest_version: map.remove("manifest_version").unwrap_or(Value::Null),
            protocol_version: map.remove("protocol_version").unwrap_or(Value::Null),
            objects,
        })
    }

    pub fn read_from(path: &Path) -> BundleResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| BundleError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let value: Value = serde_json::from_str(&text).map_err(|e| {
            BundleError::Malformed(format!("invalid JSON in {}: {e}", path.display()))
        })?;
        Self::from_value(value)
    }

    /// Write as pretty JSON, atomically.
    pub fn write_to(&self, path: &Path) -> BundleResult<()> {
        write_json_atomic(path, &self.to_value())?;
        Ok(())
    }

    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "manifest_version": self.manifest_version,
            "protocol_version": self.protocol_version,
            "objects": self.objects,
        })
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// BLAKE3 of the compact JSON form, hex encoded. Object keys serialise
    /// sorted, so equal bundles have equal digests.
    pub fn digest(&self) -> String {
        let bytes = self.to_value().to_string();
        hex::encode(blake3::hash(bytes.as_bytes()).as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stamped_with_manifest_versions() {
        let manifest = Manifest::new("1.0", "echo.v1");
        let b = Bundle::new(&manifest, vec![json!({ "eo_id": "a" })]);
        assert_eq!(b.manifest_version, json!("1.0"));
        assert_eq!(b.protocol_version, json!("echo.v1"));
        assert_eq!(b.len(), 1);
    }

    #[test]
    fn rejects_malformed_documents() {
        assert!(matches!(Bundle::from_value(json!([])), Err(BundleError::Malformed(_))));
        let err = Bundle::from_value(json!({ "objects": {} })).unwrap_err();
        assert!(err.to_string().contains("'objects' array"));
    }

    #[test]
    fn missing_versions_are_null() {
        let b = Bundle::from_value(json!({ "objects": [] })).unwrap();
        assert_eq!(b.protocol_version, Value::Null);
        assert!(b.is_empty());
    }

    #[test]
    fn file_roundtrip_keeps_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("bundle.json");
        let b = Bundle::new(
            &Manifest::new("1.0", "echo.v1"),
            vec![json!({ "eo_id": "a", "confidence_score": 0.5 })],
        );
        b.write_to(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.ends_with("}\n"));
        let back = Bundle::read_from(&path).unwrap();
        assert_eq!(back, b);
        assert_eq!(back.digest(), b.digest());
        assert_eq!(b.digest().len(), 64);
    }

    #[test]
    fn unreadable_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = Bundle::read_from(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, BundleError::Read { .. }));

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{ not json").unwrap();
        assert!(matches!(Bundle::read_from(&bad), Err(BundleError::Malformed(_))));
    }
}
