use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use echo_types::{object_id_for, ObjectType};
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::path::object_file_name;
use crate::traits::ObjectStore;

/// Write `value` as pretty JSON plus a trailing newline, atomically.
///
/// The content goes to a temporary file in the target directory which is then
/// renamed over `path`, so readers see either the old or the new file.
pub fn write_json_atomic(path: &Path, value: &Value) -> StoreResult<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    let mut text =
        serde_json::to_string_pretty(value).map_err(|e| StoreError::Serialization(e.to_string()))?;
    text.push('\n');

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(text.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| StoreError::Persist {
        path: path.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}

/// Read and parse a JSON file.
///
/// `Ok(None)` when the file does not exist. Unparseable content is logged
/// and also reported as `None`.
pub(crate) fn read_json_file(path: &Path) -> StoreResult<Option<Value>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    match serde_json::from_str(&text) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "skipping unparseable JSON file");
            Ok(None)
        }
    }
}

/// Filesystem store: `<root>/<type>/<safe id>.json`.
///
/// Files are plain, pretty-printed JSON so the store stays human-auditable.
/// Distinct ids can collide on a file name after sanitising; a read whose
/// file holds a different id is treated as not found.
#[derive(Clone, Debug)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// The storage root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding objects of a type.
    pub fn type_dir(&self, object_type: ObjectType) -> PathBuf {
        self.root.join(object_type.dir())
    }

    /// File an id is (or would be) stored in.
    pub fn object_path(&self, object_type: ObjectType, id: &str) -> PathBuf {
        self.type_dir(object_type).join(object_file_name(id))
    }

    /// Every `*.json` file in a type's directory, sorted by file name.
    fn json_files(&self, object_type: ObjectType) -> StoreResult<Vec<PathBuf>> {
        let dir = self.type_dir(object_type);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

impl ObjectStore for FsObjectStore {
    fn read(&self, object_type: ObjectType, id: &str) -> StoreResult<Option<Value>> {
        let path = self.object_path(object_type, id);
        let Some(value) = read_json_file(&path)? else {
            return Ok(None);
        };
        match object_id_for(object_type, &value) {
            Ok(stored) if stored == id.trim() => Ok(Some(value)),
            _ => {
                debug!(object_type = %object_type, id, path = %path.display(), "file holds a different object");
                Ok(None)
            }
        }
    }

    fn write(&self, object_type: ObjectType, object: &Value) -> StoreResult<String> {
        let id = object_id_for(object_type, object)?;
        let path = self.object_path(object_type, &id);
        if path.exists() {
            debug!(object_type = %object_type, id = %id, "overwriting stored object");
        }
        write_json_atomic(&path, object)?;
        debug!(object_type = %object_type, id = %id, "object stored");
        Ok(id)
    }

    fn exists(&self, object_type: ObjectType, id: &str) -> StoreResult<bool> {
        Ok(self.read(object_type, id)?.is_some())
    }

    fn delete(&self, object_type: ObjectType, id: &str) -> StoreResult<bool> {
        if !self.exists(object_type, id)? {
            return Ok(false);
        }
        match fs::remove_file(self.object_path(object_type, id)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn list_ids(&self, object_type: ObjectType) -> StoreResult<Vec<String>> {
        let mut ids = Vec::new();
        for path in self.json_files(object_type)? {
            let Some(value) = read_json_file(&path)? else {
                continue;
            };
            match object_id_for(object_type, &value) {
                Ok(id) if path.file_name().is_some_and(|name| *name == *object_file_name(&id)) => ids.push(id),
                Ok(id) => warn!(path = %path.display(), id = %id, "skipping stored file named for another id"),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping stored file without id"),
            }
        }
        ids.sort();
        ids.dedup();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> (tempfile::TempDir, FsObjectStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::open(dir.path().join("storage")).unwrap();
        (dir, store)
    }

    #[test]
    fn write_read_roundtrip_on_disk() {
        let (_dir, store) = store();
        let eo = json!({ "eo_id": " echo.eo.1 ", "confidence_score": 0.9 });
        let id = store.write(ObjectType::Eo, &eo).unwrap();
        assert_eq!(id, "echo.eo.1");

        let path = store.object_path(ObjectType::Eo, "echo.eo.1");
        assert!(path.ends_with("eo/echo.eo.1.json"));
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.ends_with("}\n"));
        assert!(text.contains("\n  \"confidence_score\""));

        assert_eq!(store.read(ObjectType::Eo, "echo.eo.1").unwrap(), Some(eo));
        assert!(store.read(ObjectType::Rr, "echo.eo.1").unwrap().is_none());
    }

    #[test]
    fn overwrite_replaces_content() {
        let (_dir, store) = store();
        store.write(ObjectType::Eo, &json!({ "eo_id": "a", "v": 1 })).unwrap();
        store.write(ObjectType::Eo, &json!({ "eo_id": "a", "v": 2 })).unwrap();
        assert_eq!(store.read(ObjectType::Eo, "a").unwrap().unwrap()["v"], 2);
        assert_eq!(store.list_ids(ObjectType::Eo).unwrap(), vec!["a"]);
    }

    #[test]
    fn missing_id_is_rejected() {
        let (_dir, store) = store();
        let err = store.write(ObjectType::Rr, &json!({ "eo_id": "a" })).unwrap_err();
        assert!(matches!(err, StoreError::InvalidObject(_)));
    }

    #[test]
    fn filename_collision_reads_as_absent() {
        let (_dir, store) = store();
        store.write(ObjectType::Eo, &json!({ "eo_id": "a:b" })).unwrap();
        assert!(store.read(ObjectType::Eo, "a:b").unwrap().is_some());
        assert!(store.read(ObjectType::Eo, "a/b").unwrap().is_none());
        assert!(!store.delete(ObjectType::Eo, "a/b").unwrap());
        assert!(store.exists(ObjectType::Eo, "a:b").unwrap());
    }

    #[test]
    fn list_ids_skips_garbage_and_sorts() {
        let (_dir, store) = store();
        store.write(ObjectType::Eo, &json!({ "eo_id": "b" })).unwrap();
        store.write(ObjectType::Eo, &json!({ "eo_id": "a" })).unwrap();
        let dir = store.type_dir(ObjectType::Eo);
        std::fs::write(dir.join("broken.json"), "{ not json").unwrap();
        std::fs::write(dir.join("noid.json"), "{}").unwrap();
        std::fs::write(dir.join("notes.txt"), "ignored").unwrap();
        assert_eq!(store.list_ids(ObjectType::Eo).unwrap(), vec!["a", "b"]);
        assert!(store.list_ids(ObjectType::Trace).unwrap().is_empty());
    }

    #[test]
    fn list_ids_only_reports_readable_ids() {
        let (_dir, store) = store();
        store.write(ObjectType::Eo, &json!({ "eo_id": "a" })).unwrap();
        let dir = store.type_dir(ObjectType::Eo);
        std::fs::write(dir.join("copy.json"), r#"{ "eo_id": "b" }"#).unwrap();
        std::fs::write(dir.join("backup.json"), r#"{ "eo_id": "a" }"#).unwrap();

        let ids = store.list_ids(ObjectType::Eo).unwrap();
        assert_eq!(ids, vec!["a"]);
        for id in &ids {
            assert!(store.read(ObjectType::Eo, id).unwrap().is_some());
        }
        assert!(store.read(ObjectType::Eo, "b").unwrap().is_none());
    }

    #[test]
    fn delete_and_clear() {
        let (_dir, store) = store();
        for id in ["x", "y", "z"] {
            store.write(ObjectType::Rr, &json!({ "rr_id": id })).unwrap();
        }
        assert!(store.delete(ObjectType::Rr, "x").unwrap());
        assert!(!store.delete(ObjectType::Rr, "x").unwrap());
        assert_eq!(store.clear_type(ObjectType::Rr).unwrap(), 2);
        assert!(store.list_ids(ObjectType::Rr).unwrap().is_empty());
    }

    #[test]
    fn atomic_write_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.json");
        write_json_atomic(&path, &json!({ "k": [1, 2] })).unwrap();
        write_json_atomic(&path, &json!({ "k": [3] })).unwrap();
        let names: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1);
        let back: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, json!({ "k": [3] }));
    }
}
