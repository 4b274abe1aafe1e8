use echo_types::ObjectType;
use serde_json::Value;

use crate::error::StoreResult;

/// Per-object store keyed by `(type, id)`.
///
/// All implementations must satisfy these invariants:
/// - The id of a written object is derived from its type's id field and the
///   trimmed value is returned.
/// - Writing an id that already exists replaces its content (last write wins).
/// - A read returns exactly what was last written for that id, or `None`.
/// - [`ObjectStore::list_ids`] reflects only content that can be read back,
///   sorted lexicographically, without duplicates.
/// - Only failures of the storage medium are returned as `Err`.
pub trait ObjectStore: Send + Sync {
    /// Read an object by type and id.
    ///
    /// Returns `Ok(None)` if nothing readable is stored under that id.
    fn read(&self, object_type: ObjectType, id: &str) -> StoreResult<Option<Value>>;

    /// Write an object and return its id.
    fn write(&self, object_type: ObjectType, object: &Value) -> StoreResult<String>;

    /// Check whether an object is stored under the id.
    fn exists(&self, object_type: ObjectType, id: &str) -> StoreResult<bool>;

    /// Delete an object. Returns `true` if it existed.
    ///
    /// Only bundle resets and full storage resets delete.
    fn delete(&self, object_type: ObjectType, id: &str) -> StoreResult<bool>;

    /// Ids of every readable object of a type, sorted lexicographically.
    fn list_ids(&self, object_type: ObjectType) -> StoreResult<Vec<String>>;

    /// Read multiple objects in a batch.
    ///
    /// Default implementation calls `read()` for each id.
    fn read_batch(&self, object_type: ObjectType, ids: &[String]) -> StoreResult<Vec<Option<Value>>> {
        ids.iter().map(|id| self.read(object_type, id)).collect()
    }

    /// Delete every object of a type. Returns how many were removed.
    fn clear_type(&self, object_type: ObjectType) -> StoreResult<usize> {
        let mut removed = 0;
        for id in self.list_ids(object_type)? {
            if self.delete(object_type, &id)? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}
