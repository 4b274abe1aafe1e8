use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use echo_types::{object_id_for, ObjectType};
use serde_json::Value;
use tracing::debug;

use crate::error::StoreResult;
use crate::traits::ObjectStore;

/// In-memory object store.
///
/// Intended for tests and embedding. Objects are held behind a `RwLock` and
/// cloned on read/write.
pub struct InMemoryObjectStore {
    objects: RwLock<HashMap<ObjectType, BTreeMap<String, Value>>>,
}

impl InMemoryObjectStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
        }
    }

    /// Number of objects currently stored, across all types.
    pub fn len(&self) -> usize {
        self.objects
            .read()
            .expect("lock poisoned")
            .values()
            .map(BTreeMap::len)
            .sum()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove all objects from the store.
    pub fn clear(&self) {
        self.objects.write().expect("lock poisoned").clear();
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn read(&self, object_type: ObjectType, id: &str) -> StoreResult<Option<Value>> {
        let map = self.objects.read().expect("lock poisoned");
        Ok(map
            .get(&object_type)
            .and_then(|objects| objects.get(id.trim()))
            .cloned())
    }

    fn write(&self, object_type: ObjectType, object: &Value) -> StoreResult<String> {
        let id = object_id_for(object_type, object)?;
        let mut map = self.objects.write().expect("lock poisoned");
        if map
            .entry(object_type)
            .or_default()
            .insert(id.clone(), object.clone())
            .is_some()
        {
            debug!(object_type = %object_type, id = %id, "overwriting stored object");
        }
        Ok(id)
    }

    fn exists(&self, object_type: ObjectType, id: &str) -> StoreResult<bool> {
        let map = self.objects.read().expect("lock poisoned");
        Ok(map
            .get(&object_type)
            .is_some_and(|objects| objects.contains_key(id.trim())))
    }

    fn delete(&self, object_type: ObjectType, id: &str) -> StoreResult<bool> {
        let mut map = self.objects.write().expect("lock poisoned");
        Ok(map
            .get_mut(&object_type)
            .is_some_and(|objects| objects.remove(id.trim()).is_some()))
    }

    fn list_ids(&self, object_type: ObjectType) -> StoreResult<Vec<String>> {
        let map = self.objects.read().expect("lock poisoned");
        Ok(map
            .get(&object_type)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default())
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryObjectStore")
            .field("object_count", &self.len())
            .finish()
    }
}
