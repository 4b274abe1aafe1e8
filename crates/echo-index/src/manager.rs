use std::path::Path;
use std::sync::Mutex;

use echo_store::ObjectStore;
use echo_types::ObjectType;
use tracing::{debug, info, warn};

use crate::backend::{IndexBackend, IndexLoad};
use crate::error::IndexResult;
use crate::index::{Index, TypeIndex};

/// Owns the persisted index and keeps it consistent with the store.
///
/// Every load-modify-save cycle runs under one mutex, so concurrent writers
/// of different types never lose each other's entries. Reads through
/// [`IndexManager::ids`] heal the index first whenever it is missing,
/// unparseable, or names a different id set than the store holds.
pub struct IndexManager {
    backend: Box<dyn IndexBackend>,
    guard: Mutex<()>,
}

impl std::fmt::Debug for IndexManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexManager")
            .field("location", &self.backend.location())
            .finish()
    }
}

impl IndexManager {
    pub fn new(backend: impl IndexBackend + 'static) -> Self {
        Self::with_backend(Box::new(backend))
    }

    pub fn with_backend(backend: Box<dyn IndexBackend>) -> Self {
        Self {
            backend,
            guard: Mutex::new(()),
        }
    }

    /// Filesystem location of the index artifact, if any.
    pub fn location(&self) -> Option<&Path> {
        self.backend.location()
    }

    /// The persisted index as-is, without healing.
    pub fn load(&self) -> IndexResult<IndexLoad> {
        let _guard = self.guard.lock().expect("lock poisoned");
        self.backend.load()
    }

    /// Record a stored id. Idempotent; returns `true` if it was new.
    pub fn add(&self, store: &dyn ObjectStore, object_type: ObjectType, id: &str) -> IndexResult<bool> {
        let _guard = self.guard.lock().expect("lock poisoned");
        let (mut index, rebuilt) = self.current(store)?;
        let added = index.add(object_type, id);
        if added || rebuilt {
            self.backend.save(&index)?;
            debug!(object_type = %object_type, id, "indexed");
        }
        Ok(added)
    }

    /// Record many stored ids with a single save. Returns how many were new.
    pub fn add_all(&self, store: &dyn ObjectStore, entries: &[(ObjectType, String)]) -> IndexResult<usize> {
        let _guard = self.guard.lock().expect("lock poisoned");
        let (mut index, rebuilt) = self.current(store)?;
        let mut added = 0;
        for (object_type, id) in entries {
            if index.add(*object_type, id) {
                added += 1;
            }
        }
        if added > 0 || rebuilt {
            self.backend.save(&index)?;
        }
        debug!(count = added, "indexed batch");
        Ok(added)
    }

    /// Rebuild one type from the store, in lexicographic id order.
    pub fn rebuild(&self, store: &dyn ObjectStore, object_type: ObjectType) -> IndexResult<Vec<String>> {
        let _guard = self.guard.lock().expect("lock poisoned");
        let (mut index, _) = self.current(store)?;
        let ids = store.list_ids(object_type)?;
        index.replace(object_type, TypeIndex::from_ids(&ids));
        self.backend.save(&index)?;
        info!(object_type = %object_type, count = ids.len(), "index rebuilt");
        Ok(ids)
    }

    /// Rebuild every type from the store.
    pub fn rebuild_all(&self, store: &dyn ObjectStore) -> IndexResult<Index> {
        let _guard = self.guard.lock().expect("lock poisoned");
        let index = build_from_store(store)?;
        self.backend.save(&index)?;
        info!(count = index.total(), "index rebuilt");
        Ok(index)
    }

    /// Indexed ids of a type, healed against the store first.
    ///
    /// Order is insertion order while the index is consistent, and
    /// lexicographic right after a rebuild.
    pub fn ids(&self, store: &dyn ObjectStore, object_type: ObjectType) -> IndexResult<Vec<String>> {
        let _guard = self.guard.lock().expect("lock poisoned");
        let stored = store.list_ids(object_type)?;

        let mut index = match self.backend.load()? {
            IndexLoad::Loaded(index) => index,
            IndexLoad::Missing if stored.is_empty() => return Ok(Vec::new()),
            IndexLoad::Missing => {
                warn!(object_type = %object_type, "index missing; rebuilding from store");
                return self.heal_all(store, object_type);
            }
            IndexLoad::Corrupt(reason) => {
                warn!(object_type = %object_type, %reason, "index corrupt; rebuilding from store");
                return self.heal_all(store, object_type);
            }
        };

        let indexed = index.get(object_type);
        if indexed.same_ids(&stored) {
            return Ok(indexed.ids().to_vec());
        }
        warn!(
            object_type = %object_type,
            indexed = indexed.len(),
            stored = stored.len(),
            "index out of sync with store; rebuilding"
        );
        index.replace(object_type, TypeIndex::from_ids(&stored));
        self.backend.save(&index)?;
        Ok(stored)
    }

    /// Put back a snapshot taken with [`IndexManager::load`].
    ///
    /// A snapshot of a missing or corrupt index removes the artifact; the
    /// next read rebuilds it.
    pub fn restore(&self, snapshot: &IndexLoad) -> IndexResult<()> {
        let _guard = self.guard.lock().expect("lock poisoned");
        match snapshot {
            IndexLoad::Loaded(index) => self.backend.save(index),
            IndexLoad::Missing | IndexLoad::Corrupt(_) => self.backend.remove().map(|_| ()),
        }
    }

    /// Delete the index artifact.
    pub fn reset(&self) -> IndexResult<bool> {
        let _guard = self.guard.lock().expect("lock poisoned");
        self.backend.remove()
    }

    fn heal_all(&self, store: &dyn ObjectStore, object_type: ObjectType) -> IndexResult<Vec<String>> {
        let index = build_from_store(store)?;
        self.backend.save(&index)?;
        Ok(index.get(object_type).ids().to_vec())
    }

    /// The persisted index, or a fresh rebuild when it is missing or corrupt.
    /// The flag is set for a rebuild, which the caller must save.
    /// Caller holds the guard.
    fn current(&self, store: &dyn ObjectStore) -> IndexResult<(Index, bool)> {
        match self.backend.load()? {
            IndexLoad::Loaded(index) => Ok((index, false)),
            IndexLoad::Missing => Ok((build_from_store(store)?, true)),
            IndexLoad::Corrupt(reason) => {
                warn!(%reason, "index corrupt; rebuilding from store");
                Ok((build_from_store(store)?, true))
            }
        }
    }
}

fn build_from_store(store: &dyn ObjectStore) -> IndexResult<Index> {
    let mut index = Index::new();
    for object_type in ObjectType::ALL {
        let ids = store.list_ids(object_type)?;
        index.replace(object_type, TypeIndex::from_ids(&ids));
    }
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{FsIndexBackend, InMemoryIndexBackend};
    use echo_store::{FsObjectStore, InMemoryObjectStore};
    use serde_json::json;
    use std::sync::Arc;

    fn put(store: &dyn ObjectStore, manager: &IndexManager, id: &str) {
        let id = store.write(ObjectType::Eo, &json!({ "eo_id": id })).unwrap();
        manager.add(store, ObjectType::Eo, &id).unwrap();
    }

    #[test]
    fn insertion_order_is_kept() {
        let store = InMemoryObjectStore::new();
        let manager = IndexManager::new(InMemoryIndexBackend::new());
        for id in ["c", "a", "b"] {
            put(&store, &manager, id);
        }
        put(&store, &manager, "a");
        assert_eq!(manager.ids(&store, ObjectType::Eo).unwrap(), vec!["c", "a", "b"]);
    }

    #[test]
    fn missing_index_is_rebuilt_lexicographically() {
        let store = InMemoryObjectStore::new();
        for id in ["z", "m", "a"] {
            store.write(ObjectType::Eo, &json!({ "eo_id": id })).unwrap();
        }
        let backend = Arc::new(InMemoryIndexBackend::new());
        let manager = IndexManager::new(SharedBackend(Arc::clone(&backend)));
        assert_eq!(manager.ids(&store, ObjectType::Eo).unwrap(), vec!["a", "m", "z"]);
        assert!(backend.raw().is_some());
    }

    #[test]
    fn empty_store_without_index_writes_nothing() {
        let store = InMemoryObjectStore::new();
        let backend = Arc::new(InMemoryIndexBackend::new());
        let manager = IndexManager::new(SharedBackend(Arc::clone(&backend)));
        assert!(manager.ids(&store, ObjectType::Rr).unwrap().is_empty());
        assert!(backend.raw().is_none());
    }

    #[test]
    fn corrupt_index_heals_on_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::open(dir.path()).unwrap();
        let manager = IndexManager::new(FsIndexBackend::at_root(dir.path()));
        put(&store, &manager, "echo.eo.2");
        put(&store, &manager, "echo.eo.1");

        std::fs::write(dir.path().join("index.json"), "{{{{").unwrap();
        assert_eq!(
            manager.ids(&store, ObjectType::Eo).unwrap(),
            vec!["echo.eo.1", "echo.eo.2"]
        );
        assert!(matches!(manager.load().unwrap(), IndexLoad::Loaded(_)));
    }

    #[test]
    fn stale_entries_and_unindexed_content_heal() {
        let store = InMemoryObjectStore::new();
        let backend = Arc::new(InMemoryIndexBackend::new());
        let manager = IndexManager::new(SharedBackend(Arc::clone(&backend)));
        put(&store, &manager, "a");

        // Index names an id with no content, and misses one that exists.
        backend.set_raw(r#"{"eo": ["ghost", "a"]}"#);
        store.write(ObjectType::Eo, &json!({ "eo_id": "b" })).unwrap();

        assert_eq!(manager.ids(&store, ObjectType::Eo).unwrap(), vec!["a", "b"]);
        match manager.load().unwrap() {
            IndexLoad::Loaded(index) => assert_eq!(index.get(ObjectType::Eo).ids(), ["a", "b"]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn add_on_missing_index_keeps_other_types() {
        let store = InMemoryObjectStore::new();
        store.write(ObjectType::Rr, &json!({ "rr_id": "r1" })).unwrap();
        let backend = Arc::new(InMemoryIndexBackend::new());
        let manager = IndexManager::new(SharedBackend(Arc::clone(&backend)));
        put(&store, &manager, "e1");
        match manager.load().unwrap() {
            IndexLoad::Loaded(index) => {
                assert_eq!(index.get(ObjectType::Rr).ids(), ["r1"]);
                assert_eq!(index.get(ObjectType::Eo).ids(), ["e1"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn snapshot_restore() {
        let store = InMemoryObjectStore::new();
        let manager = IndexManager::new(InMemoryIndexBackend::new());
        put(&store, &manager, "a");
        let snapshot = manager.load().unwrap();

        store.write(ObjectType::Eo, &json!({ "eo_id": "b" })).unwrap();
        manager
            .add_all(&store, &[(ObjectType::Eo, "b".to_string())])
            .unwrap();
        manager.restore(&snapshot).unwrap();
        assert_eq!(manager.load().unwrap(), snapshot);

        manager.restore(&IndexLoad::Missing).unwrap();
        assert_eq!(manager.load().unwrap(), IndexLoad::Missing);
    }

    #[test]
    fn explicit_rebuild_and_reset() {
        let store = InMemoryObjectStore::new();
        let manager = IndexManager::new(InMemoryIndexBackend::new());
        put(&store, &manager, "b");
        put(&store, &manager, "a");
        assert_eq!(manager.rebuild(&store, ObjectType::Eo).unwrap(), vec!["a", "b"]);
        assert_eq!(manager.rebuild_all(&store).unwrap().total(), 2);
        assert!(manager.reset().unwrap());
        assert_eq!(manager.load().unwrap(), IndexLoad::Missing);
    }

    /// Lets a test keep a handle on the backend the manager owns.
    struct SharedBackend(Arc<InMemoryIndexBackend>);

    impl IndexBackend for SharedBackend {
        fn load(&self) -> IndexResult<IndexLoad> {
            self.0.load()
        }

        fn save(&self, index: &Index) -> IndexResult<()> {
            self.0.save(index)
        }

        fn remove(&self) -> IndexResult<bool> {
            self.0.remove()
        }
    }
}
