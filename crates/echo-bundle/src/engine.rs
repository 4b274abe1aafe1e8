use std::collections::{BTreeMap, BTreeSet, HashSet};

use echo_index::{IndexLoad, IndexManager};
use echo_schema::{validate_object, SchemaRegistry, SignatureVerifier};
use echo_store::{ObjectStore, StoreError};
use echo_types::{object_id_for, ObjectType};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::bundle::Bundle;
use crate::error::{BundleError, BundleResult};

/// Options for [`BundleEngine::import`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportOptions {
    #[serde(default)]
    pub skip_signature: bool,
    /// Delete every stored object of the bundle's types before storing.
    #[serde(default)]
    pub reset: bool,
}

/// What an accepted import did.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub imported: usize,
    /// Imported objects per type tag.
    pub by_type: BTreeMap<String, usize>,
    /// Imported ids that replaced an existing object.
    pub replaced: usize,
    /// Objects deleted by a reset.
    pub removed: usize,
    pub digest: String,
}

/// A bundle item that passed every check.
struct Staged<'b> {
    object_type: ObjectType,
    id: String,
    object: &'b Value,
}

/// Undo log entry: what `(type, id)` held before the import touched it.
struct Undo {
    object_type: ObjectType,
    id: String,
    previous: Option<Value>,
}

/// Exports and imports bundles against one store and its index.
///
/// The engine does not lock; callers hold exclusive access to the affected
/// types for the duration of an import.
pub struct BundleEngine<'a> {
    registry: &'a SchemaRegistry,
    store: &'a dyn ObjectStore,
    index: &'a IndexManager,
    verifier: Option<&'a dyn SignatureVerifier>,
}

impl<'a> BundleEngine<'a> {
    pub fn new(registry: &'a SchemaRegistry, store: &'a dyn ObjectStore, index: &'a IndexManager) -> Self {
        Self {
            registry,
            store,
            index,
            verifier: None,
        }
    }

    pub fn with_verifier(mut self, verifier: Option<&'a dyn SignatureVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    /// Snapshot stored objects of one type, or of every type when `scope` is
    /// `None`, in index order.
    pub fn export(&self, scope: Option<ObjectType>) -> BundleResult<Bundle> {
        let types: Vec<ObjectType> = match scope {
            Some(object_type) => vec![object_type],
            None => ObjectType::ALL.to_vec(),
        };

        let mut objects = Vec::new();
        for object_type in types {
            let ids = self.index.ids(self.store, object_type)?;
            for object in self.store.read_batch(object_type, &ids)?.into_iter().flatten() {
                objects.push(object);
            }
        }

        let bundle = Bundle::new(&self.registry.manifest(), objects);
        info!(scope = ?scope.map(|t| t.as_str()), count = bundle.len(), "bundle exported");
        Ok(bundle)
    }

    /// Check every item without storing anything.
    ///
    /// Returns the number of objects an import would store.
    pub fn check(&self, bundle: &Bundle, skip_signature: bool) -> BundleResult<usize> {
        self.stage(bundle, skip_signature).map(|staged| staged.len())
    }

    /// Validate the whole bundle, then store and index every object.
    ///
    /// Any item error rejects the bundle with [`BundleError::Validation`]
    /// before the store or index is touched.
    pub fn import(&self, bundle: &Bundle, options: ImportOptions) -> BundleResult<ImportReport> {
        self.warn_on_version_mismatch(bundle);
        let staged = self.stage(bundle, options.skip_signature)?;

        let snapshot = self.index.load()?;
        let mut undo = Vec::with_capacity(staged.len());
        match self.apply(&staged, options.reset, &mut undo) {
            Ok(mut report) => {
                report.digest = bundle.digest();
                info!(
                    imported = report.imported,
                    replaced = report.replaced,
                    removed = report.removed,
                    "bundle imported"
                );
                Ok(report)
            }
            Err(e) => {
                error!(error = %e, undo = undo.len(), "bundle import failed; rolling back");
                self.rollback(undo, &snapshot);
                Err(e)
            }
        }
    }

    fn stage<'b>(&self, bundle: &'b Bundle, skip_signature: bool) -> BundleResult<Vec<Staged<'b>>> {
        let mut staged = Vec::with_capacity(bundle.len());
        let mut seen: HashSet<(ObjectType, String)> = HashSet::new();
        let mut errors = Vec::new();

        for (i, item) in bundle.objects.iter().enumerate() {
            if !item.is_object() {
                errors.push(format!("objects[{i}]: must be a JSON object"));
                continue;
            }
            let object_type = match ObjectType::infer(item) {
                Ok(object_type) => object_type,
                Err(e) => {
                    errors.push(format!("objects[{i}]: {e}"));
                    continue;
                }
            };
            let id = match object_id_for(object_type, item) {
                Ok(id) => id,
                Err(e) => {
                    errors.push(format!("objects[{i}]: {e}"));
                    continue;
                }
            };
            if !seen.insert((object_type, id.clone())) {
                errors.push(format!(
                    "objects[{i}]: duplicate object in bundle ({object_type}:{id})"
                ));
                continue;
            }

            let field_errors = validate_object(self.registry, object_type, item, skip_signature, self.verifier)?;
            if !field_errors.is_empty() {
                errors.extend(
                    field_errors
                        .iter()
                        .map(|fe| format!("objects[{i}] ({object_type}:{id}): {fe}")),
                );
                continue;
            }

            staged.push(Staged {
                object_type,
                id,
                object: item,
            });
        }

        if !errors.is_empty() {
            warn!(items = bundle.len(), errors = errors.len(), "bundle rejected; nothing stored");
            return Err(BundleError::Validation(errors));
        }
        debug!(count = staged.len(), "bundle validated");
        Ok(staged)
    }

    fn apply(&self, staged: &[Staged<'_>], reset: bool, undo: &mut Vec<Undo>) -> BundleResult<ImportReport> {
        let mut report = ImportReport::default();

        if reset {
            let types: BTreeSet<ObjectType> = staged.iter().map(|s| s.object_type).collect();
            for object_type in types {
                for id in self.store.list_ids(object_type)? {
                    let previous = self.store.read(object_type, &id)?;
                    if self.store.delete(object_type, &id)? {
                        report.removed += 1;
                        undo.push(Undo {
                            object_type,
                            id,
                            previous,
                        });
                    }
                }
                self.index.rebuild(self.store, object_type)?;
            }
        }

        let mut entries = Vec::with_capacity(staged.len());
        for s in staged {
            let previous = self.store.read(s.object_type, &s.id)?;
            if previous.is_some() {
                report.replaced += 1;
            }
            undo.push(Undo {
                object_type: s.object_type,
                id: s.id.clone(),
                previous,
            });
            let id = self.store.write(s.object_type, s.object)?;
            *report.by_type.entry(s.object_type.to_string()).or_default() += 1;
            entries.push((s.object_type, id));
        }
        self.index.add_all(self.store, &entries)?;

        report.imported = entries.len();
        Ok(report)
    }

    /// Undo in reverse order, then put the index back. Failures here are
    /// logged; the caller already has the original error.
    fn rollback(&self, undo: Vec<Undo>, snapshot: &IndexLoad) {
        for entry in undo.into_iter().rev() {
            let result: Result<(), StoreError> = match &entry.previous {
                Some(previous) => self.store.write(entry.object_type, previous).map(|_| ()),
                None => self.store.delete(entry.object_type, &entry.id).map(|_| ()),
            };
            if let Err(e) = result {
                error!(object_type = %entry.object_type, id = %entry.id, error = %e, "rollback step failed");
            }
        }
        if let Err(e) = self.index.restore(snapshot) {
            error!(error = %e, "index restore failed");
        }
    }

    fn warn_on_version_mismatch(&self, bundle: &Bundle) {
        let ours = self.registry.manifest().protocol_version();
        if !bundle.protocol_version.is_null() && bundle.protocol_version != ours {
            warn!(
                bundle = %bundle.protocol_version,
                node = %ours,
                "bundle protocol_version differs from the active manifest"
            );
        }
    }
}
