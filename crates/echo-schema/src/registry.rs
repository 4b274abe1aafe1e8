use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use echo_types::ObjectType;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{SchemaError, SchemaResult};
use crate::manifest::Manifest;

/// Where schema documents come from.
enum Source {
    /// Manifest file plus a directory of `<schema_id>.json` documents.
    Files {
        manifest_path: PathBuf,
        schemas_dir: PathBuf,
    },
    /// Documents supplied up front, keyed by `schema_id`.
    Embedded {
        manifest: Manifest,
        documents: HashMap<String, Value>,
    },
}

struct RegistryState {
    manifest: Arc<Manifest>,
    cache: HashMap<ObjectType, Arc<Value>>,
    generation: u64,
}

/// Resolves object types to schema documents and caches them.
///
/// The registry is process-wide configuration: it is created once, shared by
/// reference with every operation, and only refreshed by an explicit
/// [`SchemaRegistry::reload`]. Cached documents never change underneath a
/// running validation.
pub struct SchemaRegistry {
    source: Source,
    state: RwLock<RegistryState>,
}

impl std::fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read().expect("lock poisoned");
        f.debug_struct("SchemaRegistry")
            .field("cached", &state.cache.len())
            .field("generation", &state.generation)
            .finish()
    }
}

impl SchemaRegistry {
    /// Load the manifest from disk. Fails fast on a bad manifest; schema
    /// documents are loaded lazily on first use.
    pub fn load(manifest_path: &Path, schemas_dir: &Path) -> SchemaResult<Self> {
        let manifest = Manifest::load(manifest_path)?;
        info!(manifest = %manifest_path.display(), "schema registry loaded");
        Ok(Self {
            source: Source::Files {
                manifest_path: manifest_path.to_path_buf(),
                schemas_dir: schemas_dir.to_path_buf(),
            },
            state: RwLock::new(RegistryState::new(manifest)),
        })
    }

    /// Build a registry from an in-memory manifest and documents keyed by
    /// `schema_id`.
    pub fn in_memory(manifest: Manifest, documents: HashMap<String, Value>) -> Self {
        Self {
            source: Source::Embedded {
                manifest: manifest.clone(),
                documents,
            },
            state: RwLock::new(RegistryState::new(manifest)),
        }
    }

    /// The active manifest.
    pub fn manifest(&self) -> Arc<Manifest> {
        Arc::clone(&self.state.read().expect("lock poisoned").manifest)
    }

    /// Incremented on every successful [`Self::reload`].
    pub fn generation(&self) -> u64 {
        self.state.read().expect("lock poisoned").generation
    }

    /// Number of schema documents currently cached.
    pub fn cached_len(&self) -> usize {
        self.state.read().expect("lock poisoned").cache.len()
    }

    /// Resolve the schema document for a type, loading it on first use.
    pub fn resolve(&self, object_type: ObjectType) -> SchemaResult<Arc<Value>> {
        let manifest = {
            let state = self.state.read().expect("lock poisoned");
            if let Some(schema) = state.cache.get(&object_type) {
                return Ok(Arc::clone(schema));
            }
            Arc::clone(&state.manifest)
        };

        let schema = Arc::new(self.load_document(object_type, &manifest)?);
        debug!(object_type = %object_type, "schema cached");

        let mut state = self.state.write().expect("lock poisoned");
        // A concurrent reload may have swapped the manifest; only cache
        // documents resolved against the current one.
        if Arc::ptr_eq(&state.manifest, &manifest) {
            let cached = state
                .cache
                .entry(object_type)
                .or_insert_with(|| Arc::clone(&schema));
            return Ok(Arc::clone(cached));
        }
        Ok(schema)
    }

    /// Path of the schema file for a type. `None` for embedded registries.
    pub fn schema_path(&self, object_type: ObjectType) -> SchemaResult<Option<PathBuf>> {
        match &self.source {
            Source::Files {
                manifest_path,
                schemas_dir,
            } => {
                let manifest = self.manifest();
                resolve_schema_path(object_type, &manifest, schemas_dir, manifest_path).map(Some)
            }
            Source::Embedded { .. } => Ok(None),
        }
    }

    /// Re-read the manifest and drop every cached schema.
    pub fn reload(&self) -> SchemaResult<()> {
        let manifest = match &self.source {
            Source::Files { manifest_path, .. } => Manifest::load(manifest_path)?,
            Source::Embedded { manifest, .. } => manifest.clone(),
        };
        let mut state = self.state.write().expect("lock poisoned");
        state.manifest = Arc::new(manifest);
        state.cache.clear();
        state.generation += 1;
        info!(generation = state.generation, "schema registry reloaded");
        Ok(())
    }

    fn load_document(&self, object_type: ObjectType, manifest: &Manifest) -> SchemaResult<Value> {
        match &self.source {
            Source::Files {
                manifest_path,
                schemas_dir,
            } => {
                let path = resolve_schema_path(object_type, manifest, schemas_dir, manifest_path)?;
                read_schema_file(object_type, &path)
            }
            Source::Embedded { documents, .. } => {
                let schema_id = manifest.schema_id(object_type)?;
                documents
                    .get(&schema_id)
                    .cloned()
                    .ok_or_else(|| SchemaError::SchemaFileNotFound {
                        object_type: object_type.to_string(),
                        path: PathBuf::from(format!("{schema_id}.json")),
                    })
            }
        }
    }
}

impl RegistryState {
    fn new(manifest: Manifest) -> Self {
        Self {
            manifest: Arc::new(manifest),
            cache: HashMap::new(),
            generation: 0,
        }
    }
}

/// Resolve a schema path from `schema_id` and the optional `schema_files`
/// hint.
///
/// The file is `<schema_id>.json` under `schemas_dir`. A hint whose basename
/// differs from that is a configuration error. When the file is missing from
/// `schemas_dir`, the hint is tried relative to the manifest's directory.
fn resolve_schema_path(
    object_type: ObjectType,
    manifest: &Manifest,
    schemas_dir: &Path,
    manifest_path: &Path,
) -> SchemaResult<PathBuf> {
    let family = object_type.family();
    let schema_id = manifest.schema_id(object_type)?;
    let expected = format!("{schema_id}.json");

    let hint = manifest.schema_file_hint(object_type);
    if let Some(name) = hint
        .as_ref()
        .and_then(|h| h.file_name())
        .map(|n| n.to_string_lossy().into_owned())
    {
        if name != expected {
            return Err(SchemaError::SchemaMismatch {
                family: family.to_string(),
                schema_id,
                expected,
                got: name,
            });
        }
    }

    let path = schemas_dir.join(&expected);
    if !path.exists() {
        if let Some(hint) = hint {
            let base = manifest_path.parent().unwrap_or_else(|| Path::new("."));
            let alt = base.join(hint);
            if alt.exists() {
                return Ok(alt);
            }
        }
    }
    Ok(path)
}

fn read_schema_file(object_type: ObjectType, path: &Path) -> SchemaResult<Value> {
    if !path.exists() {
        return Err(SchemaError::SchemaFileNotFound {
            object_type: object_type.to_string(),
            path: path.to_path_buf(),
        });
    }
    let text = std::fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&text).map_err(|e| SchemaError::SchemaParse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    match value {
        Value::Object(_) | Value::Bool(_) => Ok(value),
        _ => Err(SchemaError::SchemaParse {
            path: path.to_path_buf(),
            reason: "schema payload is not an object".into(),
        }),
    }
}
