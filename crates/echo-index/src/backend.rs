use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use echo_store::write_json_atomic;
use serde_json::Value;

use crate::error::IndexResult;
use crate::index::Index;

/// File name of the index artifact under the storage root.
pub const INDEX_FILE: &str = "index.json";

/// Result of loading a persisted index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IndexLoad {
    /// Parsed and normalised.
    Loaded(Index),
    /// No index has been written yet.
    Missing,
    /// The artifact exists but is not valid JSON.
    Corrupt(String),
}

/// Persistence for the index artifact.
pub trait IndexBackend: Send + Sync {
    fn load(&self) -> IndexResult<IndexLoad>;

    fn save(&self, index: &Index) -> IndexResult<()>;

    /// Remove the artifact. Returns `true` if one existed.
    fn remove(&self) -> IndexResult<bool>;

    /// Filesystem location, if any.
    fn location(&self) -> Option<&Path> {
        None
    }
}

fn parse(text: &str) -> IndexLoad {
    match serde_json::from_str::<Value>(text) {
        Ok(raw) => IndexLoad::Loaded(Index::normalize(&raw)),
        Err(e) => IndexLoad::Corrupt(e.to_string()),
    }
}

/// `index.json` on disk, rewritten atomically on every save.
#[derive(Clone, Debug)]
pub struct FsIndexBackend {
    path: PathBuf,
}

impl FsIndexBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<storage_root>/index.json`.
    pub fn at_root(storage_root: &Path) -> Self {
        Self::new(storage_root.join(INDEX_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl IndexBackend for FsIndexBackend {
    fn load(&self) -> IndexResult<IndexLoad> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => Ok(parse(&text)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(IndexLoad::Missing),
            // Invalid UTF-8 is a damaged file, not a damaged disk.
            Err(e) if e.kind() == io::ErrorKind::InvalidData => Ok(IndexLoad::Corrupt(e.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, index: &Index) -> IndexResult<()> {
        write_json_atomic(&self.path, &index.to_value())?;
        Ok(())
    }

    fn remove(&self) -> IndexResult<bool> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn location(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

/// Index artifact held in memory as raw text, for tests and embedding.
#[derive(Debug, Default)]
pub struct InMemoryIndexBackend {
    text: RwLock<Option<String>>,
}

impl InMemoryIndexBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the stored artifact with arbitrary text.
    pub fn set_raw(&self, text: impl Into<String>) {
        *self.text.write().expect("lock poisoned") = Some(text.into());
    }

    /// The stored artifact, if any.
    pub fn raw(&self) -> Option<String> {
        self.text.read().expect("lock poisoned").clone()
    }
}

impl IndexBackend for InMemoryIndexBackend {
    fn load(&self) -> IndexResult<IndexLoad> {
        Ok(match self.text.read().expect("lock poisoned").as_deref() {
            Some(text) => parse(text),
            None => IndexLoad::Missing,
        })
    }

    fn save(&self, index: &Index) -> IndexResult<()> {
        self.set_raw(index.to_value().to_string());
        Ok(())
    }

    fn remove(&self) -> IndexResult<bool> {
        Ok(self.text.write().expect("lock poisoned").take().is_some())
    }
}
