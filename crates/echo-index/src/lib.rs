//! Derived id index for the ECHO reference node.
//!
//! The index lists, per object type, the ids known to the store in insertion
//! order. It is a cache, never a source of truth: every read compares it with
//! the store and rebuilds it when the two disagree.
//!
//! # Key Types
//!
//! - [`Index`] -- In-memory index, one [`TypeIndex`] per object type
//! - [`IndexBackend`] -- Where the index is persisted ([`FsIndexBackend`] writes `index.json`)
//! - [`IndexManager`] -- Serialised load-modify-save plus self-healing reads

pub mod backend;
pub mod error;
pub mod index;
pub mod manager;

pub use backend::{FsIndexBackend, InMemoryIndexBackend, IndexBackend, IndexLoad, INDEX_FILE};
pub use error::{IndexError, IndexResult};
pub use index::{Index, TypeIndex};
pub use manager::IndexManager;
