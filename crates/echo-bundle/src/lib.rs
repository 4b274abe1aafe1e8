//! Bundle export and atomic import for the ECHO reference node.
//!
//! A bundle is a plain JSON document carrying the manifest versions it was
//! written under and an ordered list of objects. Items carry no type tag; the
//! type is inferred from the one known id field each object holds.
//!
//! # Import Contract
//!
//! 1. Every item is checked (shape, type inference, id, duplicates, schema)
//!    before anything is written.
//! 2. A single failing item rejects the whole bundle with the aggregate
//!    error list, and nothing in the store or index changes.
//! 3. Only then is every object stored and indexed. If the storage medium
//!    fails midway, the writes already made are undone.

pub mod bundle;
pub mod engine;
pub mod error;

pub use bundle::Bundle;
pub use engine::{BundleEngine, ImportOptions, ImportReport};
pub use error::{BundleError, BundleResult};
