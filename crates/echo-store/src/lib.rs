//! Object storage for the ECHO reference node.
//!
//! One validated object is stored per `(type, id)`. The id is derived from
//! the type's fixed id field, never supplied separately, so a stored object
//! always names itself.
//!
//! # Storage Backends
//!
//! All backends implement the [`ObjectStore`] trait:
//!
//! - [`FsObjectStore`] -- one pretty-printed JSON file per object under
//!   `<root>/<type>/<safe id>.json`, written atomically
//! - [`InMemoryObjectStore`] -- map-based store for tests and embedding
//!
//! # Design Rules
//!
//! 1. The store is authoritative. Every derived structure (the index) is
//!    rebuilt from [`ObjectStore::list_ids`].
//! 2. Writes replace: re-storing an id overwrites its content.
//! 3. The store never validates; callers hand it objects that already passed
//!    schema validation.
//! 4. Unreadable content is skipped and logged. Only a failing storage medium
//!    is an error.

pub mod error;
pub mod fs;
pub mod memory;
pub mod path;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use fs::{write_json_atomic, FsObjectStore};
pub use memory::InMemoryObjectStore;
pub use path::{object_file_name, safe_filename};
pub use traits::ObjectStore;
