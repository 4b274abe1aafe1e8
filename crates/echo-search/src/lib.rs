//! Field-level search over stored objects of one type.
//!
//! A query names a type, a top-level field, an operator and a value.
//! Comparisons are case-sensitive and run against the field's string form:
//! the raw text for strings, compact JSON for everything else. Objects
//! without the field are skipped. Results follow the index order of the
//! type; the index is healed against the store before it is read.

pub mod engine;
pub mod error;
pub mod query;

pub use engine::{field_text, Page, SearchEngine, SearchHit, SearchMatches};
pub use error::{SearchError, SearchResult};
pub use query::{effective_limit, SearchOp, SearchQuery, DEFAULT_LIMIT, MAX_LIMIT};
