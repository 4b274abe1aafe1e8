//! The ECHO reference node.
//!
//! [`Node`] is the facade transport adapters call: validate, store, get,
//! search (optionally trust-ranked), bundle export and import, and stats.
//! It wires the schema registry, object store, derived index, search,
//! ranking and bundle engines together and serialises writers per object
//! type.
//!
//! # Example
//!
//! ```no_run
//! use echo_node::{Node, NodeConfig, SearchRequest};
//! use echo_search::SearchOp;
//! use echo_types::ObjectType;
//!
//! let node = Node::open(NodeConfig::load("node.toml".as_ref())?)?;
//! let hits = node.search(
//!     &SearchRequest::new(ObjectType::Eo, "eo_id", SearchOp::Prefix, "echo.eo").explained(),
//! )?;
//! println!("{} matches", hits.count);
//! # Ok::<(), echo_node::NodeError>(())
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod fixtures;
pub mod locks;
pub mod metrics;
pub mod node;
pub mod stats;
pub mod telemetry;

pub use api::{Health, NodeHit, SearchRequest, SearchResponse, Stored};
pub use config::{NodeConfig, SearchConfig};
pub use error::{NodeError, NodeResult};
pub use locks::TypeLocks;
pub use metrics::{SimMetric, SimMetrics, SIM_METRICS_CONTRACT_VERSION};
pub use node::Node;
pub use stats::NodeStats;
pub use telemetry::init_tracing;

pub use echo_bundle::{Bundle, ImportOptions, ImportReport};
pub use echo_rank::{ReputationReport, ScoreBreakdown};
