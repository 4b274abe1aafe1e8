//! Foundation types for the ECHO reference node.
//!
//! This crate provides the object-type table, id derivation, and the typed
//! protocol objects used throughout the node. Every other ECHO crate depends
//! on `echo-types`.
//!
//! # Key Types
//!
//! - [`ObjectType`] -- The closed set of protocol object types (`eo`, `rr`, ...)
//! - [`ProtocolObject`] -- Tagged union over validated objects, one case per type
//! - [`ExperienceObject`] -- Typed view of an EO used by ranking
//! - [`ReuseReceipt`] -- Typed view of an RR used by reputation
//! - [`Clock`] -- Wall-clock seam so decay-dependent code stays reproducible

pub mod error;
pub mod experience;
pub mod kind;
mod lenient;
pub mod object;
pub mod receipt;
pub mod temporal;

pub use error::TypeError;
pub use experience::{ExperienceObject, OutcomeMetrics, ShareLevel};
pub use kind::ObjectType;
pub use object::{object_id_for, GenericObject, ProtocolObject};
pub use receipt::{ReuseReceipt, Verdict};
pub use temporal::{parse_timestamp, Clock, FixedClock, SystemClock};
