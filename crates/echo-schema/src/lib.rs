//! Schema resolution and validation for the ECHO reference node.
//!
//! Every write is checked here first: the object type is mapped to its
//! family, the family to a `schema_id` through the manifest, and the
//! `schema_id` to a schema document that is loaded once and cached until an
//! explicit [`SchemaRegistry::reload`].
//!
//! # Pipeline
//!
//! 1. [`SchemaRegistry::resolve`] -- type -> family -> schema_id -> document
//! 2. [`validate_object`] -- signature pre-check, then structural validation
//! 3. Every violation is reported as a [`FieldError`]; malformed input is a
//!    normal outcome, never a fault.
//!
//! Signature cryptography is not implemented here. A [`SignatureVerifier`]
//! can be plugged in, and a [`SignaturePolicy`] decides whether callers may
//! skip signature checks at all.

pub mod error;
pub mod manifest;
pub mod registry;
pub mod signature;
pub mod validator;

pub use error::{SchemaError, SchemaResult};
pub use manifest::Manifest;
pub use registry::SchemaRegistry;
pub use signature::{
    SignatureCheck, SignaturePolicy, SignaturePolicyViolation, SignatureVerifier,
    PLACEHOLDER_SIGNATURE, SIGNATURE_FIELD,
};
pub use validator::{validate_object, FieldError, Validator};
