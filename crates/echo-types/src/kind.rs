use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TypeError;

/// The closed set of protocol object types a node stores.
///
/// Each type has a short tag (used in storage paths, the index file and
/// transport requests), a canonical family name (used to look up the schema in
/// the manifest) and a fixed id field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    /// Experience object (`eo_id`).
    Eo,
    /// Trace object (`trace_id`).
    Trace,
    /// Request object (`rq_id`).
    Request,
    /// Reuse receipt (`rr_id`).
    Rr,
    /// Agent announcement (`aao_id`).
    Aao,
    /// Referral object (`ref_id`).
    Referral,
    /// Seed update object (`su_id`).
    #[serde(rename = "seedupdate")]
    SeedUpdate,
}

impl ObjectType {
    /// Every type, in the fixed order used for iteration and lock acquisition.
    pub const ALL: [ObjectType; 7] = [
        ObjectType::Eo,
        ObjectType::Trace,
        ObjectType::Request,
        ObjectType::Rr,
        ObjectType::Aao,
        ObjectType::Referral,
        ObjectType::SeedUpdate,
    ];

    /// Short type tag, e.g. `"eo"`.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Eo => "eo",
            Self::Trace => "trace",
            Self::Request => "request",
            Self::Rr => "rr",
            Self::Aao => "aao",
            Self::Referral => "referral",
            Self::SeedUpdate => "seedupdate",
        }
    }

    /// Canonical family name as it appears in the manifest.
    pub const fn family(&self) -> &'static str {
        match self {
            Self::Eo => "ExperienceObject",
            Self::Trace => "TraceObject",
            Self::Request => "RequestObject",
            Self::Rr => "ReuseReceipt",
            Self::Aao => "AgentAnnouncement",
            Self::Referral => "ReferralObject",
            Self::SeedUpdate => "SeedUpdateObject",
        }
    }

    /// The field that carries this type's id.
    pub const fn id_field(&self) -> &'static str {
        match self {
            Self::Eo => "eo_id",
            Self::Trace => "trace_id",
            Self::Request => "rq_id",
            Self::Rr => "rr_id",
            Self::Aao => "aao_id",
            Self::Referral => "ref_id",
            Self::SeedUpdate => "su_id",
        }
    }

    /// Storage directory name, relative to the storage root.
    pub const fn dir(&self) -> &'static str {
        self.as_str()
    }

    /// Index of this type within [`ObjectType::ALL`].
    pub fn ordinal(&self) -> usize {
        Self::ALL
            .iter()
            .position(|t| t == self)
            .unwrap_or_default()
    }

    /// Comma-separated, sorted list of the allowed type tags.
    pub fn allowed() -> String {
        let mut tags: Vec<&str> = Self::ALL.iter().map(|t| t.as_str()).collect();
        tags.sort_unstable();
        tags.join(", ")
    }

    /// Infer the type of an untagged object from the id field it carries.
    ///
    /// Exactly one known id field must be present as a non-blank string.
    pub fn infer(value: &Value) -> Result<Self, TypeError> {
        let map = value.as_object().ok_or(TypeError::NotAnObject)?;
        let matches: Vec<ObjectType> = Self::ALL
            .iter()
            .copied()
            .filter(|t| {
                map.get(t.id_field())
                    .and_then(Value::as_str)
                    .is_some_and(|s| !s.trim().is_empty())
            })
            .collect();

        match matches.as_slice() {
            [only] => Ok(*only),
            [] => Err(TypeError::NoIdField),
            many => Err(TypeError::AmbiguousIdFields(
                many.iter()
                    .map(|t| t.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            )),
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectType {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| TypeError::UnknownType {
                given: s.to_string(),
                allowed: Self::allowed(),
            })
    }
}
