use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::lenient;
use crate::temporal::parse_timestamp;

/// Visibility tier of an experience object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShareLevel {
    Private,
    Federated,
    GlobalAbstract,
}

impl fmt::Display for ShareLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Private => write!(f, "PRIVATE"),
            Self::Federated => write!(f, "FEDERATED"),
            Self::GlobalAbstract => write!(f, "GLOBAL_ABSTRACT"),
        }
    }
}

/// Observed outcome of applying a solution pattern.
///
/// All fields are optional; the presence of the record itself is what
/// ranking rewards. Decoding never fails: fields of an unexpected type read
/// as absent.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct OutcomeMetrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effectiveness_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stability_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iteration_count: Option<u64>,
}

impl OutcomeMetrics {
    pub fn from_json(value: &Value) -> Self {
        let field = |name: &str| value.get(name);
        Self {
            effectiveness_score: field("effectiveness_score").and_then(Value::as_f64),
            stability_score: field("stability_score").and_then(Value::as_f64),
            iteration_count: field("iteration_count").and_then(lenient::count),
        }
    }
}

impl<'de> Deserialize<'de> for OutcomeMetrics {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        Ok(Self::from_json(&Value::deserialize(d)?))
    }
}

/// Typed view of a validated experience object.
///
/// Only the fields the node reasons about are decoded; the stored JSON stays
/// the authoritative, lossless form.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExperienceObject {
    pub eo_id: String,
    #[serde(default, deserialize_with = "lenient::numbers")]
    pub problem_embedding: Vec<f64>,
    #[serde(default, deserialize_with = "lenient::numbers")]
    pub constraints_embedding: Vec<f64>,
    #[serde(default, deserialize_with = "lenient::numbers")]
    pub solution_embedding: Vec<f64>,
    #[serde(default, deserialize_with = "lenient::metrics", skip_serializing_if = "Option::is_none")]
    pub outcome_metrics: Option<OutcomeMetrics>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub confidence_score: f64,
    #[serde(default, deserialize_with = "lenient::share_level", skip_serializing_if = "Option::is_none")]
    pub share_level: Option<ShareLevel>,
    #[serde(default, deserialize_with = "lenient::string", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "lenient::string", skip_serializing_if = "Option::is_none")]
    pub protocol_version: Option<String>,
    #[serde(default, deserialize_with = "lenient::string", skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl ExperienceObject {
    /// Minimal EO with the given id and confidence.
    pub fn new(eo_id: impl Into<String>, confidence_score: f64) -> Self {
        Self {
            eo_id: eo_id.into(),
            problem_embedding: Vec::new(),
            constraints_embedding: Vec::new(),
            solution_embedding: Vec::new(),
            outcome_metrics: None,
            confidence_score,
            share_level: None,
            created_at: None,
            protocol_version: None,
            signature: None,
        }
    }

    /// Confidence clamped into `[0, 1]`; non-finite values count as zero.
    pub fn confidence(&self) -> f64 {
        if self.confidence_score.is_finite() {
            self.confidence_score.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Whether an outcome-metrics record is attached.
    pub fn has_outcome_metrics(&self) -> bool {
        self.outcome_metrics.is_some()
    }

    /// Creation time, if present and parseable.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at.as_deref().and_then(parse_timestamp)
    }
}
