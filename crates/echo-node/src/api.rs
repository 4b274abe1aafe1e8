//! Request and response shapes of the node operations.

use std::path::PathBuf;

use echo_rank::{RankedHit, ScoreBreakdown};
use echo_search::{SearchHit, SearchOp};
use echo_types::ObjectType;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A field search, optionally trust-ranked.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub object_type: ObjectType,
    pub field: String,
    pub op: SearchOp,
    pub value: String,
    /// Order experience objects by trust-weighted score instead of index order.
    #[serde(default)]
    pub rank: bool,
    /// Attach the score components of each ranked hit.
    #[serde(default)]
    pub explain: bool,
    /// Falls back to the configured default when absent.
    #[serde(default)]
    pub limit: Option<usize>,
}

impl SearchRequest {
    pub fn new(object_type: ObjectType, field: impl Into<String>, op: SearchOp, value: impl Into<String>) -> Self {
        Self {
            object_type,
            field: field.into(),
            op,
            value: value.into(),
            rank: false,
            explain: false,
            limit: None,
        }
    }

    pub fn ranked(mut self) -> Self {
        self.rank = true;
        self
    }

    /// Ranked, with score components.
    pub fn explained(mut self) -> Self {
        self.rank = true;
        self.explain = true;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Matches before the limit was applied.
    pub count: usize,
    /// Whether `results` are in score order.
    pub ranked: bool,
    pub results: Vec<NodeHit>,
}

impl SearchResponse {
    pub fn ids(&self) -> Vec<&str> {
        self.results.iter().map(|hit| hit.id.as_str()).collect()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeHit {
    pub id: String,
    pub object: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explain: Option<ScoreBreakdown>,
}

impl From<SearchHit> for NodeHit {
    fn from(hit: SearchHit) -> Self {
        Self {
            id: hit.id,
            object: hit.object,
            score: None,
            explain: None,
        }
    }
}

impl From<RankedHit> for NodeHit {
    fn from(hit: RankedHit) -> Self {
        Self {
            id: hit.id,
            object: hit.object,
            score: Some(hit.score),
            explain: hit.explain,
        }
    }
}

/// Result of a successful store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stored {
    pub object_type: ObjectType,
    pub id: String,
    /// An object with the same id was overwritten.
    pub replaced: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
    pub service: String,
    pub manifest: PathBuf,
    pub schemas_dir: PathBuf,
    pub storage_root: PathBuf,
    pub protocol_version: Value,
}
