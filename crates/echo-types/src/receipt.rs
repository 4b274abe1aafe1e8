use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::experience::OutcomeMetrics;
use crate::lenient;
use crate::temporal::parse_timestamp;

/// Outcome an agent reports after reusing an experience object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Success,
    Partial,
    Fail,
}

impl Verdict {
    pub const ALL: [Verdict; 3] = [Verdict::Success, Verdict::Partial, Verdict::Fail];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Partial => "PARTIAL",
            Self::Fail => "FAIL",
        }
    }

    /// Returns `true` for verdicts that directly oppose each other.
    pub fn contradicts(&self, other: &Verdict) -> bool {
        matches!(
            (self, other),
            (Self::Success, Self::Fail) | (Self::Fail, Self::Success)
        )
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed view of a validated reuse receipt.
///
/// `target_eo_id` is a weak reference: the target may not exist locally.
/// The issuer is read from `issuer_agent_did`, or from `issuer_did` when
/// that is absent or blank; the issue time from `created_at`, falling back
/// to `timestamp`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireReceipt")]
pub struct ReuseReceipt {
    pub rr_id: String,
    pub issuer_agent_did: String,
    pub target_eo_id: String,
    pub verdict: Verdict,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome_metrics: Option<OutcomeMetrics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

#[derive(Deserialize)]
struct WireReceipt {
    rr_id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    issuer_agent_did: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    issuer_did: Option<String>,
    target_eo_id: String,
    verdict: Verdict,
    #[serde(default, deserialize_with = "lenient::metrics")]
    outcome_metrics: Option<OutcomeMetrics>,
    #[serde(default, deserialize_with = "lenient::string")]
    created_at: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    timestamp: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    signature: Option<String>,
}

impl TryFrom<WireReceipt> for ReuseReceipt {
    type Error = String;

    fn try_from(wire: WireReceipt) -> Result<Self, Self::Error> {
        let non_blank = |s: &Option<String>| s.as_ref().filter(|s| !s.trim().is_empty()).cloned();
        let issuer_agent_did = non_blank(&wire.issuer_agent_did)
            .or_else(|| non_blank(&wire.issuer_did))
            .ok_or("missing field `issuer_agent_did` (or `issuer_did`)")?;
        Ok(Self {
            rr_id: wire.rr_id,
            issuer_agent_did,
            target_eo_id: wire.target_eo_id,
            verdict: wire.verdict,
            outcome_metrics: wire.outcome_metrics,
            created_at: wire.created_at.or(wire.timestamp),
            signature: wire.signature,
        })
    }
}

impl ReuseReceipt {
    pub fn new(
        rr_id: impl Into<String>,
        issuer_agent_did: impl Into<String>,
        target_eo_id: impl Into<String>,
        verdict: Verdict,
    ) -> Self {
        Self {
            rr_id: rr_id.into(),
            issuer_agent_did: issuer_agent_did.into(),
            target_eo_id: target_eo_id.into(),
            verdict,
            outcome_metrics: None,
            created_at: None,
            signature: None,
        }
    }

    /// Set the issue time (RFC 3339).
    pub fn at(mut self, created_at: impl Into<String>) -> Self {
        self.created_at = Some(created_at.into());
        self
    }

    /// Issue time, if present and parseable.
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.created_at.as_deref().and_then(parse_timestamp)
    }
}
