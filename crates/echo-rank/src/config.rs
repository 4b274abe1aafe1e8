use serde::{Deserialize, Serialize};

use crate::error::{RankError, RankResult};

/// Constants of the reputation model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReputationConfig {
    /// Age at which a receipt counts half as much as a fresh one.
    pub half_life_days: f64,
    /// Pseudo-count added to the total weight: `evidence = W / (W + prior)`.
    pub evidence_prior: f64,
    /// Share of the score lost when every receipt sits on a contested target.
    pub contradiction_penalty: f64,
    /// How many targets a report lists.
    pub top_targets: usize,
}

impl Default for ReputationConfig {
    fn default() -> Self {
        Self {
            half_life_days: 30.0,
            evidence_prior: 2.0,
            contradiction_penalty: 0.6,
            top_targets: 5,
        }
    }
}

impl ReputationConfig {
    pub fn validate(&self) -> RankResult<()> {
        positive("half_life_days", self.half_life_days)?;
        positive("evidence_prior", self.evidence_prior)?;
        finite("contradiction_penalty", self.contradiction_penalty)?;
        if !(0.0..=1.0).contains(&self.contradiction_penalty) {
            return Err(RankError::PenaltyOutOfRange(self.contradiction_penalty));
        }
        Ok(())
    }
}

/// Weights of the three-term EO score.
///
/// `score = confidence * confidence_score + outcome * outcome_bonus_value + evidence * receipt_evidence`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingWeights {
    pub confidence: f64,
    pub outcome: f64,
    /// Bonus applied when `outcome_metrics` is present.
    pub outcome_bonus: f64,
    pub evidence: f64,
    /// Per-receipt verdict weights, multiplied by issuer reliability.
    pub success: f64,
    pub partial: f64,
    pub fail: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            confidence: 10.0,
            outcome: 1.0,
            outcome_bonus: 2.0,
            evidence: 1.5,
            success: 1.0,
            partial: 0.0,
            fail: -0.5,
        }
    }
}

impl RankingWeights {
    pub fn validate(&self) -> RankResult<()> {
        for (name, value) in [
            ("confidence", self.confidence),
            ("outcome", self.outcome),
            ("outcome_bonus", self.outcome_bonus),
            ("evidence", self.evidence),
            ("success", self.success),
            ("partial", self.partial),
            ("fail", self.fail),
        ] {
            finite(name, value)?;
        }
        Ok(())
    }
}

fn finite(name: &'static str, value: f64) -> RankResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(RankError::NonFinite { name, value })
    }
}

fn positive(name: &'static str, value: f64) -> RankResult<()> {
    finite(name, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(RankError::NotPositive { name, value })
    }
}
