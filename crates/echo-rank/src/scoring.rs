use echo_types::{ExperienceObject, ReuseReceipt, Verdict};
use serde::{Deserialize, Serialize};

use crate::config::RankingWeights;
use crate::reputation::ReputationAccumulator;

/// Round to six decimals, the precision scores are reported in. Negative
/// zero comes out as zero.
pub fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0 + 0.0
}

/// Components of an EO score, as returned by an explained search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub confidence: f64,
    pub outcome_bonus: f64,
    pub receipt_evidence: f64,
    pub total: f64,
}

/// How candidate experience objects are scored.
pub trait ScoringStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// Score `eo` given the receipts that target it, sorted by `rr_id`.
    fn score(
        &self,
        eo: &ExperienceObject,
        evidence: &[&ReuseReceipt],
        reputation: &ReputationAccumulator,
    ) -> ScoreBreakdown;
}

/// The three-term score: confidence, outcome-metrics bonus and receipt
/// evidence weighted by issuer reliability.
#[derive(Clone, Debug, Default)]
pub struct ReceiptEvidenceScorer {
    weights: RankingWeights,
}

impl ReceiptEvidenceScorer {
    pub fn new(weights: RankingWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &RankingWeights {
        &self.weights
    }

    fn verdict_weight(&self, verdict: Verdict) -> f64 {
        match verdict {
            Verdict::Success => self.weights.success,
            Verdict::Partial => self.weights.partial,
            Verdict::Fail => self.weights.fail,
        }
    }
}

impl ScoringStrategy for ReceiptEvidenceScorer {
    fn name(&self) -> &str {
        "receipt-evidence"
    }

    fn score(
        &self,
        eo: &ExperienceObject,
        evidence: &[&ReuseReceipt],
        reputation: &ReputationAccumulator,
    ) -> ScoreBreakdown {
        let w = &self.weights;
        let confidence = eo.confidence();
        let outcome_bonus = if eo.has_outcome_metrics() {
            w.outcome_bonus
        } else {
            0.0
        };
        let receipt_evidence: f64 = evidence
            .iter()
            .map(|rr| self.verdict_weight(rr.verdict) * reputation.score(&rr.issuer_agent_did))
            .sum();

        let total = w.confidence * confidence + w.outcome * outcome_bonus + w.evidence * receipt_evidence;
        ScoreBreakdown {
            confidence: round6(confidence),
            outcome_bonus: round6(outcome_bonus),
            receipt_evidence: round6(receipt_evidence),
            total: round6(total),
        }
    }
}
