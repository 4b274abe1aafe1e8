use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use echo_types::{ReuseReceipt, Verdict};
use serde::{Deserialize, Serialize};

use crate::config::ReputationConfig;
use crate::scoring::round6;

/// Version tag of [`ReputationReport`].
pub const REPUTATION_VERSION: &str = "echo.reputation.v1";

const MS_PER_DAY: f64 = 86_400_000.0;

/// Receipt counts per verdict.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictBreakdown {
    #[serde(rename = "SUCCESS")]
    pub success: usize,
    #[serde(rename = "PARTIAL")]
    pub partial: usize,
    #[serde(rename = "FAIL")]
    pub fail: usize,
}

impl VerdictBreakdown {
    pub fn record(&mut self, verdict: Verdict) {
        match verdict {
            Verdict::Success => self.success += 1,
            Verdict::Partial => self.partial += 1,
            Verdict::Fail => self.fail += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.success + self.partial + self.fail
    }

    /// Both SUCCESS and FAIL were reported.
    pub fn is_contested(&self) -> bool {
        self.success > 0 && self.fail > 0
    }
}

/// A target EO an agent issued receipts about.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSummary {
    pub target_eo_id: String,
    pub receipts_total: usize,
    pub status_breakdown: VerdictBreakdown,
}

/// Audit view of one agent's reputation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReputationReport {
    pub version: String,
    pub agent_did: String,
    pub score: f64,
    pub receipts_total: usize,
    pub success_receipts: usize,
    pub status_breakdown: VerdictBreakdown,
    pub evidence_factor: f64,
    pub contradiction_rate: f64,
    /// Sum of decayed receipt weights.
    pub effective_weight: f64,
    pub top_targets: Vec<TargetSummary>,
    pub evaluated_at: String,
}

#[derive(Clone, Debug)]
struct WeightedReceipt {
    target: String,
    verdict: Verdict,
    weight: f64,
}

/// Aggregates reuse receipts into per-agent reliability scores.
///
/// Built once from a snapshot of receipts and a clock instant:
///
/// - each receipt weighs `0.5^(age_days / half_life_days)`; receipts from the
///   future weigh 1 and undated ones weigh as one half-life
/// - `ratio` is the weighted mean verdict value (SUCCESS 1, PARTIAL 0.5, FAIL 0)
/// - `evidence_factor = W / (W + evidence_prior)` with `W` the total weight
/// - a target is contested when, across all agents, it has both SUCCESS and
///   FAIL receipts; `contradiction_rate` is the weight share of the agent's
///   receipts on contested targets
/// - `score = clamp(ratio * evidence_factor * (1 - penalty * contradiction_rate), 0, 1)`
///
/// Scores are rounded to six decimals.
#[derive(Clone, Debug)]
pub struct ReputationAccumulator {
    config: ReputationConfig,
    evaluated_at: DateTime<Utc>,
    by_agent: BTreeMap<String, Vec<WeightedReceipt>>,
    contested: HashSet<String>,
}

impl ReputationAccumulator {
    pub fn from_receipts<'a, I>(receipts: I, now: DateTime<Utc>, config: ReputationConfig) -> Self
    where
        I: IntoIterator<Item = &'a ReuseReceipt>,
    {
        let mut per_target: HashMap<String, VerdictBreakdown> = HashMap::new();
        let mut by_agent: BTreeMap<String, Vec<WeightedReceipt>> = BTreeMap::new();

        for rr in receipts {
            let target = rr.target_eo_id.trim().to_string();
            per_target.entry(target.clone()).or_default().record(rr.verdict);

            let issuer = rr.issuer_agent_did.trim();
            if issuer.is_empty() {
                continue;
            }
            let weight = decay_weight(rr.issued_at(), now, config.half_life_days);
            by_agent.entry(issuer.to_string()).or_default().push(WeightedReceipt {
                target,
                verdict: rr.verdict,
                weight,
            });
        }

        let contested = per_target
            .into_iter()
            .filter(|(_, b)| b.is_contested())
            .map(|(target, _)| target)
            .collect();

        Self {
            config,
            evaluated_at: now,
            by_agent,
            contested,
        }
    }

    /// Agents that issued at least one receipt, sorted.
    pub fn agents(&self) -> impl Iterator<Item = &str> {
        self.by_agent.keys().map(String::as_str)
    }

    /// Whether a target has both SUCCESS and FAIL receipts.
    pub fn is_contested(&self, target_eo_id: &str) -> bool {
        self.contested.contains(target_eo_id)
    }

    /// Reliability of an agent in `[0, 1]`; zero for unknown agents.
    pub fn score(&self, agent_did: &str) -> f64 {
        match self.by_agent.get(agent_did.trim()) {
            Some(receipts) => self.components(receipts).score,
            None => 0.0,
        }
    }

    /// Full audit report for an agent.
    pub fn report(&self, agent_did: &str) -> ReputationReport {
        let agent_did = agent_did.trim();
        let receipts = self
            .by_agent
            .get(agent_did)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let mut breakdown = VerdictBreakdown::default();
        let mut targets: BTreeMap<&str, VerdictBreakdown> = BTreeMap::new();
        for r in receipts {
            breakdown.record(r.verdict);
            targets.entry(r.target.as_str()).or_default().record(r.verdict);
        }

        let mut top_targets: Vec<TargetSummary> = targets
            .into_iter()
            .map(|(target, b)| TargetSummary {
                target_eo_id: target.to_string(),
                receipts_total: b.total(),
                status_breakdown: b,
            })
            .collect();
        // BTreeMap order breaks count ties by target id.
        top_targets.sort_by(|a, b| b.receipts_total.cmp(&a.receipts_total));
        top_targets.truncate(self.config.top_targets);

        let c = self.components(receipts);
        ReputationReport {
            version: REPUTATION_VERSION.to_string(),
            agent_did: agent_did.to_string(),
            score: c.score,
            receipts_total: breakdown.total(),
            success_receipts: breakdown.success,
            status_breakdown: breakdown,
            evidence_factor: round6(c.evidence_factor),
            contradiction_rate: round6(c.contradiction_rate),
            effective_weight: round6(c.weight),
            top_targets,
            evaluated_at: self.evaluated_at.to_rfc3339(),
        }
    }

    fn components(&self, receipts: &[WeightedReceipt]) -> Components {
        let weight: f64 = receipts.iter().map(|r| r.weight).sum();
        if receipts.is_empty() || weight <= 0.0 {
            return Components::default();
        }
        let positive: f64 = receipts.iter().map(|r| r.weight * verdict_value(r.verdict)).sum();
        let contested: f64 = receipts
            .iter()
            .filter(|r| self.contested.contains(&r.target))
            .map(|r| r.weight)
            .sum();

        let ratio = positive / weight;
        let evidence_factor = weight / (weight + self.config.evidence_prior);
        let contradiction_rate = contested / weight;
        let raw = ratio * evidence_factor * (1.0 - self.config.contradiction_penalty * contradiction_rate);

        Components {
            weight,
            evidence_factor,
            contradiction_rate,
            score: round6(raw.clamp(0.0, 1.0)),
        }
    }
}

#[derive(Default)]
struct Components {
    weight: f64,
    evidence_factor: f64,
    contradiction_rate: f64,
    score: f64,
}

fn verdict_value(verdict: Verdict) -> f64 {
    match verdict {
        Verdict::Success => 1.0,
        Verdict::Partial => 0.5,
        Verdict::Fail => 0.0,
    }
}

/// Weight of a receipt issued at `issued_at`, seen at `now`.
fn decay_weight(issued_at: Option<DateTime<Utc>>, now: DateTime<Utc>, half_life_days: f64) -> f64 {
    let age_days = match issued_at {
        Some(at) => ((now - at).num_milliseconds() as f64 / MS_PER_DAY).max(0.0),
        None => half_life_days,
    };
    0.5_f64.powf(age_days / half_life_days)
}
