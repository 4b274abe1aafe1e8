use std::collections::HashMap;
use std::sync::Arc;

use echo_search::SearchHit;
use echo_types::{ExperienceObject, OutcomeMetrics, ReuseReceipt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::reputation::ReputationAccumulator;
use crate::scoring::{round6, ReceiptEvidenceScorer, ScoreBreakdown, ScoringStrategy};

/// A search hit with its score.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankedHit {
    pub id: String,
    pub object: Value,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explain: Option<ScoreBreakdown>,
}

/// Orders experience-object hits by a [`ScoringStrategy`].
///
/// Output is sorted by score descending, then id ascending.
#[derive(Clone)]
pub struct RankingEngine {
    strategy: Arc<dyn ScoringStrategy>,
}

impl Default for RankingEngine {
    fn default() -> Self {
        Self::new(Arc::new(ReceiptEvidenceScorer::default()))
    }
}

impl std::fmt::Debug for RankingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RankingEngine")
            .field("strategy", &self.strategy.name())
            .finish()
    }
}

impl RankingEngine {
    pub fn new(strategy: Arc<dyn ScoringStrategy>) -> Self {
        Self { strategy }
    }

    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }

    /// Score and order `hits`.
    ///
    /// `receipts` is every stored receipt; each hit only sees the ones
    /// targeting it. Hits that do not decode as experience objects are
    /// scored on their raw `confidence_score` alone.
    pub fn rank(
        &self,
        hits: Vec<SearchHit>,
        receipts: &[ReuseReceipt],
        reputation: &ReputationAccumulator,
        explain: bool,
    ) -> Vec<RankedHit> {
        let mut by_target: HashMap<&str, Vec<&ReuseReceipt>> = HashMap::new();
        for rr in receipts {
            by_target.entry(rr.target_eo_id.trim()).or_default().push(rr);
        }
        for evidence in by_target.values_mut() {
            evidence.sort_by(|a, b| a.rr_id.cmp(&b.rr_id));
        }

        let mut ranked: Vec<RankedHit> = hits
            .into_iter()
            .map(|hit| {
                let eo = decode_eo(&hit);
                let evidence = by_target.get(hit.id.as_str()).map(Vec::as_slice).unwrap_or_default();
                let breakdown = self.strategy.score(&eo, evidence, reputation);
                RankedHit {
                    score: round6(breakdown.total),
                    explain: explain.then_some(breakdown),
                    id: hit.id,
                    object: hit.object,
                }
            })
            .collect();

        ranked.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        debug!(
            strategy = self.strategy.name(),
            hits = ranked.len(),
            receipts = receipts.len(),
            "ranked search hits"
        );
        ranked
    }
}

fn decode_eo(hit: &SearchHit) -> ExperienceObject {
    match serde_json::from_value::<ExperienceObject>(hit.object.clone()) {
        Ok(eo) => eo,
        Err(e) => {
            warn!(id = %hit.id, error = %e, "hit does not decode as an experience object");
            let confidence = hit
                .object
                .get("confidence_score")
                .and_then(Value::as_f64)
                .unwrap_or(0.0);
            let mut eo = ExperienceObject::new(hit.id.clone(), confidence);
            eo.outcome_metrics = hit
                .object
                .get("outcome_metrics")
                .filter(|m| !m.is_null())
                .map(OutcomeMetrics::from_json);
            eo
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReputationConfig;
    use chrono::{TimeZone, Utc};
    use echo_types::Verdict;
    use serde_json::json;

    fn hit(id: &str, confidence: f64) -> SearchHit {
        SearchHit {
            id: id.to_string(),
            object: json!({ "eo_id": id, "confidence_score": confidence }),
        }
    }

    fn reputation(receipts: &[ReuseReceipt]) -> ReputationAccumulator {
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();
        ReputationAccumulator::from_receipts(receipts, now, ReputationConfig::default())
    }

    fn track_record(agent: &str, n: usize) -> Vec<ReuseReceipt> {
        (0..n)
            .map(|i| {
                ReuseReceipt::new(format!("{agent}.h{i}"), agent, format!("{agent}.t{i}"), Verdict::Success)
                    .at("2026-05-31T00:00:00Z")
            })
            .collect()
    }

    #[test]
    fn ranking_is_deterministic() {
        let engine = RankingEngine::default();
        let mut receipts = track_record("did:a", 3);
        receipts.push(ReuseReceipt::new("rr.1", "did:a", "eo.b", Verdict::Success).at("2026-05-30T00:00:00Z"));
        let rep = reputation(&receipts);
        let hits = vec![hit("eo.a", 0.7), hit("eo.b", 0.7), hit("eo.c", 0.2)];

        let first = engine.rank(hits.clone(), &receipts, &rep, true);
        let second = engine.rank(hits, &receipts, &rep, true);
        assert_eq!(first, second);
        assert_eq!(first[0].id, "eo.b");
        assert!(first[0].explain.as_ref().unwrap().receipt_evidence > 0.0);
    }

    #[test]
    fn ties_break_by_id() {
        let engine = RankingEngine::default();
        let rep = reputation(&[]);
        let ranked = engine.rank(vec![hit("eo.z", 0.5), hit("eo.a", 0.5), hit("eo.m", 0.5)], &[], &rep, false);
        let ids: Vec<_> = ranked.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["eo.a", "eo.m", "eo.z"]);
        assert!(ranked.iter().all(|r| r.explain.is_none()));
    }

    #[test]
    fn success_from_reliable_issuer_ranks_higher() {
        let engine = RankingEngine::default();
        let mut receipts = track_record("did:strong", 10);
        receipts.extend(track_record("did:weak", 1));
        receipts.push(ReuseReceipt::new("rr.1", "did:strong", "eo.b", Verdict::Success).at("2026-05-31T00:00:00Z"));
        receipts.push(ReuseReceipt::new("rr.2", "did:weak", "eo.a", Verdict::Success).at("2026-05-31T00:00:00Z"));
        let rep = reputation(&receipts);
        assert!(rep.score("did:strong") > rep.score("did:weak"));

        let ranked = engine.rank(vec![hit("eo.a", 0.5), hit("eo.b", 0.5)], &receipts, &rep, true);
        assert_eq!(ranked[0].id, "eo.b");
        assert!(ranked[0].score > ranked[1].score);
    }

    #[test]
    fn loosely_typed_hit_keeps_confidence() {
        let engine = RankingEngine::default();
        let odd = SearchHit {
            id: "eo.odd".into(),
            object: json!({ "eo_id": "eo.odd", "confidence_score": 0.4, "share_level": 17 }),
        };
        let ranked = engine.rank(vec![odd], &[], &reputation(&[]), true);
        assert_eq!(ranked[0].score, 4.0);
    }

    #[test]
    fn outcome_bonus_follows_presence_of_record() {
        let engine = RankingEngine::default();
        let float_count = SearchHit {
            id: "eo.f".into(),
            object: json!({ "eo_id": "eo.f", "confidence_score": 0.4, "outcome_metrics": { "iteration_count": 3.0 } }),
        };
        let no_id = SearchHit {
            id: "eo.n".into(),
            object: json!({ "confidence_score": 0.4, "outcome_metrics": {} }),
        };
        let ranked = engine.rank(vec![float_count, no_id], &[], &reputation(&[]), true);
        assert_eq!(ranked[0].score, 6.0);
        assert_eq!(ranked[1].score, 6.0);
        assert_eq!(ranked[0].explain.as_ref().unwrap().outcome_bonus, 2.0);
    }

    #[test]
    fn explain_serialises_components() {
        let engine = RankingEngine::default();
        let ranked = engine.rank(vec![hit("eo.a", 0.9)], &[], &reputation(&[]), true);
        let v = serde_json::to_value(&ranked[0]).unwrap();
        assert_eq!(v["explain"]["confidence"], json!(0.9));
        assert!(v["explain"].get("receipt_evidence").is_some());

        let plain = engine.rank(vec![hit("eo.a", 0.9)], &[], &reputation(&[]), false);
        assert!(serde_json::to_value(&plain[0]).unwrap().get("explain").is_none());
    }
}
