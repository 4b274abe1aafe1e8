//! The simulator metrics contract, `echo.sim.metrics.v1`.
//!
//! Simulator reports have used several key spellings over time. Extraction
//! maps every known alias onto the five canonical metrics, normalises
//! percentages, and refuses partial reports.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const SIM_METRICS_CONTRACT_VERSION: &str = "echo.sim.metrics.v1";

/// One canonical metric.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimMetric {
    TimeToFindTicks,
    UsefulHitRateTop5Pct,
    FalsePromotionRatePct,
    MissedPromotionRatePct,
    SpamSurvivalRatePct,
}

/// Comparison a target is checked with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetOp {
    #[serde(rename = "<=")]
    AtMost,
    #[serde(rename = ">=")]
    AtLeast,
}

impl SimMetric {
    pub const ALL: [SimMetric; 5] = [
        Self::TimeToFindTicks,
        Self::UsefulHitRateTop5Pct,
        Self::FalsePromotionRatePct,
        Self::MissedPromotionRatePct,
        Self::SpamSurvivalRatePct,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Self::TimeToFindTicks => "time_to_find_ticks",
            Self::UsefulHitRateTop5Pct => "useful_hit_rate_top5_pct",
            Self::FalsePromotionRatePct => "false_promotion_rate_pct",
            Self::MissedPromotionRatePct => "missed_promotion_rate_pct",
            Self::SpamSurvivalRatePct => "spam_survival_rate_pct",
        }
    }

    /// Accepted report keys, canonical first.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Self::TimeToFindTicks => &["time_to_find_ticks", "D2_time_to_find_ticks"],
            Self::UsefulHitRateTop5Pct => &["useful_hit_rate_top5_pct", "useful_hit_rate_top5", "D1_useful_top5"],
            Self::FalsePromotionRatePct => &["false_promotion_rate_pct", "T1_false_promotion_rate"],
            Self::MissedPromotionRatePct => &["missed_promotion_rate_pct", "T2_missed_promotion_rate"],
            Self::SpamSurvivalRatePct => &["spam_survival_rate_pct", "A1_spam_survival_rate"],
        }
    }

    pub fn is_percent(&self) -> bool {
        !matches!(self, Self::TimeToFindTicks)
    }

    pub fn higher_is_better(&self) -> bool {
        matches!(self, Self::UsefulHitRateTop5Pct)
    }

    /// Advisory target.
    pub fn target(&self) -> (TargetOp, f64) {
        match self {
            Self::TimeToFindTicks => (TargetOp::AtMost, 48.0),
            Self::UsefulHitRateTop5Pct => (TargetOp::AtLeast, 60.0),
            Self::FalsePromotionRatePct => (TargetOp::AtMost, 5.0),
            Self::MissedPromotionRatePct => (TargetOp::AtMost, 40.0),
            Self::SpamSurvivalRatePct => (TargetOp::AtMost, 30.0),
        }
    }
}

/// The five canonical metrics of one report.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SimMetrics(BTreeMap<SimMetric, f64>);

impl SimMetrics {
    /// Extract the metrics from a simulator report.
    ///
    /// `None` unless `report.metrics` carries a numeric value for every
    /// metric. Booleans are not numbers.
    pub fn extract(report: &Value) -> Option<Self> {
        let raw = report.get("metrics")?.as_object()?;
        let mut values = BTreeMap::new();
        for metric in SimMetric::ALL {
            let value = metric
                .aliases()
                .iter()
                .find_map(|name| raw.get(*name).and_then(as_number))?;
            let value = if metric.is_percent() {
                normalize_percent(value)
            } else {
                round4(value.max(0.0))
            };
            values.insert(metric, value);
        }
        Some(Self(values))
    }

    pub fn get(&self, metric: SimMetric) -> f64 {
        self.0.get(&metric).copied().unwrap_or_default()
    }

    /// Check every metric against its advisory target.
    pub fn evaluate(&self) -> Evaluation {
        let checks: BTreeMap<SimMetric, Check> = SimMetric::ALL
            .into_iter()
            .map(|metric| {
                let value = self.get(metric);
                let (op, target) = metric.target();
                let pass = match op {
                    TargetOp::AtMost => value <= target,
                    TargetOp::AtLeast => value >= target,
                };
                (
                    metric,
                    Check {
                        value,
                        target: Target { op, value: target },
                        pass,
                    },
                )
            })
            .collect();
        Evaluation {
            overall_pass: checks.values().all(|c| c.pass),
            checks,
        }
    }

    /// Change from `previous` to `self`.
    pub fn trend_since(&self, previous: &SimMetrics) -> Trend {
        let mut delta = BTreeMap::new();
        let mut direction = BTreeMap::new();
        for metric in SimMetric::ALL {
            let d = round4(self.get(metric) - previous.get(metric));
            let better = if metric.higher_is_better() { d > 0.0 } else { d < 0.0 };
            let dir = if d == 0.0 {
                Direction::Same
            } else if better {
                Direction::Improved
            } else {
                Direction::Regressed
            };
            delta.insert(metric, d);
            direction.insert(metric, dir);
        }
        Trend { delta, direction }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub op: TargetOp,
    pub value: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Check {
    pub value: f64,
    pub target: Target,
    pub pass: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub overall_pass: bool,
    pub checks: BTreeMap<SimMetric, Check>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Improved,
    Regressed,
    Same,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Trend {
    pub delta: BTreeMap<SimMetric, f64>,
    pub direction: BTreeMap<SimMetric, Direction>,
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// Ratios in `[0, 1]` become percentages; the result is clamped to `[0, 100]`.
fn normalize_percent(value: f64) -> f64 {
    let pct = if (0.0..=1.0).contains(&value) { value * 100.0 } else { value };
    round4(pct.clamp(0.0, 100.0))
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
