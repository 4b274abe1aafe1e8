//! Operational statistics: stored and indexed counts plus the latest
//! simulator reports.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use echo_index::{IndexLoad, IndexManager};
use echo_store::ObjectStore;
use echo_types::ObjectType;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::NodeResult;
use crate::metrics::{Evaluation, SimMetrics, Trend, SIM_METRICS_CONTRACT_VERSION};

const SIM_REPORT_PREFIX: &str = "sim_report_";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeStats {
    pub storage_root: PathBuf,
    pub manifest: PathBuf,
    pub schemas_dir: PathBuf,
    pub index: IndexStats,
    pub objects: ObjectCounts,
    pub simulator: SimulatorReport,
    /// Reports before the latest one, newest first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub simulator_history: Vec<HistoryEntry>,
    /// Present when history was requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simulator_trend: Option<SimulatorTrend>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub path: Option<PathBuf>,
    pub exists: bool,
    pub indexed_counts: BTreeMap<String, usize>,
    /// Indexed ids with no readable object behind them. Advisory only; the
    /// next read of the type heals them.
    pub missing_file_hints: BTreeMap<String, usize>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectCounts {
    pub counts: BTreeMap<String, usize>,
    pub total: usize,
}

/// The newest simulator report.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulatorReport {
    pub found: bool,
    pub path: Option<PathBuf>,
    pub report: Option<Value>,
    pub contract_version: String,
    pub metrics: Option<SimMetrics>,
    pub evaluation: Option<Evaluation>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub path: PathBuf,
    pub metrics: Option<SimMetrics>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulatorTrend {
    /// Whether both the latest and the previous report carry metrics.
    pub has_baseline: bool,
    pub latest: Option<PathBuf>,
    pub previous: Option<PathBuf>,
    pub trend: Option<Trend>,
}

/// Stored and indexed counts per type. Reads the index as persisted,
/// without healing it.
pub(crate) fn object_stats(store: &dyn ObjectStore, index: &IndexManager) -> NodeResult<(IndexStats, ObjectCounts)> {
    let loaded = index.load()?;
    let mut index_stats = IndexStats {
        path: index.location().map(Path::to_path_buf),
        exists: match index.location() {
            Some(path) => path.exists(),
            None => !matches!(loaded, IndexLoad::Missing),
        },
        ..Default::default()
    };
    let mut objects = ObjectCounts::default();

    for object_type in ObjectType::ALL {
        let tag = object_type.to_string();
        let stored = store.list_ids(object_type)?.len();
        objects.counts.insert(tag.clone(), stored);
        objects.total += stored;

        let indexed: &[String] = match &loaded {
            IndexLoad::Loaded(idx) => idx.get(object_type).ids(),
            IndexLoad::Missing | IndexLoad::Corrupt(_) => &[],
        };
        let mut missing = 0;
        for id in indexed {
            if !store.exists(object_type, id)? {
                missing += 1;
            }
        }
        index_stats.indexed_counts.insert(tag.clone(), indexed.len());
        index_stats.missing_file_hints.insert(tag, missing);
    }
    Ok((index_stats, objects))
}

/// Simulator section of the stats: the latest report, and with
/// `history > 0` up to that many earlier reports plus a trend.
pub(crate) fn simulator_stats(
    tools_out_dir: Option<&Path>,
    history: usize,
) -> (SimulatorReport, Vec<HistoryEntry>, Option<SimulatorTrend>) {
    let reports = tools_out_dir.map(sim_reports_newest_first).unwrap_or_default();

    let mut latest = SimulatorReport {
        contract_version: SIM_METRICS_CONTRACT_VERSION.to_string(),
        ..Default::default()
    };
    if let Some(path) = reports.first() {
        latest.found = true;
        latest.path = Some(path.clone());
        latest.report = read_report(path);
        latest.metrics = latest.report.as_ref().and_then(SimMetrics::extract);
        latest.evaluation = latest.metrics.as_ref().map(SimMetrics::evaluate);
    }

    if history == 0 {
        return (latest, Vec::new(), None);
    }

    let earlier: Vec<HistoryEntry> = reports
        .iter()
        .skip(1)
        .take(history)
        .map(|path| HistoryEntry {
            path: path.clone(),
            metrics: read_report(path).as_ref().and_then(SimMetrics::extract),
        })
        .collect();

    let previous = earlier.first();
    let trend = match (&latest.metrics, previous.and_then(|p| p.metrics.as_ref())) {
        (Some(now), Some(before)) => Some(now.trend_since(before)),
        _ => None,
    };
    let summary = SimulatorTrend {
        has_baseline: trend.is_some(),
        latest: latest.path.clone(),
        previous: previous.map(|p| p.path.clone()),
        trend,
    };
    (latest, earlier, Some(summary))
}

/// `sim_report_*.json` files in `dir`, newest modification first. Equal
/// times fall back to descending file name.
pub fn sim_reports_newest_first(dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "cannot list simulator reports");
            return Vec::new();
        }
    };

    let mut found: Vec<(SystemTime, PathBuf)> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| is_sim_report(path))
        .map(|path| {
            let modified = std::fs::metadata(&path)
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (modified, path)
        })
        .collect();
    found.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));
    found.into_iter().map(|(_, path)| path).collect()
}

fn is_sim_report(path: &Path) -> bool {
    path.is_file()
        && path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(SIM_REPORT_PREFIX) && n.ends_with(".json"))
}

/// A report that parses as a JSON object.
fn read_report(path: &Path) -> Option<Value> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot read simulator report");
            return None;
        }
    };
    match serde_json::from_str::<Value>(&text) {
        Ok(value) if value.is_object() => Some(value),
        Ok(_) => None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "skipping unparseable simulator report");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{Direction, SimMetric};
    use echo_index::InMemoryIndexBackend;
    use echo_store::InMemoryObjectStore;
    use serde_json::json;
    use std::fs::File;
    use std::time::Duration;

    fn write_report(dir: &Path, name: &str, ttf: f64, age_secs: u64) -> PathBuf {
        let path = dir.join(name);
        let body = json!({ "metrics": {
            "time_to_find_ticks": ttf,
            "useful_hit_rate_top5_pct": 70,
            "false_promotion_rate_pct": 4,
            "missed_promotion_rate_pct": 30,
            "spam_survival_rate_pct": 25,
        }});
        std::fs::write(&path, body.to_string()).unwrap();
        let when = SystemTime::now() - Duration::from_secs(age_secs);
        File::options().write(true).open(&path).unwrap().set_modified(when).unwrap();
        path
    }

    #[test]
    fn counts_and_missing_hints() {
        let store = InMemoryObjectStore::new();
        let index = IndexManager::new(InMemoryIndexBackend::new());
        for id in ["a", "b"] {
            store.write(ObjectType::Eo, &json!({ "eo_id": id })).unwrap();
            index.add(&store, ObjectType::Eo, id).unwrap();
        }
        store.delete(ObjectType::Eo, "b").unwrap();

        let (idx, objects) = object_stats(&store, &index).unwrap();
        assert!(idx.exists);
        assert_eq!(idx.path, None);
        assert_eq!(objects.counts["eo"], 1);
        assert_eq!(objects.counts["rr"], 0);
        assert_eq!(objects.total, 1);
        assert_eq!(idx.indexed_counts["eo"], 2);
        assert_eq!(idx.missing_file_hints["eo"], 1);
    }

    #[test]
    fn no_reports_dir() {
        let (latest, history, trend) = simulator_stats(None, 3);
        assert!(!latest.found);
        assert_eq!(latest.contract_version, "echo.sim.metrics.v1");
        assert!(history.is_empty());
        assert!(!trend.unwrap().has_baseline);
    }

    #[test]
    fn newest_report_wins_and_trend_compares_previous() {
        let dir = tempfile::tempdir().unwrap();
        write_report(dir.path(), "sim_report_old.json", 30.0, 300);
        let mid = write_report(dir.path(), "sim_report_mid.json", 20.0, 200);
        let new = write_report(dir.path(), "sim_report_new.json", 15.0, 100);
        std::fs::write(dir.path().join("other.json"), "{}").unwrap();

        let (latest, history, trend) = simulator_stats(Some(dir.path()), 0);
        assert_eq!(latest.path.as_ref(), Some(&new));
        assert_eq!(latest.metrics.as_ref().unwrap().get(SimMetric::TimeToFindTicks), 15.0);
        assert!(latest.evaluation.unwrap().overall_pass);
        assert!(history.is_empty());
        assert!(trend.is_none());

        let (_, history, trend) = simulator_stats(Some(dir.path()), 5);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].path, mid);
        let trend = trend.unwrap();
        assert!(trend.has_baseline);
        assert_eq!(trend.previous, Some(mid));
        let t = trend.trend.unwrap();
        assert_eq!(t.delta[&SimMetric::TimeToFindTicks], -5.0);
        assert_eq!(t.direction[&SimMetric::TimeToFindTicks], Direction::Improved);
    }

    #[test]
    fn unparseable_latest_report_is_found_without_metrics() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("sim_report_x.json"), "not json").unwrap();
        let (latest, _, _) = simulator_stats(Some(dir.path()), 0);
        assert!(latest.found);
        assert!(latest.report.is_none());
        assert!(latest.metrics.is_none());
    }
}
