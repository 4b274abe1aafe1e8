use std::path::Path;
use std::sync::Arc;

use echo_bundle::{Bundle, BundleEngine, ImportOptions, ImportReport};
use echo_index::{FsIndexBackend, InMemoryIndexBackend, IndexManager};
use echo_rank::{
    RankingEngine, ReceiptEvidenceScorer, ReputationAccumulator, ReputationReport, ScoringStrategy,
};
use echo_schema::{validate_object, FieldError, SchemaRegistry, SignatureVerifier};
use echo_search::{SearchEngine, SearchQuery};
use echo_store::{FsObjectStore, InMemoryObjectStore, ObjectStore};
use echo_types::{Clock, ObjectType, ProtocolObject, ReuseReceipt, SystemClock};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::api::{Health, NodeHit, SearchRequest, SearchResponse, Stored};
use crate::config::NodeConfig;
use crate::error::{NodeError, NodeResult};
use crate::locks::TypeLocks;
use crate::stats::{object_stats, simulator_stats, NodeStats};

const SERVICE_NAME: &str = "echo-reference-node";

/// The ECHO reference node.
///
/// Owns the schema registry, the object store and its derived index, and
/// exposes the operations transport adapters call. Every operation takes the
/// per-type locks it needs: reads share, writes are exclusive, and a bundle
/// import holds every type for its whole validate-then-store transaction.
pub struct Node {
    config: NodeConfig,
    registry: SchemaRegistry,
    store: Box<dyn ObjectStore>,
    index: IndexManager,
    search: SearchEngine,
    ranking: RankingEngine,
    verifier: Option<Arc<dyn SignatureVerifier>>,
    clock: Arc<dyn Clock>,
    locks: TypeLocks,
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("storage_root", &self.config.storage_root)
            .field("registry", &self.registry)
            .field("index", &self.index)
            .field("ranking", &self.ranking)
            .field("verifier", &self.verifier.as_ref().map(|v| v.name().to_string()))
            .finish()
    }
}

impl Node {
    /// Open a node on the filesystem locations named by `config`.
    pub fn open(config: NodeConfig) -> NodeResult<Self> {
        config.validate()?;
        let registry = SchemaRegistry::load(&config.manifest_path, &config.schemas_dir)?;
        let store = FsObjectStore::open(&config.storage_root)?;
        let index = IndexManager::new(FsIndexBackend::at_root(&config.storage_root));
        info!(
            storage_root = %config.storage_root.display(),
            manifest = %config.manifest_path.display(),
            "node opened"
        );
        Self::from_parts(config, registry, Box::new(store), index)
    }

    /// A node that keeps objects and the index in memory.
    pub fn in_memory(config: NodeConfig, registry: SchemaRegistry) -> NodeResult<Self> {
        Self::from_parts(
            config,
            registry,
            Box::new(InMemoryObjectStore::new()),
            IndexManager::new(InMemoryIndexBackend::new()),
        )
    }

    /// Assemble a node from its parts. Fails if `config` does not validate.
    pub fn from_parts(
        config: NodeConfig,
        registry: SchemaRegistry,
        store: Box<dyn ObjectStore>,
        index: IndexManager,
    ) -> NodeResult<Self> {
        config.validate()?;
        let search = SearchEngine::new(config.search.max_limit);
        let ranking = RankingEngine::new(Arc::new(ReceiptEvidenceScorer::new(config.ranking.clone())));
        Ok(Self {
            config,
            registry,
            store,
            index,
            search,
            ranking,
            verifier: None,
            clock: Arc::new(SystemClock),
            locks: TypeLocks::new(),
        })
    }

    /// Replace the clock reputation decay is measured against.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn SignatureVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Replace the scoring strategy used by ranked searches.
    pub fn with_scoring(mut self, strategy: Arc<dyn ScoringStrategy>) -> Self {
        self.ranking = RankingEngine::new(strategy);
        self
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    // ---- Objects ----

    /// Check `object` against its type's schema. Returns every violation;
    /// an empty list means the object is valid.
    pub fn validate(&self, object_type: ObjectType, object: &Value, skip_signature: bool) -> NodeResult<Vec<FieldError>> {
        self.config.signature_policy().enforce("validate", skip_signature)?;
        self.check(object_type, object, skip_signature)
    }

    /// Validate and store one object. Re-storing an id replaces the
    /// previous object.
    pub fn store(&self, object_type: ObjectType, object: &Value, skip_signature: bool) -> NodeResult<Stored> {
        self.config.signature_policy().enforce("store", skip_signature)?;
        // Validation and write happen under one lock so a reload cannot
        // slip in between them.
        let _held = self.locks.write(&[object_type]);
        let errors = self.check(object_type, object, skip_signature)?;
        if !errors.is_empty() {
            debug!(object_type = %object_type, errors = errors.len(), "store rejected");
            return Err(NodeError::Validation { object_type, errors });
        }
        let typed = ProtocolObject::from_value(object_type, object)?;
        let id = typed.id().to_string();

        let replaced = self.store.exists(object_type, &id)?;
        self.store.write(object_type, object)?;
        if replaced {
            debug!(object_type = %object_type, id = %id, "replaced existing object");
        }
        if let Err(e) = self.index.add(self.store.as_ref(), object_type, &id) {
            // The object is on disk; the next read of the type rebuilds the index.
            warn!(object_type = %object_type, id = %id, error = %e, "index update failed after store");
        }
        info!(object_type = %object_type, id = %id, replaced, "object stored");
        Ok(Stored {
            object_type,
            id,
            replaced,
        })
    }

    pub fn get(&self, object_type: ObjectType, id: &str) -> NodeResult<Value> {
        let _held = self.locks.read(&[object_type]);
        self.store
            .read(object_type, id)?
            .ok_or_else(|| NodeError::NotFound {
                object_type,
                id: id.to_string(),
            })
    }

    // ---- Search ----

    /// Field search over one type.
    ///
    /// A ranked search orders experience objects by trust-weighted score
    /// before the limit is applied. `rank` has no effect on other types.
    pub fn search(&self, request: &SearchRequest) -> NodeResult<SearchResponse> {
        let object_type = request.object_type;
        let rank = request.rank && object_type == ObjectType::Eo;
        if request.rank && !rank {
            debug!(object_type = %object_type, "ranking applies to experience objects only");
        }
        let limit = request.limit.unwrap_or(self.config.search.default_limit);
        let query = SearchQuery::new(object_type, request.field.clone(), request.op, request.value.clone())
            .with_limit(limit);

        let scope: &[ObjectType] = if rank {
            &[ObjectType::Eo, ObjectType::Rr]
        } else {
            std::slice::from_ref(&request.object_type)
        };
        let _held = self.locks.read(scope);

        let hits = self.search.find(self.store.as_ref(), &self.index, &query)?;
        let results: Vec<NodeHit> = if rank {
            let receipts = self.load_receipts()?;
            let reputation = self.reputation_over(&receipts);
            self.ranking
                .rank(hits, &receipts, &reputation, request.explain)
                .into_iter()
                .map(NodeHit::from)
                .collect()
        } else {
            hits.into_iter().map(NodeHit::from).collect()
        };

        let page = self.search.paginate(results, limit);
        Ok(SearchResponse {
            count: page.count,
            ranked: rank,
            results: page.hits,
        })
    }

    /// Reliability report of one agent, computed from every stored receipt.
    pub fn reputation(&self, agent_did: &str) -> NodeResult<ReputationReport> {
        let _held = self.locks.read(&[ObjectType::Rr]);
        let receipts = self.load_receipts()?;
        Ok(self.reputation_over(&receipts).report(agent_did.trim()))
    }

    // ---- Bundles ----

    /// Snapshot of the stored objects of one type, or of every type.
    pub fn export(&self, scope: Option<ObjectType>) -> NodeResult<Bundle> {
        let types: Vec<ObjectType> = scope.map_or_else(|| ObjectType::ALL.to_vec(), |t| vec![t]);
        let _held = self.locks.read(&types);
        Ok(self.bundles().export(scope)?)
    }

    /// Export into a bundle file. Returns the number of objects written.
    pub fn export_to(&self, scope: Option<ObjectType>, path: &Path) -> NodeResult<usize> {
        let bundle = self.export(scope)?;
        bundle.write_to(path)?;
        info!(path = %path.display(), count = bundle.len(), "bundle written");
        Ok(bundle.len())
    }

    /// Import a bundle: all of it or none of it.
    pub fn import(&self, bundle: &Bundle, options: ImportOptions) -> NodeResult<ImportReport> {
        self.config.signature_policy().enforce("import", options.skip_signature)?;
        let _held = self.locks.write_all();
        Ok(self.bundles().import(bundle, options)?)
    }

    pub fn import_file(&self, path: &Path, options: ImportOptions) -> NodeResult<ImportReport> {
        self.config.signature_policy().enforce("import", options.skip_signature)?;
        let bundle = Bundle::read_from(path)?;
        self.import(&bundle, options)
    }

    // ---- Operations ----

    /// Stored and indexed counts plus simulator reports. `history` is the
    /// number of earlier reports to include.
    pub fn stats(&self, history: usize) -> NodeResult<NodeStats> {
        let _held = self.locks.read(&ObjectType::ALL);
        let (index, objects) = object_stats(self.store.as_ref(), &self.index)?;
        let (simulator, simulator_history, simulator_trend) =
            simulator_stats(self.config.tools_out_dir.as_deref(), history);
        Ok(NodeStats {
            storage_root: self.config.storage_root.clone(),
            manifest: self.config.manifest_path.clone(),
            schemas_dir: self.config.schemas_dir.clone(),
            index,
            objects,
            simulator,
            simulator_history,
            simulator_trend,
        })
    }

    pub fn health(&self) -> Health {
        Health {
            status: "ok".into(),
            service: SERVICE_NAME.into(),
            manifest: self.config.manifest_path.clone(),
            schemas_dir: self.config.schemas_dir.clone(),
            storage_root: self.config.storage_root.clone(),
            protocol_version: self.registry.manifest().protocol_version(),
        }
    }

    /// Re-read the manifest and drop cached schemas. Waits for in-flight
    /// operations so none of them sees two schema generations.
    pub fn reload(&self) -> NodeResult<()> {
        let _held = self.locks.write_all();
        Ok(self.registry.reload()?)
    }

    /// Delete every stored object and the index. Returns the number of
    /// objects removed.
    pub fn reset_storage(&self) -> NodeResult<usize> {
        let _held = self.locks.write_all();
        let mut removed = 0;
        for object_type in ObjectType::ALL {
            removed += self.store.clear_type(object_type)?;
        }
        self.index.reset()?;
        warn!(removed, "storage reset");
        Ok(removed)
    }

    fn check(&self, object_type: ObjectType, object: &Value, skip_signature: bool) -> NodeResult<Vec<FieldError>> {
        Ok(validate_object(
            &self.registry,
            object_type,
            object,
            skip_signature,
            self.verifier.as_deref(),
        )?)
    }

    fn bundles(&self) -> BundleEngine<'_> {
        BundleEngine::new(&self.registry, self.store.as_ref(), &self.index).with_verifier(self.verifier.as_deref())
    }

    /// Every stored receipt that decodes. Callers hold the receipt lock.
    fn load_receipts(&self) -> NodeResult<Vec<ReuseReceipt>> {
        let ids = self.index.ids(self.store.as_ref(), ObjectType::Rr)?;
        let objects = self.store.read_batch(ObjectType::Rr, &ids)?;
        let mut receipts = Vec::with_capacity(objects.len());
        for (id, object) in ids.iter().zip(objects) {
            let Some(object) = object else { continue };
            match ProtocolObject::from_value(ObjectType::Rr, &object) {
                Ok(ProtocolObject::Receipt(rr)) => receipts.push(rr),
                Ok(_) => {}
                Err(e) => warn!(id = %id, error = %e, "skipping undecodable receipt"),
            }
        }
        Ok(receipts)
    }

    fn reputation_over(&self, receipts: &[ReuseReceipt]) -> ReputationAccumulator {
        ReputationAccumulator::from_receipts(receipts, self.clock.now(), self.config.reputation.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use echo_index::INDEX_FILE;
    use echo_schema::SignatureCheck;
    use echo_search::SearchOp;
    use echo_types::FixedClock;
    use serde_json::json;
    use std::sync::{Mutex, OnceLock, Weak};
    use std::thread;
    use std::time::Duration;

    const NOW: &str = "2026-01-20T12:00:00Z";

    fn config_in(dir: &Path) -> NodeConfig {
        NodeConfig {
            storage_root: dir.join("storage"),
            manifest_path: fixtures::manifest_path(),
            schemas_dir: fixtures::schemas_dir(),
            tools_out_dir: Some(dir.join("tools_out")),
            ..NodeConfig::default()
        }
    }

    fn open(dir: &Path) -> Node {
        let clock = FixedClock::parse(NOW).unwrap();
        Node::open(config_in(dir)).unwrap().with_clock(Arc::new(clock))
    }

    fn memory_node() -> Node {
        let clock = FixedClock::parse(NOW).unwrap();
        Node::in_memory(NodeConfig::default(), fixtures::registry().unwrap())
            .unwrap()
            .with_clock(Arc::new(clock))
    }

    fn eo(id: &str, confidence: f64) -> Value {
        let mut eo = fixtures::sample_eo();
        eo["eo_id"] = json!(id);
        eo["confidence_score"] = json!(confidence);
        eo
    }

    fn rr(id: &str, issuer: &str, target: &str, verdict: &str) -> Value {
        json!({
            "rr_id": id,
            "issuer_agent_did": issuer,
            "target_eo_id": target,
            "verdict": verdict,
            "created_at": NOW,
            "signature": "sig"
        })
    }

    fn ids(node: &Node, request: SearchRequest) -> Vec<String> {
        node.search(&request).unwrap().results.into_iter().map(|h| h.id).collect()
    }

    #[test]
    fn store_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let node = open(dir.path());
        let stored = node.store(ObjectType::Eo, &fixtures::sample_eo(), false).unwrap();
        assert_eq!(stored.id, "echo.eo.sample.v1");
        assert!(!stored.replaced);
        assert_eq!(node.get(ObjectType::Eo, "echo.eo.sample.v1").unwrap(), fixtures::sample_eo());
        assert!(dir.path().join("storage/eo/echo.eo.sample.v1.json").is_file());
        assert!(dir.path().join("storage").join(INDEX_FILE).is_file());
    }

    #[test]
    fn get_missing_names_type_and_id() {
        let node = memory_node();
        let err = node.get(ObjectType::Rr, "nope").unwrap_err();
        assert!(matches!(err, NodeError::NotFound { .. }));
        assert_eq!(err.to_string(), "object not found: rr:nope");
    }

    #[test]
    fn store_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let node = open(dir.path());
        node.store(ObjectType::Eo, &fixtures::sample_eo(), false).unwrap();
        let again = node.store(ObjectType::Eo, &fixtures::sample_eo(), false).unwrap();
        assert!(again.replaced);

        let all = ids(&node, SearchRequest::new(ObjectType::Eo, "eo_id", SearchOp::Prefix, ""));
        assert_eq!(all, vec!["echo.eo.sample.v1"]);
        let stats = node.stats(0).unwrap();
        assert_eq!(stats.index.indexed_counts["eo"], 1);
        assert_eq!(stats.objects.counts["eo"], 1);
    }

    #[test]
    fn last_write_wins() {
        let node = memory_node();
        node.store(ObjectType::Eo, &eo("echo.eo.x", 0.2), false).unwrap();
        node.store(ObjectType::Eo, &eo("echo.eo.x", 0.7), false).unwrap();
        assert_eq!(node.get(ObjectType::Eo, "echo.eo.x").unwrap()["confidence_score"], json!(0.7));
    }

    #[test]
    fn invalid_object_is_reported_and_not_stored() {
        let node = memory_node();
        let bad = eo("echo.eo.bad", 1.5);
        let errors = node.validate(ObjectType::Eo, &bad, false).unwrap();
        assert!(errors.iter().any(|e| e.path == "confidence_score"), "{errors:?}");

        let err = node.store(ObjectType::Eo, &bad, false).unwrap_err();
        assert!(!err.field_errors().is_empty());
        assert!(matches!(node.get(ObjectType::Eo, "echo.eo.bad"), Err(NodeError::NotFound { .. })));
        assert_eq!(node.stats(0).unwrap().objects.total, 0);
    }

    #[test]
    fn invalid_config_is_refused_at_construction() {
        let mut config = NodeConfig::default();
        config.reputation.half_life_days = 0.0;
        let err = Node::in_memory(config, fixtures::registry().unwrap()).unwrap_err();
        assert!(matches!(err, NodeError::Rank(_)), "{err}");
    }

    #[test]
    fn unsigned_object_needs_skip() {
        let node = memory_node();
        let mut unsigned = fixtures::sample_eo();
        unsigned.as_object_mut().unwrap().remove("signature");

        let errors = node.validate(ObjectType::Eo, &unsigned, false).unwrap();
        assert!(errors.iter().any(|e| e.to_string() == "signature: must be a non-empty string"));
        assert!(node.validate(ObjectType::Eo, &unsigned, true).unwrap().is_empty());
        node.store(ObjectType::Eo, &unsigned, true).unwrap();
        assert!(node.get(ObjectType::Eo, "echo.eo.sample.v1").unwrap().get("signature").is_none());
    }

    #[test]
    fn strict_policy_rejects_skip_before_any_effect() {
        let dir = tempfile::tempdir().unwrap();
        let config = NodeConfig {
            require_signature: true,
            ..config_in(dir.path())
        };
        let node = Node::open(config).unwrap();
        let eo = fixtures::sample_eo();

        assert!(matches!(node.validate(ObjectType::Eo, &eo, true), Err(NodeError::SignaturePolicyViolation(_))));
        assert!(matches!(node.store(ObjectType::Eo, &eo, true), Err(NodeError::SignaturePolicyViolation(_))));
        let bundle = Bundle::new(&node.registry().manifest(), vec![eo.clone()]);
        let options = ImportOptions {
            skip_signature: true,
            ..ImportOptions::default()
        };
        assert!(matches!(node.import(&bundle, options), Err(NodeError::SignaturePolicyViolation(_))));
        assert_eq!(node.stats(0).unwrap().objects.total, 0);
        assert!(!dir.path().join("storage").join(INDEX_FILE).exists());

        node.store(ObjectType::Eo, &eo, false).unwrap();
    }

    struct RejectAll;

    impl SignatureVerifier for RejectAll {
        fn name(&self) -> &str {
            "reject-all"
        }

        fn verify(&self, _: ObjectType, _: &Value) -> SignatureCheck {
            SignatureCheck::Rejected {
                reason: "unknown key".into(),
            }
        }
    }

    #[test]
    fn installed_verifier_rejects_signature() {
        let node = memory_node().with_verifier(Arc::new(RejectAll));
        let err = node.store(ObjectType::Eo, &fixtures::sample_eo(), false).unwrap_err();
        assert!(err.field_errors().iter().any(|e| e.path == "signature"));
        node.store(ObjectType::Eo, &fixtures::sample_eo(), true).unwrap();
    }

    /// Starts a schema reload from inside the first signature check and
    /// records the generation the store is still validating under.
    #[derive(Default)]
    struct ReloadDuringCheck {
        node: OnceLock<Weak<Node>>,
        reloader: Mutex<Option<thread::JoinHandle<()>>>,
        generation: Mutex<Option<u64>>,
    }

    impl SignatureVerifier for ReloadDuringCheck {
        fn name(&self) -> &str {
            "reload-during-check"
        }

        fn verify(&self, _: ObjectType, _: &Value) -> SignatureCheck {
            let Some(node) = self.node.get().and_then(Weak::upgrade) else {
                return SignatureCheck::Accepted;
            };
            let mut reloader = self.reloader.lock().unwrap();
            if reloader.is_none() {
                let background = Arc::clone(&node);
                *reloader = Some(thread::spawn(move || background.reload().unwrap()));
                thread::sleep(Duration::from_millis(100));
                *self.generation.lock().unwrap() = Some(node.registry().generation());
            }
            SignatureCheck::Accepted
        }
    }

    #[test]
    fn reload_waits_for_an_in_flight_store() {
        let dir = tempfile::tempdir().unwrap();
        let hook = Arc::new(ReloadDuringCheck::default());
        let node = Arc::new(open(dir.path()).with_verifier(hook.clone()));
        hook.node.set(Arc::downgrade(&node)).unwrap();

        node.store(ObjectType::Eo, &fixtures::sample_eo(), false).unwrap();
        let reloader = hook.reloader.lock().unwrap().take().unwrap();
        reloader.join().unwrap();

        assert_eq!(*hook.generation.lock().unwrap(), Some(0));
        assert_eq!(node.registry().generation(), 1);
    }

    #[test]
    fn field_search_semantics() {
        let dir = tempfile::tempdir().unwrap();
        let node = open(dir.path());
        node.store(ObjectType::Eo, &fixtures::sample_eo(), false).unwrap();

        let count = |op, value: &str| {
            node.search(&SearchRequest::new(ObjectType::Eo, "eo_id", op, value))
                .unwrap()
                .count
        };
        assert_eq!(count(SearchOp::Equals, "echo.eo.sample.v1"), 1);
        assert!(count(SearchOp::Contains, "echo.eo") >= 1);
        assert!(count(SearchOp::Prefix, "echo.eo") >= 1);
        assert_eq!(count(SearchOp::Equals, "echo.eo"), 0);
        assert_eq!(count(SearchOp::Prefix, "ECHO"), 0);

        let by_share = node
            .search(&SearchRequest::new(ObjectType::Eo, "share_level", SearchOp::Equals, "GLOBAL_ABSTRACT"))
            .unwrap();
        assert_eq!(by_share.count, 1);
        assert!(!by_share.ranked);
        assert!(by_share.results[0].score.is_none());
    }

    #[test]
    fn blank_field_is_an_invalid_query() {
        let node = memory_node();
        let err = node
            .search(&SearchRequest::new(ObjectType::Eo, " ", SearchOp::Equals, "x"))
            .unwrap_err();
        assert!(matches!(err, NodeError::InvalidQuery(_)));
    }

    #[test]
    fn limit_applies_after_counting() {
        let node = memory_node();
        for i in 0..5 {
            node.store(ObjectType::Eo, &eo(&format!("echo.eo.{i}"), 0.5), false).unwrap();
        }
        let res = node
            .search(&SearchRequest::new(ObjectType::Eo, "eo_id", SearchOp::Prefix, "echo.eo").with_limit(2))
            .unwrap();
        assert_eq!(res.count, 5);
        assert_eq!(res.ids(), vec!["echo.eo.0", "echo.eo.1"]);
    }

    #[test]
    fn ranked_search_explains_receipt_evidence() {
        let dir = tempfile::tempdir().unwrap();
        let node = open(dir.path());
        node.store(ObjectType::Eo, &fixtures::sample_eo(), false).unwrap();
        node.store(ObjectType::Rr, &fixtures::sample_rr(), false).unwrap();

        let res = node
            .search(&SearchRequest::new(ObjectType::Eo, "eo_id", SearchOp::Contains, "echo.eo").explained())
            .unwrap();
        assert!(res.ranked);
        assert_eq!(res.results.len(), 1);
        let hit = &res.results[0];
        assert_eq!(hit.id, "echo.eo.sample.v1");
        let explain = hit.explain.as_ref().unwrap();
        assert!(explain.receipt_evidence > 0.0);
        assert_eq!(explain.confidence, 0.9);
        assert_eq!(explain.outcome_bonus, 2.0);
        assert_eq!(hit.score, Some(explain.total));
    }

    #[test]
    fn ranking_is_deterministic() {
        let node = memory_node();
        for (id, c) in [("echo.eo.a", 0.5), ("echo.eo.b", 0.5), ("echo.eo.c", 0.8)] {
            node.store(ObjectType::Eo, &eo(id, c), false).unwrap();
        }
        node.store(ObjectType::Rr, &rr("rr.1", "did:echo:x", "echo.eo.b", "SUCCESS"), false).unwrap();
        node.store(ObjectType::Rr, &rr("rr.2", "did:echo:y", "echo.eo.a", "FAIL"), false).unwrap();

        let request = SearchRequest::new(ObjectType::Eo, "eo_id", SearchOp::Prefix, "echo.eo").explained();
        let first = node.search(&request).unwrap();
        for _ in 0..3 {
            assert_eq!(node.search(&request).unwrap(), first);
        }
        assert_eq!(first.ids(), vec!["echo.eo.c", "echo.eo.b", "echo.eo.a"]);
    }

    #[test]
    fn receipt_from_reliable_issuer_ranks_higher() {
        let node = memory_node();
        node.store(ObjectType::Eo, &eo("echo.eo.a", 0.6), false).unwrap();
        node.store(ObjectType::Eo, &eo("echo.eo.z", 0.6), false).unwrap();
        for i in 0..3 {
            let target = format!("echo.eo.other.{i}");
            node.store(ObjectType::Rr, &rr(&format!("rr.h{i}"), "did:echo:steady", &target, "SUCCESS"), false)
                .unwrap();
        }
        node.store(ObjectType::Rr, &rr("rr.z", "did:echo:steady", "echo.eo.z", "SUCCESS"), false).unwrap();

        let res = node
            .search(&SearchRequest::new(ObjectType::Eo, "eo_id", SearchOp::Prefix, "echo.eo").ranked())
            .unwrap();
        assert_eq!(res.ids(), vec!["echo.eo.z", "echo.eo.a"]);
        assert!(res.results[0].score > res.results[1].score);
        assert!(res.results[0].explain.is_none());
    }

    #[test]
    fn rank_is_ignored_for_other_types() {
        let node = memory_node();
        node.store(ObjectType::Rr, &fixtures::sample_rr(), false).unwrap();
        let res = node
            .search(&SearchRequest::new(ObjectType::Rr, "rr_id", SearchOp::Equals, "echo.rr.1").ranked())
            .unwrap();
        assert!(!res.ranked);
        assert_eq!(res.count, 1);
    }

    #[test]
    fn search_heals_deleted_or_corrupt_index() {
        let dir = tempfile::tempdir().unwrap();
        let node = open(dir.path());
        for id in ["echo.eo.1", "echo.eo.2"] {
            node.store(ObjectType::Eo, &eo(id, 0.5), false).unwrap();
        }
        let index_path = dir.path().join("storage").join(INDEX_FILE);
        let request = SearchRequest::new(ObjectType::Eo, "eo_id", SearchOp::Prefix, "echo.eo");

        std::fs::remove_file(&index_path).unwrap();
        assert_eq!(ids(&node, request.clone()), vec!["echo.eo.1", "echo.eo.2"]);
        assert!(index_path.is_file());

        std::fs::write(&index_path, "{ not json").unwrap();
        assert_eq!(ids(&node, request.clone()), vec!["echo.eo.1", "echo.eo.2"]);

        std::fs::remove_file(dir.path().join("storage/eo/echo.eo.1.json")).unwrap();
        assert_eq!(ids(&node, request), vec!["echo.eo.2"]);
    }

    #[test]
    fn export_import_round_trip() {
        let src = tempfile::tempdir().unwrap();
        let node = open(src.path());
        node.store(ObjectType::Eo, &fixtures::sample_eo(), false).unwrap();
        node.store(ObjectType::Eo, &eo("echo.eo.2", 0.4), false).unwrap();
        node.store(ObjectType::Rr, &fixtures::sample_rr(), false).unwrap();

        let file = src.path().join("bundle.json");
        assert_eq!(node.export_to(Some(ObjectType::Eo), &file).unwrap(), 2);

        let dst = tempfile::tempdir().unwrap();
        let other = open(dst.path());
        let report = other.import_file(&file, ImportOptions::default()).unwrap();
        assert_eq!(report.imported, 2);

        let all = SearchRequest::new(ObjectType::Eo, "eo_id", SearchOp::Prefix, "");
        assert_eq!(ids(&other, all.clone()), ids(&node, all));
        assert_eq!(other.stats(0).unwrap().objects.counts["rr"], 0);
    }

    #[test]
    fn loosely_typed_objects_store_import_and_rank() {
        let mut eo = fixtures::sample_eo();
        eo["outcome_metrics"]["iteration_count"] = json!(3.0);
        let mut rr = fixtures::sample_rr();
        rr["issuer_agent_did"] = json!("did:echo:agent.2");
        rr["outcome_metrics"] = json!({ "effectiveness_score": "high" });

        let src = memory_node();
        src.store(ObjectType::Eo, &eo, false).unwrap();
        src.store(ObjectType::Rr, &rr, false).unwrap();

        let dst = memory_node();
        let report = dst.import(&src.export(None).unwrap(), ImportOptions::default()).unwrap();
        assert_eq!(report.imported, 2);

        let request = SearchRequest::new(ObjectType::Eo, "eo_id", SearchOp::Prefix, "echo.eo").explained();
        for node in [&src, &dst] {
            let res = node.search(&request).unwrap();
            let explain = res.results[0].explain.as_ref().unwrap();
            assert_eq!(explain.outcome_bonus, 2.0);
            assert!(explain.receipt_evidence > 0.0);
        }
    }

    #[test]
    fn bundle_with_one_invalid_object_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let node = open(dir.path());
        let bundle = Bundle::new(
            &node.registry().manifest(),
            vec![eo("echo.eo.1", 0.5), eo("echo.eo.2", 0.5), eo("echo.eo.3", 7.0)],
        );
        let err = node.import(&bundle, ImportOptions::default()).unwrap_err();
        let NodeError::Bundle(inner) = &err else {
            panic!("unexpected error: {err}");
        };
        assert!(inner.item_errors().iter().any(|e| e.starts_with("objects[2] (eo:echo.eo.3)")));

        let stats = node.stats(0).unwrap();
        assert_eq!(stats.objects.total, 0);
        assert!(!stats.index.exists);
    }

    #[test]
    fn reputation_report_for_issuer() {
        let node = memory_node();
        node.store(ObjectType::Rr, &fixtures::sample_rr(), false).unwrap();

        let report = node.reputation("did:echo:agent.1").unwrap();
        assert_eq!(report.receipts_total, 1);
        assert_eq!(report.success_receipts, 1);
        assert!(report.score > 0.0);
        assert_eq!(report.top_targets[0].target_eo_id, "echo.eo.sample.v1");

        let unknown = node.reputation("did:echo:nobody").unwrap();
        assert_eq!(unknown.score, 0.0);
        assert!(unknown.top_targets.is_empty());
    }

    #[test]
    fn stats_report_missing_files_and_simulator() {
        let dir = tempfile::tempdir().unwrap();
        let node = open(dir.path());
        node.store(ObjectType::Eo, &fixtures::sample_eo(), false).unwrap();
        std::fs::remove_file(dir.path().join("storage/eo/echo.eo.sample.v1.json")).unwrap();

        let out = dir.path().join("tools_out");
        std::fs::create_dir_all(&out).unwrap();
        std::fs::write(
            out.join("sim_report_1.json"),
            json!({ "metrics": {
                "time_to_find_ticks": 12,
                "useful_hit_rate_top5_pct": 0.75,
                "false_promotion_rate_pct": 2,
                "missed_promotion_rate_pct": 10,
                "spam_survival_rate_pct": 5
            }})
            .to_string(),
        )
        .unwrap();

        let stats = node.stats(0).unwrap();
        assert!(stats.index.exists);
        assert_eq!(stats.index.indexed_counts["eo"], 1);
        assert_eq!(stats.index.missing_file_hints["eo"], 1);
        assert_eq!(stats.objects.counts["eo"], 0);
        assert!(stats.simulator.found);
        assert!(stats.simulator.evaluation.as_ref().unwrap().overall_pass);
        assert!(stats.simulator_trend.is_none());
    }

    #[test]
    fn health_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let node = open(dir.path());
        let health = node.health();
        assert_eq!(health.status, "ok");
        assert_eq!(health.protocol_version, json!("echo.v1"));
        assert_eq!(health.storage_root, dir.path().join("storage"));

        let before = node.registry().generation();
        node.reload().unwrap();
        assert!(node.registry().generation() > before);
        node.store(ObjectType::Eo, &fixtures::sample_eo(), false).unwrap();
    }

    #[test]
    fn reset_storage_removes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let node = open(dir.path());
        node.store(ObjectType::Eo, &fixtures::sample_eo(), false).unwrap();
        node.store(ObjectType::Rr, &fixtures::sample_rr(), false).unwrap();

        assert_eq!(node.reset_storage().unwrap(), 2);
        let stats = node.stats(0).unwrap();
        assert_eq!(stats.objects.total, 0);
        assert!(!stats.index.exists);
        assert!(matches!(node.get(ObjectType::Eo, "echo.eo.sample.v1"), Err(NodeError::NotFound { .. })));
    }

    #[test]
    fn concurrent_stores_and_searches() {
        let node = Arc::new(memory_node());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let node = Arc::clone(&node);
                let seen = Arc::clone(&seen);
                std::thread::spawn(move || {
                    for i in 0..5 {
                        node.store(ObjectType::Eo, &eo(&format!("echo.eo.{t}.{i}"), 0.5), false).unwrap();
                        let res = node
                            .search(&SearchRequest::new(ObjectType::Eo, "eo_id", SearchOp::Prefix, "echo.eo").ranked())
                            .unwrap();
                        seen.lock().unwrap().push(res.count);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(node.stats(0).unwrap().index.indexed_counts["eo"], 20);
        assert!(seen.lock().unwrap().iter().all(|&c| c >= 1));
    }
}
