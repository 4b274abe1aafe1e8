use echo_index::IndexManager;
use echo_store::ObjectStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{SearchError, SearchResult};
use crate::query::{effective_limit, SearchQuery, MAX_LIMIT};

/// One matching object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub object: Value,
}

/// Matches of a query: the total and the returned slice.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchMatches {
    /// Number of matching objects before the limit was applied.
    pub count: usize,
    pub hits: Vec<SearchHit>,
}

/// String form a field is compared in.
pub fn field_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Executes field queries against a store through its index.
#[derive(Clone, Copy, Debug)]
pub struct SearchEngine {
    max_limit: usize,
}

impl Default for SearchEngine {
    fn default() -> Self {
        Self::new(MAX_LIMIT)
    }
}

impl SearchEngine {
    /// Engine with a hard cap on returned results.
    pub fn new(max_limit: usize) -> Self {
        Self {
            max_limit: max_limit.max(1),
        }
    }

    pub fn max_limit(&self) -> usize {
        self.max_limit
    }

    /// Every matching object, in index order, without applying the limit.
    pub fn find(
        &self,
        store: &dyn ObjectStore,
        index: &IndexManager,
        query: &SearchQuery,
    ) -> SearchResult<Vec<SearchHit>> {
        if query.field.trim().is_empty() {
            return Err(SearchError::EmptyField);
        }
        let object_type = query.object_type;
        let mut ids = index.ids(store, object_type)?;

        // Id queries are decided on the index alone; only matching ids are read.
        if query.is_id_query() {
            ids.retain(|id| query.op.matches(id, &query.value));
        }

        let mut hits = Vec::new();
        for id in ids {
            let Some(object) = store.read(object_type, &id)? else {
                continue;
            };
            let Some(field) = object.get(&query.field) else {
                continue;
            };
            if query.op.matches(&field_text(field), &query.value) {
                hits.push(SearchHit { id, object });
            }
        }
        debug!(
            object_type = %object_type,
            field = %query.field,
            op = %query.op,
            count = hits.len(),
            "search"
        );
        Ok(hits)
    }

    /// Matching objects truncated to the query's limit.
    pub fn search(
        &self,
        store: &dyn ObjectStore,
        index: &IndexManager,
        query: &SearchQuery,
    ) -> SearchResult<SearchMatches> {
        let hits = self.find(store, index, query)?;
        Ok(self.paginate(hits, query.limit).into())
    }

    /// Apply a requested limit to an ordered list of hits.
    pub fn paginate<T>(&self, mut hits: Vec<T>, limit: usize) -> Page<T> {
        let count = hits.len();
        hits.truncate(effective_limit(limit, self.max_limit));
        Page { count, hits }
    }
}

/// An ordered, limited list of items and the pre-limit total.
#[derive(Clone, Debug, PartialEq)]
pub struct Page<T> {
    pub count: usize,
    pub hits: Vec<T>,
}

impl From<Page<SearchHit>> for SearchMatches {
    fn from(page: Page<SearchHit>) -> Self {
        Self {
            count: page.count,
            hits: page.hits,
        }
    }
}
