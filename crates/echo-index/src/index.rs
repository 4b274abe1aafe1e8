//! The in-memory index and its normalisation rules.

use std::collections::{BTreeMap, HashSet};

use echo_types::ObjectType;
use serde_json::{Map, Value};

/// Deduplicated, insertion-ordered ids of one type.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TypeIndex {
    ids: Vec<String>,
    seen: HashSet<String>,
}

impl TypeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from raw ids: trimmed, blanks dropped, first occurrence kept.
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut index = Self::new();
        for id in ids {
            index.add(id.as_ref());
        }
        index
    }

    /// Append an id unless already present. Returns `true` if it was added.
    pub fn add(&mut self, id: &str) -> bool {
        let id = id.trim();
        if id.is_empty() || self.seen.contains(id) {
            return false;
        }
        self.seen.insert(id.to_string());
        self.ids.push(id.to_string());
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    /// Ids in insertion order.
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Whether both name the same set of ids, regardless of order.
    pub fn same_ids(&self, ids: &[String]) -> bool {
        ids.len() == self.seen.len() && ids.iter().all(|id| self.seen.contains(id))
    }
}

/// The whole index: one [`TypeIndex`] per object type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Index {
    types: BTreeMap<ObjectType, TypeIndex>,
}

impl Default for Index {
    fn default() -> Self {
        Self::new()
    }
}

impl Index {
    /// An index with an empty list for every type.
    pub fn new() -> Self {
        Self {
            types: ObjectType::ALL
                .iter()
                .map(|t| (*t, TypeIndex::new()))
                .collect(),
        }
    }

    pub fn get(&self, object_type: ObjectType) -> &TypeIndex {
        // Every type is present from construction on.
        &self.types[&object_type]
    }

    /// Add an id to a type. Returns `true` if it was not yet indexed.
    pub fn add(&mut self, object_type: ObjectType, id: &str) -> bool {
        self.types.entry(object_type).or_default().add(id)
    }

    /// Replace a type's ids wholesale.
    pub fn replace(&mut self, object_type: ObjectType, ids: TypeIndex) {
        self.types.insert(object_type, ids);
    }

    /// Total ids across all types.
    pub fn total(&self) -> usize {
        self.types.values().map(TypeIndex::len).sum()
    }

    /// Normalise an arbitrary JSON document into an index.
    ///
    /// A non-object becomes an empty index; unknown keys and non-list values
    /// are ignored; non-string and blank ids are dropped; ids are trimmed and
    /// deduplicated keeping the first occurrence.
    pub fn normalize(raw: &Value) -> Self {
        let mut index = Self::new();
        let Some(map) = raw.as_object() else {
            return index;
        };
        for object_type in ObjectType::ALL {
            if let Some(Value::Array(values)) = map.get(object_type.as_str()) {
                let ids = values.iter().filter_map(Value::as_str);
                index.replace(object_type, TypeIndex::from_ids(ids));
            }
        }
        index
    }

    /// The index document: `{ "<type>": [ids...] }` for every type.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        for (object_type, ids) in &self.types {
            map.insert(
                object_type.as_str().to_string(),
                Value::Array(ids.ids().iter().cloned().map(Value::String).collect()),
            );
        }
        Value::Object(map)
    }
}
