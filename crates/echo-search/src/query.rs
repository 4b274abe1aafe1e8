use std::fmt;
use std::str::FromStr;

use echo_types::ObjectType;
use serde::{Deserialize, Serialize};

use crate::error::SearchError;

/// Hard cap on returned results.
pub const MAX_LIMIT: usize = 1000;

/// Limit used when a caller gives none.
pub const DEFAULT_LIMIT: usize = 50;

/// Clamp a requested limit to `[1, cap]`; zero means "up to the cap".
pub fn effective_limit(requested: usize, cap: usize) -> usize {
    if requested == 0 {
        cap
    } else {
        requested.min(cap)
    }
}

/// Comparison operator of a field query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchOp {
    Equals,
    Contains,
    Prefix,
}

impl SearchOp {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::Contains => "contains",
            Self::Prefix => "prefix",
        }
    }

    /// Case-sensitive comparison of `text` against `needle`.
    pub fn matches(&self, text: &str, needle: &str) -> bool {
        match self {
            Self::Equals => text == needle,
            Self::Contains => text.contains(needle),
            Self::Prefix => text.starts_with(needle),
        }
    }
}

impl fmt::Display for SearchOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchOp {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "equals" => Ok(Self::Equals),
            "contains" => Ok(Self::Contains),
            "prefix" => Ok(Self::Prefix),
            other => Err(SearchError::UnsupportedOp(other.to_string())),
        }
    }
}

/// A field query over one object type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub object_type: ObjectType,
    pub field: String,
    pub op: SearchOp,
    pub value: String,
    /// Requested result count; `0` means everything up to [`MAX_LIMIT`].
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

impl SearchQuery {
    pub fn new(
        object_type: ObjectType,
        field: impl Into<String>,
        op: SearchOp,
        value: impl Into<String>,
    ) -> Self {
        Self {
            object_type,
            field: field.into(),
            op,
            value: value.into(),
            limit: DEFAULT_LIMIT,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Whether the query targets the type's id field.
    pub fn is_id_query(&self) -> bool {
        self.field == self.object_type.id_field()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ops_parse_and_match() {
        assert_eq!("equals".parse::<SearchOp>().unwrap(), SearchOp::Equals);
        let err = "regex".parse::<SearchOp>().unwrap_err();
        assert!(err.to_string().contains("regex"));

        assert!(SearchOp::Equals.matches("echo.eo.1", "echo.eo.1"));
        assert!(!SearchOp::Equals.matches("echo.eo.1", "ECHO.eo.1"));
        assert!(SearchOp::Contains.matches("echo.eo.1", "eo."));
        assert!(SearchOp::Prefix.matches("echo.eo.1", "echo"));
        assert!(!SearchOp::Prefix.matches("echo.eo.1", "eo"));
    }

    #[test]
    fn limit_clamping() {
        assert_eq!(effective_limit(0, MAX_LIMIT), 1000);
        assert_eq!(effective_limit(5, MAX_LIMIT), 5);
        assert_eq!(effective_limit(5000, MAX_LIMIT), 1000);
    }

    #[test]
    fn id_query_detection() {
        let q = SearchQuery::new(ObjectType::Rr, "rr_id", SearchOp::Prefix, "echo");
        assert!(q.is_id_query());
        assert_eq!(q.limit, DEFAULT_LIMIT);
        let q = SearchQuery::new(ObjectType::Rr, "target_eo_id", SearchOp::Prefix, "echo");
        assert!(!q.is_id_query());
    }
}
