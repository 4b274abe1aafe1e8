use std::path::{Path, PathBuf};

use echo_rank::{RankingWeights, ReputationConfig};
use echo_schema::SignaturePolicy;
use echo_search::{DEFAULT_LIMIT, MAX_LIMIT};
use serde::{Deserialize, Serialize};

use crate::error::{NodeError, NodeResult};

/// Node configuration, usually read from a TOML file.
///
/// ```toml
/// storage_root = "storage"
/// manifest_path = "manifest.json"
/// schemas_dir = "schemas"
/// require_signature = true
///
/// [search]
/// default_limit = 50
///
/// [reputation]
/// half_life_days = 14
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub storage_root: PathBuf,
    pub manifest_path: PathBuf,
    pub schemas_dir: PathBuf,
    /// Where simulator reports (`sim_report_*.json`) are read from.
    pub tools_out_dir: Option<PathBuf>,
    /// Reject requests that ask to skip signature checks.
    pub require_signature: bool,
    pub search: SearchConfig,
    pub ranking: RankingWeights,
    pub reputation: ReputationConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from("storage"),
            manifest_path: PathBuf::from("manifest.json"),
            schemas_dir: PathBuf::from("schemas"),
            tools_out_dir: None,
            require_signature: false,
            search: SearchConfig::default(),
            ranking: RankingWeights::default(),
            reputation: ReputationConfig::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Limit applied when a request names none.
    pub default_limit: usize,
    /// Hard cap on returned results.
    pub max_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT,
            max_limit: MAX_LIMIT,
        }
    }
}

impl NodeConfig {
    /// Read a TOML file. Relative paths inside it are resolved against the
    /// file's directory.
    pub fn load(path: &Path) -> NodeResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| NodeError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let mut config = Self::from_toml(&text).map_err(|e| match e {
            NodeError::Config { reason, .. } => NodeError::Config {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })?;
        if let Some(base) = path.parent() {
            config.rebase(base);
        }
        Ok(config)
    }

    /// Parse and check a TOML document.
    pub fn from_toml(text: &str) -> NodeResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| NodeError::Config {
            path: PathBuf::new(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Config rooted at one directory: `storage/`, `manifest.json` and
    /// `schemas/` underneath it.
    pub fn rooted_at(root: &Path) -> Self {
        let mut config = Self::default();
        config.rebase(root);
        config
    }

    pub fn validate(&self) -> NodeResult<()> {
        if self.search.max_limit == 0 || self.search.max_limit > MAX_LIMIT {
            return Err(NodeError::Config {
                path: PathBuf::new(),
                reason: format!("search.max_limit must be between 1 and {MAX_LIMIT}"),
            });
        }
        self.ranking.validate()?;
        self.reputation.validate()?;
        Ok(())
    }

    pub fn signature_policy(&self) -> SignaturePolicy {
        SignaturePolicy {
            require_signature: self.require_signature,
        }
    }

    fn rebase(&mut self, base: &Path) {
        for path in [&mut self.storage_root, &mut self.manifest_path, &mut self.schemas_dir] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
        if let Some(dir) = self.tools_out_dir.as_mut() {
            if dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = NodeConfig::default();
        assert_eq!(c.search.default_limit, 50);
        assert_eq!(c.search.max_limit, 1000);
        assert!(!c.require_signature);
        assert!(c.tools_out_dir.is_none());
        assert!(c.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c = NodeConfig::from_toml(
            r#"
            require_signature = true

            [search]
            default_limit = 10

            [reputation]
            half_life_days = 14.0
            "#,
        )
        .unwrap();
        assert!(c.signature_policy().require_signature);
        assert_eq!(c.search.default_limit, 10);
        assert_eq!(c.search.max_limit, 1000);
        assert_eq!(c.reputation.half_life_days, 14.0);
        assert_eq!(c.reputation.evidence_prior, 2.0);
        assert_eq!(c.ranking.confidence, 10.0);
    }

    #[test]
    fn bad_values_are_rejected() {
        let err = NodeConfig::from_toml("[reputation]\ncontradiction_penalty = 2.0").unwrap_err();
        assert!(matches!(err, NodeError::Rank(_)));
        let err = NodeConfig::from_toml("[search]\nmax_limit = 0").unwrap_err();
        assert!(matches!(err, NodeError::Config { .. }));
        let err = NodeConfig::from_toml("[search]\nmax_limit = 1001").unwrap_err();
        assert!(err.to_string().contains("between 1 and 1000"));
        assert!(NodeConfig::from_toml("[search]\nmax_limit = 1000").is_ok());
        let err = NodeConfig::from_toml("[reputation]\nhalf_life_days = 0.0").unwrap_err();
        assert!(matches!(err, NodeError::Rank(_)));
        let err = NodeConfig::from_toml("require_signature = \"yes\"").unwrap_err();
        assert!(matches!(err, NodeError::Config { .. }));
    }

    #[test]
    fn load_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.toml");
        std::fs::write(&path, "storage_root = \"data\"\nmanifest_path = \"/abs/manifest.json\"\ntools_out_dir = \"out\"\n").unwrap();
        let c = NodeConfig::load(&path).unwrap();
        assert_eq!(c.storage_root, dir.path().join("data"));
        assert_eq!(c.manifest_path, PathBuf::from("/abs/manifest.json"));
        assert_eq!(c.schemas_dir, dir.path().join("schemas"));
        assert_eq!(c.tools_out_dir, Some(dir.path().join("out")));

        let err = NodeConfig::load(&dir.path().join("missing.toml")).unwrap_err();
        assert!(err.is_environmental());
    }
}
