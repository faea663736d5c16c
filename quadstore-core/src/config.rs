//! Store configuration
//!
//! Configuration is plain data with serde defaults so it can be loaded from
//! JSON; selected fields can then be overridden from environment variables.

use crate::error::{Error, Result};
use crate::permutation::{Permutation, DEFAULT_INDEXES};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable overriding `dataDir`
pub const ENV_DATA_DIR: &str = "QUADSTORE_DATA_DIR";
/// Environment variable overriding `indexes`
pub const ENV_INDEXES: &str = "QUADSTORE_INDEXES";
/// Environment variable overriding `syncCommits`
pub const ENV_SYNC_COMMITS: &str = "QUADSTORE_SYNC_COMMITS";

/// Configuration for a persistent multi-index store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StoreConfig {
    /// Directory holding the RocksDB files
    pub data_dir: PathBuf,
    /// Comma-separated index permutations, e.g. `"spoc,posc"`
    pub indexes: String,
    /// Sync the write-ahead log on every commit
    pub sync_commits: bool,
    /// Number of dictionary entries cached in memory (per direction)
    pub value_cache_size: usize,
    /// Keys fetched per cursor advance during range scans
    pub scan_batch_size: usize,
    /// Create the store if the directory holds none
    pub create_if_missing: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("quadstore-data"),
            indexes: DEFAULT_INDEXES.to_string(),
            sync_commits: true,
            value_cache_size: 10_000,
            scan_batch_size: 256,
            create_if_missing: true,
        }
    }
}

impl StoreConfig {
    /// Default configuration rooted at `data_dir`
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Parse from a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: StoreConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_indexes(mut self, indexes: impl Into<String>) -> Self {
        self.indexes = indexes.into();
        self
    }

    pub fn with_sync_commits(mut self, sync: bool) -> Self {
        self.sync_commits = sync;
        self
    }

    pub fn with_scan_batch_size(mut self, size: usize) -> Self {
        self.scan_batch_size = size;
        self
    }

    /// Apply `QUADSTORE_*` environment overrides. Empty variables are ignored.
    pub fn apply_env_overrides(mut self) -> Result<Self> {
        if let Some(dir) = env_value(ENV_DATA_DIR) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(indexes) = env_value(ENV_INDEXES) {
            self.indexes = indexes;
        }
        if let Some(sync) = env_value(ENV_SYNC_COMMITS) {
            self.sync_commits = parse_bool(&sync).ok_or_else(|| {
                Error::invalid_config(format!("{} must be a boolean, got '{}'", ENV_SYNC_COMMITS, sync))
            })?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Parsed index permutations in configuration order
    pub fn permutations(&self) -> Result<Vec<Permutation>> {
        Permutation::parse_list(&self.indexes)
    }

    pub fn validate(&self) -> Result<()> {
        self.permutations()?;
        if self.scan_batch_size == 0 {
            return Err(Error::invalid_config("scanBatchSize must be at least 1"));
        }
        if self.value_cache_size == 0 {
            return Err(Error::invalid_config("valueCacheSize must be at least 1"));
        }
        Ok(())
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_with_defaults() {
        let config = StoreConfig::from_json(r#"{"dataDir": "/tmp/qs", "indexes": "spoc,posc"}"#)
            .unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/qs"));
        assert_eq!(
            config.permutations().unwrap(),
            vec![Permutation::SPOC, Permutation::POSC]
        );
        assert!(config.sync_commits);
        assert_eq!(config.scan_batch_size, 256);
    }

    #[test]
    fn test_from_json_rejects_bad_indexes() {
        let err = StoreConfig::from_json(r#"{"indexes": "spo"}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidIndex(_)));
    }

    #[test]
    fn test_from_json_rejects_zero_batch() {
        let err = StoreConfig::from_json(r#"{"scanBatchSize": 0}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
