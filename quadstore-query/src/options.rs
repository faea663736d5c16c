//! Query execution options

/// Default row count up to which a join builds a hash table over its inner side
pub const DEFAULT_HASH_JOIN_THRESHOLD: usize = 1_000;

/// Options controlling evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
    /// Largest estimated inner cardinality for which a hash join is used.
    /// Inner sides that cannot be re-evaluated per outer row are always
    /// materialized, whatever this is set to.
    pub hash_join_threshold: usize,
    /// Keys fetched per scan chunk; `None` uses the store's configured size
    pub scan_batch_size: Option<usize>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            hash_join_threshold: DEFAULT_HASH_JOIN_THRESHOLD,
            scan_batch_size: None,
        }
    }
}

impl QueryOptions {
    /// Create new execution options with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the hash join threshold (0 disables hash joins where a nested loop is possible)
    pub fn with_hash_join_threshold(mut self, threshold: usize) -> Self {
        self.hash_join_threshold = threshold;
        self
    }

    pub fn with_scan_batch_size(mut self, size: usize) -> Self {
        self.scan_batch_size = Some(size.max(1));
        self
    }
}
