//! RocksDB column family layout
//!
//! | Name | Purpose | Key | Value |
//! |------|---------|-----|-------|
//! | `dictionary` | Value <-> id interning | `v`+encoded value / `i`+id BE / meta | id BE / encoded value / next id |
//! | `index_<perm>` | One per configured permutation | [`IndexKey`](crate::IndexKey) (32 bytes) | empty |
//!
//! Every column family shares the database's write-ahead log, so one
//! `WriteBatch` spanning all of them commits atomically.

use crate::config::StoreConfig;
use crate::permutation::Permutation;
use rocksdb::{BlockBasedOptions, ColumnFamilyDescriptor, DBCompressionType, Options};

/// Dictionary column family
pub const CF_DICTIONARY: &str = "dictionary";

/// Prefix of index column family names
pub const INDEX_CF_PREFIX: &str = "index_";

/// Column family name for a permutation, e.g. `index_spoc`
pub fn index_cf_name(perm: Permutation) -> String {
    format!("{}{}", INDEX_CF_PREFIX, perm.name())
}

/// Permutation stored in an index column family; `None` for other names.
pub fn parse_index_cf_name(name: &str) -> Option<Permutation> {
    name.strip_prefix(INDEX_CF_PREFIX)?.parse().ok()
}

/// Database-wide options
pub fn db_options(config: &StoreConfig) -> Options {
    let mut opts = Options::default();
    opts.create_if_missing(config.create_if_missing);
    opts.create_missing_column_families(true);
    opts
}

/// Options for index column families.
///
/// Keys are fixed width and scanned in order; values are empty. Bloom filters
/// serve the point lookups used for existence checks at commit.
pub fn index_cf_options() -> Options {
    let mut block_opts = BlockBasedOptions::default();
    block_opts.set_bloom_filter(10.0, false);

    let mut opts = Options::default();
    opts.set_block_based_table_factory(&block_opts);
    opts.set_compression_type(DBCompressionType::Lz4);
    opts
}

/// Options for the dictionary column family (point lookups only).
pub fn dictionary_cf_options() -> Options {
    let mut block_opts = BlockBasedOptions::default();
    block_opts.set_bloom_filter(10.0, false);
    block_opts.set_cache_index_and_filter_blocks(true);

    let mut opts = Options::default();
    opts.set_block_based_table_factory(&block_opts);
    opts.set_compression_type(DBCompressionType::Lz4);
    opts.optimize_for_point_lookup(16);
    opts
}

/// Descriptors for every column family named in `names`.
///
/// Unknown names (including `default`) get plain options.
pub fn descriptors<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<ColumnFamilyDescriptor> {
    names
        .into_iter()
        .map(|name| {
            let opts = if name == CF_DICTIONARY {
                dictionary_cf_options()
            } else if parse_index_cf_name(name).is_some() {
                index_cf_options()
            } else {
                Options::default()
            };
            ColumnFamilyDescriptor::new(name, opts)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_cf_name_round_trip() {
        let name = index_cf_name(Permutation::POSC);
        assert_eq!(name, "index_posc");
        assert_eq!(parse_index_cf_name(&name), Some(Permutation::POSC));
        assert_eq!(parse_index_cf_name(CF_DICTIONARY), None);
        assert_eq!(parse_index_cf_name("index_xyz"), None);
    }
}
