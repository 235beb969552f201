//! IP pipeline: geolocation records to per-code network buckets, then to
//! lookup tries and MMDB databases.

mod classify;
pub mod mmdb;
mod trie;

pub use classify::{
    canonical_network, classify_networks, decode_geoip, ContinentRecord, CountryRecord,
    IpBucketTable, IpMetadata, IpNetworkRecord, LocationRecord,
};
pub use mmdb::{write_database, DataValue, DatabaseOptions};
pub use trie::{IpVersion, NetworkTrie};

use ahash::AHashSet;

use crate::error::Result;

/// Build one trie from the bucket table.
///
/// With `codes` set only those codes are included, otherwise every code.
/// Networks are inserted in source traversal order, so a later overlapping
/// network replaces an earlier one whatever their codes. Returns the trie
/// and the sorted labels: the requested codes, or every code in the table.
pub fn build_trie(
    buckets: &IpBucketTable,
    codes: Option<&[String]>,
    version: IpVersion,
) -> Result<(NetworkTrie<DataValue>, Vec<String>)> {
    let mut labels: Vec<String> = match codes {
        Some(codes) => codes.to_vec(),
        None => buckets.codes().into_iter().map(str::to_string).collect(),
    };
    labels.sort_unstable();
    labels.dedup();

    for code in &labels {
        if buckets.get(code).is_none() {
            log::warn!("code {} has no networks", code);
        }
    }

    let included: AHashSet<&str> = labels.iter().map(String::as_str).collect();
    let mut trie = NetworkTrie::new(version);
    for record in buckets.records() {
        if included.contains(record.code.as_str()) {
            trie.insert(record.network, DataValue::from(record.code.as_str()))?;
        }
    }
    Ok((trie, labels))
}
