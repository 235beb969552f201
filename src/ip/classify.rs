//! GeoIP dataset classification: network to lowercase country/continent code.

use std::net::{Ipv4Addr, Ipv6Addr};

use ahash::AHashMap;
use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use ipnetwork::IpNetwork;
use serde::Deserialize;

use crate::error::{Error, Result};

/// IPv6 ranges that alias the IPv4 subtree in IPv6 GeoIP databases.
const ALIASED_NETWORKS: [(Ipv6Addr, u8); 3] = [
    (Ipv6Addr::new(0, 0, 0, 0, 0, 0xffff, 0, 0), 96),
    (Ipv6Addr::new(0x2001, 0, 0, 0, 0, 0, 0, 0), 32),
    (Ipv6Addr::new(0x2002, 0, 0, 0, 0, 0, 0, 0), 16),
];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CountryRecord {
    pub iso_code: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContinentRecord {
    pub code: Option<String>,
}

/// The location fields of a GeoIP record this crate resolves codes from.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocationRecord {
    #[serde(default)]
    pub country: Option<CountryRecord>,
    #[serde(default)]
    pub registered_country: Option<CountryRecord>,
    #[serde(default)]
    pub represented_country: Option<CountryRecord>,
    #[serde(default)]
    pub continent: Option<ContinentRecord>,
}

impl LocationRecord {
    /// Resolve the lowercase code: country, then registered country, then
    /// represented country, then continent. Empty codes are skipped.
    pub fn resolve_code(&self) -> Option<String> {
        fn iso(record: &Option<CountryRecord>) -> Option<&str> {
            record.as_ref().and_then(|r| r.iso_code.as_deref())
        }

        [
            iso(&self.country),
            iso(&self.registered_country),
            iso(&self.represented_country),
            self.continent.as_ref().and_then(|c| c.code.as_deref()),
        ]
        .into_iter()
        .flatten()
        .find(|code| !code.is_empty())
        .map(str::to_lowercase)
    }
}

/// A network together with its resolved code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpNetworkRecord {
    pub network: IpNet,
    pub code: String,
}

/// Source database properties carried over to the generated databases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpMetadata {
    pub ip_version: u16,
    pub record_size: u16,
    pub database_type: String,
}

/// Networks bucketed by lowercase code.
///
/// Besides the per-code buckets the table keeps every record in source
/// traversal order; overlapping networks are resolved by that order.
#[derive(Debug, Clone, Default)]
pub struct IpBucketTable {
    buckets: AHashMap<String, Vec<IpNet>>,
    records: Vec<IpNetworkRecord>,
}

impl IpBucketTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: IpNetworkRecord) {
        self.buckets
            .entry(record.code.clone())
            .or_default()
            .push(record.network);
        self.records.push(record);
    }

    /// Every record in the order it was pushed.
    pub fn records(&self) -> &[IpNetworkRecord] {
        &self.records
    }

    pub fn get(&self, code: &str) -> Option<&[IpNet]> {
        self.buckets.get(code).map(Vec::as_slice)
    }

    /// All codes, sorted.
    pub fn codes(&self) -> Vec<&str> {
        let mut codes: Vec<&str> = self.buckets.keys().map(String::as_str).collect();
        codes.sort_unstable();
        codes
    }

    /// Iterate over codes and their networks, sorted by code.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[IpNet])> + '_ {
        self.codes()
            .into_iter()
            .filter_map(move |code| Some((code, self.get(code)?)))
    }

    /// Number of codes.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Total number of networks across all codes.
    pub fn network_count(&self) -> usize {
        self.records.len()
    }
}

/// Map a network reported by the reader to the network to bucket.
///
/// Returns `None` for aliases of the IPv4 subtree. IPv4 data stored under
/// `::/96` comes back as plain IPv4 networks.
pub fn canonical_network(network: IpNetwork) -> Result<Option<IpNet>> {
    let invalid = |e: ipnet::PrefixLenError| Error::InvalidNetwork(format!("{}: {}", network, e));
    match network {
        IpNetwork::V4(net) => Ok(Some(IpNet::V4(
            Ipv4Net::new(net.network(), net.prefix()).map_err(invalid)?.trunc(),
        ))),
        IpNetwork::V6(net) => {
            let net = Ipv6Net::new(net.network(), net.prefix()).map_err(invalid)?.trunc();
            let aliased = ALIASED_NETWORKS.iter().any(|(addr, prefix)| {
                Ipv6Net::new(*addr, *prefix).map_or(false, |alias| alias.contains(&net))
            });
            if aliased {
                return Ok(None);
            }

            let bits = u128::from(net.network());
            if net.prefix_len() >= 96 && bits >> 32 == 0 {
                let v4 = Ipv4Addr::from(bits as u32);
                return Ok(Some(IpNet::V4(
                    Ipv4Net::new(v4, net.prefix_len() - 96).map_err(invalid)?,
                )));
            }
            Ok(Some(IpNet::V6(net)))
        }
    }
}

/// Walk every canonical network of a GeoIP database and bucket it by code.
///
/// Networks whose record carries no code at all are dropped.
pub fn classify_networks<S: AsRef<[u8]>>(reader: &maxminddb::Reader<S>) -> Result<IpBucketTable> {
    let root = if reader.metadata.ip_version == 6 {
        "::/0"
    } else {
        "0.0.0.0/0"
    };
    let root: IpNetwork = root
        .parse()
        .map_err(|e| Error::InvalidNetwork(format!("{}: {}", root, e)))?;

    let mut buckets = IpBucketTable::new();
    let mut aliased = 0usize;
    let mut dropped = 0usize;

    for item in reader.within::<LocationRecord>(root)? {
        let item = item?;
        let Some(network) = canonical_network(item.ip_net)? else {
            aliased += 1;
            continue;
        };
        match item.info.resolve_code() {
            Some(code) => buckets.push(IpNetworkRecord { network, code }),
            None => dropped += 1,
        }
    }

    if aliased > 0 {
        log::debug!("skipped {} aliased networks", aliased);
    }
    log::info!(
        "classified {} networks into {} codes ({} without a code)",
        buckets.network_count(),
        buckets.len(),
        dropped
    );
    Ok(buckets)
}

/// Open a GeoIP database from bytes and classify it.
pub fn decode_geoip<S: AsRef<[u8]>>(source: S) -> Result<(IpMetadata, IpBucketTable)> {
    let reader = maxminddb::Reader::from_source(source)?;
    let metadata = IpMetadata {
        ip_version: reader.metadata.ip_version,
        record_size: reader.metadata.record_size,
        database_type: reader.metadata.database_type.clone(),
    };
    let buckets = classify_networks(&reader)?;
    Ok((metadata, buckets))
}
