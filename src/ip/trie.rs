//! Binary radix trie keyed by network prefix bits.
//!
//! Insertion uses a replace policy: a network overwrites everything it
//! covers, and a later, more specific network splits an earlier one. IPv4
//! networks in an IPv6 trie live under `::/96` with no other aliases.

use std::hash::Hash;
use std::net::IpAddr;

use ahash::AHashMap;
use ipnet::IpNet;

use crate::error::{Error, Result};

/// Address family of a trie (and of the database built from it).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpVersion {
    V4,
    V6,
}

impl IpVersion {
    pub fn from_u16(version: u16) -> Option<Self> {
        match version {
            4 => Some(IpVersion::V4),
            6 => Some(IpVersion::V6),
            _ => None,
        }
    }

    pub fn as_u16(self) -> u16 {
        match self {
            IpVersion::V4 => 4,
            IpVersion::V6 => 6,
        }
    }

    /// Number of key bits.
    pub fn depth(self) -> u8 {
        match self {
            IpVersion::V4 => 32,
            IpVersion::V6 => 128,
        }
    }
}

/// One side of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Record {
    Empty,
    Node(usize),
    Data(usize),
}

/// Network trie with values of type `V`.
///
/// Equal values are stored once and shared by every network carrying them.
#[derive(Debug, Clone)]
pub struct NetworkTrie<V> {
    version: IpVersion,
    nodes: Vec<[Record; 2]>,
    values: Vec<V>,
    interned: AHashMap<V, usize>,
}

impl<V: Clone + Eq + Hash> NetworkTrie<V> {
    /// Create an empty trie.
    pub fn new(version: IpVersion) -> Self {
        Self {
            version,
            nodes: vec![[Record::Empty; 2]],
            values: Vec::new(),
            interned: AHashMap::new(),
        }
    }

    pub fn ip_version(&self) -> IpVersion {
        self.version
    }

    /// Insert a network, replacing whatever the trie held inside it.
    pub fn insert(&mut self, network: IpNet, value: V) -> Result<()> {
        let (addr, prefix) = self.key(&network)?;
        let data = Record::Data(self.intern(value));

        if prefix == 0 {
            self.nodes[0] = [data; 2];
            return Ok(());
        }

        let mut current = 0;
        for i in 0..prefix - 1 {
            let bit = self.bit(addr, i);
            current = match self.nodes[current][bit] {
                Record::Node(next) => next,
                // Empty or data: push the existing record one level down.
                other => {
                    let next = self.nodes.len();
                    self.nodes.push([other; 2]);
                    self.nodes[current][bit] = Record::Node(next);
                    next
                }
            };
        }
        let bit = self.bit(addr, prefix - 1);
        self.nodes[current][bit] = data;
        Ok(())
    }

    /// Longest-prefix lookup of an address.
    pub fn lookup(&self, ip: IpAddr) -> Option<&V> {
        let addr = match (self.version, ip) {
            (IpVersion::V4, IpAddr::V4(v4)) => u128::from(u32::from(v4)),
            (IpVersion::V4, IpAddr::V6(_)) => return None,
            (IpVersion::V6, IpAddr::V4(v4)) => u128::from(u32::from(v4)),
            (IpVersion::V6, IpAddr::V6(v6)) => u128::from(v6),
        };

        let mut current = 0;
        for i in 0..self.version.depth() {
            match self.nodes[current][self.bit(addr, i)] {
                Record::Node(next) => current = next,
                Record::Data(value) => return self.values.get(value),
                Record::Empty => return None,
            }
        }
        None
    }

    /// Distinct values stored in the trie, indexed by `Record::Data`.
    pub fn values(&self) -> &[V] {
        &self.values
    }

    pub fn is_empty(&self) -> bool {
        self.nodes[0] == [Record::Empty; 2]
    }

    /// Reachable nodes in preorder, root first, with every node whose two
    /// sides are the same value (or both empty) folded into its parent.
    pub(crate) fn compacted(&self) -> Vec<[Record; 2]> {
        let mut out = vec![[Record::Empty; 2]];
        let [left, right] = self.nodes[0];
        let left = self.compact_record(left, &mut out);
        let right = self.compact_record(right, &mut out);
        out[0] = [left, right];
        out
    }

    fn compact_record(&self, record: Record, out: &mut Vec<[Record; 2]>) -> Record {
        let Record::Node(idx) = record else {
            return record;
        };
        let slot = out.len();
        out.push([Record::Empty; 2]);
        let [left, right] = self.nodes[idx];
        let left = self.compact_record(left, out);
        let right = self.compact_record(right, out);
        if left == right && !matches!(left, Record::Node(_)) {
            out.truncate(slot);
            return left;
        }
        out[slot] = [left, right];
        Record::Node(slot)
    }

    fn intern(&mut self, value: V) -> usize {
        if let Some(&idx) = self.interned.get(&value) {
            return idx;
        }
        let idx = self.values.len();
        self.values.push(value.clone());
        self.interned.insert(value, idx);
        idx
    }

    fn key(&self, network: &IpNet) -> Result<(u128, u8)> {
        match (self.version, network) {
            (IpVersion::V4, IpNet::V4(net)) => {
                Ok((u128::from(u32::from(net.network())), net.prefix_len()))
            }
            (IpVersion::V4, IpNet::V6(net)) => Err(Error::Trie(format!(
                "cannot insert IPv6 network {} into an IPv4 tree",
                net
            ))),
            (IpVersion::V6, IpNet::V4(net)) => {
                Ok((u128::from(u32::from(net.network())), net.prefix_len() + 96))
            }
            (IpVersion::V6, IpNet::V6(net)) => Ok((u128::from(net.network()), net.prefix_len())),
        }
    }

    fn bit(&self, addr: u128, index: u8) -> usize {
        let shift = u32::from(self.version.depth() - 1 - index);
        ((addr >> shift) & 1) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn net(s: &str) -> IpNet {
        s.parse().unwrap()
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_later_specific_network_wins() {
        let mut trie = NetworkTrie::new(IpVersion::V6);
        trie.insert(net("10.0.0.0/8"), "us").unwrap();
        trie.insert(net("10.0.0.0/16"), "ca").unwrap();

        assert_eq!(trie.lookup(ip("10.0.5.5")), Some(&"ca"));
        assert_eq!(trie.lookup(ip("10.1.0.1")), Some(&"us"));
        assert_eq!(trie.lookup(ip("11.0.0.1")), None);
    }

    #[test]
    fn test_later_covering_network_replaces() {
        let mut trie = NetworkTrie::new(IpVersion::V4);
        trie.insert(net("10.0.0.0/16"), "ca").unwrap();
        trie.insert(net("10.0.0.0/8"), "us").unwrap();

        assert_eq!(trie.lookup(ip("10.0.5.5")), Some(&"us"));
    }

    #[test]
    fn test_ipv6_networks() {
        let mut trie = NetworkTrie::new(IpVersion::V6);
        trie.insert(net("2001:db8::/32"), "jp").unwrap();
        trie.insert(net("1.0.0.0/24"), "au").unwrap();

        assert_eq!(trie.lookup(ip("2001:db8::1")), Some(&"jp"));
        assert_eq!(trie.lookup(ip("1.0.0.1")), Some(&"au"));
        assert_eq!(trie.lookup(ip("::1.0.0.1")), Some(&"au"));
        assert_eq!(trie.lookup(ip("2001:db9::1")), None);
    }

    #[test]
    fn test_ipv4_tree_rejects_ipv6() {
        let mut trie = NetworkTrie::new(IpVersion::V4);
        assert!(trie.insert(net("2001:db8::/32"), "jp").is_err());
        assert_eq!(trie.lookup(ip("2001:db8::1")), None);
    }

    #[test]
    fn test_default_route() {
        let mut trie = NetworkTrie::new(IpVersion::V4);
        assert!(trie.is_empty());
        trie.insert(net("0.0.0.0/0"), "zz").unwrap();
        assert_eq!(trie.lookup(ip("8.8.8.8")), Some(&"zz"));
    }

    #[test]
    fn test_values_are_interned() {
        let mut trie = NetworkTrie::new(IpVersion::V4);
        trie.insert(net("1.0.0.0/24"), "cn".to_string()).unwrap();
        trie.insert(net("2.0.0.0/24"), "cn".to_string()).unwrap();
        assert_eq!(trie.values().len(), 1);
    }

    #[test]
    fn test_compacted_merges_equal_siblings() {
        let mut trie = NetworkTrie::new(IpVersion::V4);
        trie.insert(net("10.0.0.0/9"), "us").unwrap();
        trie.insert(net("10.128.0.0/9"), "us").unwrap();

        let compacted = trie.compacted();
        // Root plus the seven nodes down to the shared /8.
        assert_eq!(compacted.len(), 8);
        assert!(compacted
            .iter()
            .all(|node| node[0] != node[1] || matches!(node[0], Record::Node(_))));
    }
}
