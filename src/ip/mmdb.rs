//! MaxMind DB (v2.0) serialization of a network trie.
//!
//! File structure:
//! ```text
//! +----------------------+
//! |  SEARCH TREE         |  node_count * record_size * 2 / 8 bytes
//! +----------------------+
//! |  16 zero bytes       |
//! +----------------------+
//! |  DATA SECTION        |  one entry per distinct value
//! +----------------------+
//! |  METADATA MARKER     |  "\xAB\xCD\xEFMaxMind.com"
//! |  METADATA MAP        |
//! +----------------------+
//! ```

use std::collections::BTreeMap;

use ahash::AHashMap;

use super::trie::{NetworkTrie, Record};
use crate::error::{Error, Result};

/// Marker preceding the metadata map.
pub const METADATA_MARKER: &[u8] = b"\xAB\xCD\xEFMaxMind.com";

/// Size of the zero gap between the search tree and the data section.
pub const DATA_SECTION_SEPARATOR: usize = 16;

/// Supported record sizes in bits.
pub const RECORD_SIZES: [u16; 3] = [24, 28, 32];

/// A value of the MMDB data section.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataValue {
    String(String),
    Bool(bool),
    Uint16(u16),
    Uint32(u32),
    Uint64(u64),
    Array(Vec<DataValue>),
    Map(Vec<(String, DataValue)>),
}

impl DataValue {
    /// Build a map value from key/value pairs.
    pub fn map<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, DataValue)>,
        K: Into<String>,
    {
        DataValue::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Append the encoded value to `buf`.
    pub fn encode(&self, buf: &mut Vec<u8>) {
        match self {
            DataValue::String(s) => {
                write_control(buf, 2, s.len());
                buf.extend_from_slice(s.as_bytes());
            }
            DataValue::Bool(b) => write_control(buf, 14, usize::from(*b)),
            DataValue::Uint16(v) => write_uint(buf, 5, u64::from(*v)),
            DataValue::Uint32(v) => write_uint(buf, 6, u64::from(*v)),
            DataValue::Uint64(v) => write_uint(buf, 9, *v),
            DataValue::Array(items) => {
                write_control(buf, 11, items.len());
                for item in items {
                    item.encode(buf);
                }
            }
            DataValue::Map(entries) => {
                write_control(buf, 7, entries.len());
                for (key, value) in entries {
                    DataValue::String(key.clone()).encode(buf);
                    value.encode(buf);
                }
            }
        }
    }
}

impl From<&str> for DataValue {
    fn from(s: &str) -> Self {
        DataValue::String(s.to_string())
    }
}

impl From<String> for DataValue {
    fn from(s: String) -> Self {
        DataValue::String(s)
    }
}

/// Control byte(s): 3-bit type (extended types spill into a second byte)
/// and a 5-bit size with up to three extension bytes.
fn write_control(buf: &mut Vec<u8>, type_num: u8, size: usize) {
    let (type_bits, extended) = if type_num <= 7 {
        (type_num << 5, None)
    } else {
        (0, Some(type_num - 7))
    };

    let (size_bits, size_bytes): (u8, Vec<u8>) = if size < 29 {
        (size as u8, Vec::new())
    } else if size < 29 + 256 {
        (29, vec![(size - 29) as u8])
    } else if size < 285 + 65_536 {
        (30, ((size - 285) as u16).to_be_bytes().to_vec())
    } else {
        (31, ((size - 65_821) as u32).to_be_bytes()[1..].to_vec())
    };

    buf.push(type_bits | size_bits);
    if let Some(ext) = extended {
        buf.push(ext);
    }
    buf.extend_from_slice(&size_bytes);
}

fn write_uint(buf: &mut Vec<u8>, type_num: u8, value: u64) {
    let bytes = value.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    write_control(buf, type_num, bytes.len() - skip);
    buf.extend_from_slice(&bytes[skip..]);
}

/// Database-level options written into the metadata map.
#[derive(Debug, Clone)]
pub struct DatabaseOptions {
    pub database_type: String,
    pub languages: Vec<String>,
    pub description: BTreeMap<String, String>,
    /// Minimum record size; upgraded when the tree does not fit
    pub record_size: u16,
    /// Build time in unix seconds, `None` for now
    pub build_epoch: Option<u64>,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            database_type: "sing-geoip".to_string(),
            languages: Vec::new(),
            description: BTreeMap::new(),
            record_size: 24,
            build_epoch: None,
        }
    }
}

/// Serialize a trie into MMDB bytes.
pub fn write_database(trie: &NetworkTrie<DataValue>, options: &DatabaseOptions) -> Result<Vec<u8>> {
    let tree = trie.compacted();
    let node_count = tree.len();

    // Data section: each referenced value once, in tree order.
    let mut data = Vec::new();
    let mut offsets: AHashMap<usize, usize> = AHashMap::new();
    for record in tree.iter().flatten() {
        if let Record::Data(idx) = *record {
            if !offsets.contains_key(&idx) {
                offsets.insert(idx, data.len());
                trie.values()[idx].encode(&mut data);
            }
        }
    }

    let largest = (node_count + DATA_SECTION_SEPARATOR + data.len()) as u64;
    let record_size = choose_record_size(options.record_size, largest)?;

    let mut out = Vec::with_capacity(node_count * usize::from(record_size) / 4 + data.len() + 512);
    for [left, right] in &tree {
        let resolve = |record: &Record| -> u32 {
            match *record {
                Record::Empty => node_count as u32,
                Record::Node(idx) => idx as u32,
                Record::Data(idx) => (node_count + DATA_SECTION_SEPARATOR + offsets[&idx]) as u32,
            }
        };
        write_node(&mut out, record_size, resolve(left), resolve(right));
    }
    out.extend_from_slice(&[0u8; DATA_SECTION_SEPARATOR]);
    out.extend_from_slice(&data);

    out.extend_from_slice(METADATA_MARKER);
    metadata(trie, options, node_count, record_size).encode(&mut out);

    log::debug!(
        "serialized {} nodes, {} data bytes, {}-bit records",
        node_count,
        data.len(),
        record_size
    );
    Ok(out)
}

fn choose_record_size(requested: u16, largest: u64) -> Result<u16> {
    if !RECORD_SIZES.contains(&requested) {
        return Err(Error::Config(format!("unsupported record size: {}", requested)));
    }
    let size = RECORD_SIZES
        .iter()
        .copied()
        .filter(|size| *size >= requested)
        .find(|size| largest < (1u64 << size))
        .ok_or_else(|| Error::Trie("search tree too large for 32-bit records".to_string()))?;
    if size != requested {
        log::warn!("record size raised from {} to {} bits", requested, size);
    }
    Ok(size)
}

fn write_node(out: &mut Vec<u8>, record_size: u16, left: u32, right: u32) {
    let l = left.to_be_bytes();
    let r = right.to_be_bytes();
    match record_size {
        24 => {
            out.extend_from_slice(&l[1..]);
            out.extend_from_slice(&r[1..]);
        }
        28 => {
            out.extend_from_slice(&l[1..]);
            out.push(((l[0] & 0x0f) << 4) | (r[0] & 0x0f));
            out.extend_from_slice(&r[1..]);
        }
        _ => {
            out.extend_from_slice(&l);
            out.extend_from_slice(&r);
        }
    }
}

fn metadata(
    trie: &NetworkTrie<DataValue>,
    options: &DatabaseOptions,
    node_count: usize,
    record_size: u16,
) -> DataValue {
    let build_epoch = options.build_epoch.unwrap_or_else(|| {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    });

    DataValue::map([
        ("binary_format_major_version", DataValue::Uint16(2)),
        ("binary_format_minor_version", DataValue::Uint16(0)),
        ("build_epoch", DataValue::Uint64(build_epoch)),
        ("database_type", DataValue::from(options.database_type.as_str())),
        (
            "description",
            DataValue::map(
                options
                    .description
                    .iter()
                    .map(|(k, v)| (k.as_str(), DataValue::from(v.as_str()))),
            ),
        ),
        ("ip_version", DataValue::Uint16(trie.ip_version().as_u16())),
        (
            "languages",
            DataValue::Array(
                options
                    .languages
                    .iter()
                    .map(|l| DataValue::from(l.as_str()))
                    .collect(),
            ),
        ),
        ("node_count", DataValue::Uint32(node_count as u32)),
        ("record_size", DataValue::Uint16(record_size)),
    ])
}
