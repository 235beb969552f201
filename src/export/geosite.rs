//! Geosite database: every category's rules in one file.
//!
//! File structure:
//! ```text
//! +----------------------+
//! |  version (u8 = 0)    |
//! |  uvarint count       |
//! +----------------------+
//! |  INDEX               |  per category, sorted by name:
//! |                      |  name (uvarint len + bytes),
//! |                      |  uvarint item offset, uvarint item count
//! +----------------------+
//! |  ITEMS               |  per rule: kind (u8), value (uvarint len + bytes)
//! +----------------------+
//! ```

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::rule_type::{MatchKind, MatchRule};
use crate::site::CategoryTable;

/// Database format version.
pub const GEOSITE_VERSION: u8 = 0;

/// Serialize every category of the table.
pub fn write_geosite(table: &CategoryTable) -> Vec<u8> {
    let mut categories: Vec<(String, &[MatchRule])> = table
        .iter()
        .map(|(category, rules)| (category.to_string(), rules))
        .collect();
    categories.sort_by(|a, b| a.0.cmp(&b.0));

    let mut items = Vec::new();
    let mut index = Vec::with_capacity(categories.len());
    for (name, rules) in &categories {
        index.push((name.as_str(), items.len(), rules.len()));
        for rule in rules.iter() {
            items.push(rule.kind.as_u8());
            write_string(&mut items, &rule.value);
        }
    }

    let mut out = vec![GEOSITE_VERSION];
    write_uvarint(&mut out, categories.len() as u64);
    for (name, offset, count) in index {
        write_string(&mut out, name);
        write_uvarint(&mut out, offset as u64);
        write_uvarint(&mut out, count as u64);
    }
    out.extend_from_slice(&items);
    out
}

/// Parse a geosite database back into name to rules.
pub fn read_geosite(data: &[u8]) -> Result<BTreeMap<String, Vec<MatchRule>>> {
    let mut cursor = Cursor { data, pos: 0 };
    let version = cursor.byte()?;
    if version != GEOSITE_VERSION {
        return Err(Error::InvalidGeosite(format!("unknown version {}", version)));
    }

    let count = cursor.uvarint()?;
    let mut index = Vec::new();
    for _ in 0..count {
        let name = cursor.string()?;
        let offset = cursor.uvarint()? as usize;
        let items = cursor.uvarint()?;
        index.push((name, offset, items));
    }

    let items = &data[cursor.pos..];
    let mut out = BTreeMap::new();
    for (name, offset, count) in index {
        if offset > items.len() {
            return Err(Error::InvalidGeosite(format!(
                "{}: item offset {} out of bounds",
                name, offset
            )));
        }
        let mut cursor = Cursor {
            data: items,
            pos: offset,
        };
        let mut rules = Vec::new();
        for _ in 0..count {
            let code = cursor.byte()?;
            let kind = MatchKind::from_u8(code)
                .ok_or_else(|| Error::InvalidGeosite(format!("{}: unknown item type {}", name, code)))?;
            rules.push(MatchRule::new(kind, cursor.string()?));
        }
        out.insert(name, rules);
    }
    Ok(out)
}

fn write_uvarint(buf: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        buf.push((value as u8) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}

fn write_string(buf: &mut Vec<u8>, value: &str) {
    write_uvarint(buf, value.len() as u64);
    buf.extend_from_slice(value.as_bytes());
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl Cursor<'_> {
    fn byte(&mut self) -> Result<u8> {
        let byte = *self
            .data
            .get(self.pos)
            .ok_or_else(|| Error::InvalidGeosite("unexpected end of data".to_string()))?;
        self.pos += 1;
        Ok(byte)
    }

    fn uvarint(&mut self) -> Result<u64> {
        let mut value = 0u64;
        for shift in (0..64).step_by(7) {
            let byte = self.byte()?;
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(Error::InvalidGeosite("uvarint overflows u64".to_string()))
    }

    fn string(&mut self) -> Result<String> {
        let len = self.uvarint()? as usize;
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| Error::InvalidGeosite("string out of bounds".to_string()))?;
        let value = std::str::from_utf8(&self.data[self.pos..end])
            .map_err(|e| Error::InvalidGeosite(e.to_string()))?;
        self.pos = end;
        Ok(value.to_string())
    }
}
