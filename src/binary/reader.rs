//! Rule-set file reader.

use std::io::Read;
use std::net::IpAddr;

use flate2::read::ZlibDecoder;
use fst::Set;
use regex::RegexSet;
use sha2::{Digest, Sha256};

use super::format::*;
use crate::error::{Error, Result};

/// A validated rule-set loaded into memory.
pub struct RuleSetReader {
    header: RuleSetHeader,
    entries: Vec<SliceEntry>,
    exact: Option<Set<Vec<u8>>>,
    suffix: Option<Set<Vec<u8>>>,
    keywords: Vec<String>,
    regexes: Option<RegexSet>,
    cidr_v4: Vec<(u32, u8)>,
    cidr_v6: Vec<(u128, u8)>,
}

impl RuleSetReader {
    /// Load from bytes, checking the header, checksum and every slice.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let header = RuleSetHeader::from_bytes(data)?;
        header.validate()?;

        let stored = &data[HEADER_SIZE..];
        if Sha256::digest(stored)[..16] != header.checksum {
            return Err(Error::CorruptRuleSet);
        }

        let body = if header.format_flags().contains(FormatFlags::COMPRESSED) {
            let mut body = Vec::new();
            ZlibDecoder::new(stored).read_to_end(&mut body)?;
            body
        } else {
            stored.to_vec()
        };

        let slice_count = header.slice_count as usize;
        let index_end = slice_count * SLICE_ENTRY_SIZE;
        if body.len() < index_end {
            return Err(Error::InvalidRuleSet("slice index truncated".to_string()));
        }

        let mut reader = Self {
            header,
            entries: Vec::with_capacity(slice_count),
            exact: None,
            suffix: None,
            keywords: Vec::new(),
            regexes: None,
            cidr_v4: Vec::new(),
            cidr_v6: Vec::new(),
        };

        for i in 0..slice_count {
            let entry = SliceEntry::from_bytes(&body[i * SLICE_ENTRY_SIZE..]);
            let start = entry.offset as usize;
            let end = start + entry.size as usize;
            if start < index_end || end > body.len() {
                return Err(Error::InvalidRuleSet(format!(
                    "slice {} out of bounds ({}..{})",
                    i, start, end
                )));
            }
            reader.load_slice(&entry, &body[start..end])?;
            reader.entries.push(entry);
        }

        Ok(reader)
    }

    pub fn header(&self) -> &RuleSetHeader {
        &self.header
    }

    pub fn slice_count(&self) -> usize {
        self.entries.len()
    }

    /// Number of values stored in slices of a type.
    pub fn count(&self, slice_type: SliceType) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.get_type() == Some(slice_type))
            .map(|entry| entry.count as usize)
            .sum()
    }

    /// Whether any domain rule matches.
    pub fn match_domain(&self, domain: &str) -> bool {
        let domain = domain.to_lowercase();

        if let Some(exact) = &self.exact {
            if exact.contains(&domain) {
                return true;
            }
        }
        if let Some(suffix) = &self.suffix {
            if match_suffix(suffix, &domain) {
                return true;
            }
        }
        if self.keywords.iter().any(|keyword| domain.contains(keyword.as_str())) {
            return true;
        }
        self.regexes
            .as_ref()
            .map_or(false, |regexes| regexes.is_match(&domain))
    }

    /// Whether any CIDR contains the address.
    pub fn match_ip(&self, ip: IpAddr) -> bool {
        match ip {
            IpAddr::V4(v4) => {
                let ip = u32::from(v4);
                self.cidr_v4.iter().any(|(network, prefix_len)| {
                    let mask = if *prefix_len == 0 {
                        0
                    } else {
                        !0u32 << (32 - u32::from(*prefix_len))
                    };
                    ip & mask == network & mask
                })
            }
            IpAddr::V6(v6) => {
                let ip = u128::from(v6);
                self.cidr_v6.iter().any(|(network, prefix_len)| {
                    let mask = if *prefix_len == 0 {
                        0
                    } else {
                        !0u128 << (128 - u32::from(*prefix_len))
                    };
                    ip & mask == network & mask
                })
            }
        }
    }

    fn load_slice(&mut self, entry: &SliceEntry, data: &[u8]) -> Result<()> {
        let count = entry.count as usize;
        match entry.get_type() {
            Some(SliceType::DomainExact) => self.exact = Some(Set::new(data.to_vec())?),
            Some(SliceType::DomainSuffix) => self.suffix = Some(Set::new(data.to_vec())?),
            Some(SliceType::DomainKeyword) => self.keywords.extend(read_list(data, count)?),
            Some(SliceType::DomainRegex) => {
                self.regexes = Some(RegexSet::new(read_list(data, count)?)?);
            }
            Some(SliceType::CidrV4) => {
                check_len(data, count * CIDR_V4_SIZE)?;
                self.cidr_v4.extend(data.chunks_exact(CIDR_V4_SIZE).map(|chunk| {
                    let mut network = [0u8; 4];
                    network.copy_from_slice(&chunk[..4]);
                    (u32::from_be_bytes(network), chunk[4].min(32))
                }));
            }
            Some(SliceType::CidrV6) => {
                check_len(data, count * CIDR_V6_SIZE)?;
                self.cidr_v6.extend(data.chunks_exact(CIDR_V6_SIZE).map(|chunk| {
                    let mut network = [0u8; 16];
                    network.copy_from_slice(&chunk[..16]);
                    (u128::from_be_bytes(network), chunk[16].min(128))
                }));
            }
            None => {
                return Err(Error::InvalidRuleSet(format!(
                    "unknown slice type {:#04x}",
                    entry.slice_type
                )))
            }
        }
        Ok(())
    }
}

/// Suffix keys are stored reversed. A dotted key matches strict subdomains,
/// a bare key matches the domain itself or any subdomain.
fn match_suffix(set: &Set<Vec<u8>>, domain: &str) -> bool {
    let reversed: String = domain.chars().rev().collect();
    if set.contains(&reversed) {
        return true;
    }
    // Every '.' in the reversed domain marks a label boundary.
    reversed.match_indices('.').any(|(idx, _)| {
        set.contains(&reversed[..idx]) || set.contains(&reversed[..=idx])
    })
}

fn check_len(data: &[u8], expected: usize) -> Result<()> {
    if data.len() != expected {
        return Err(Error::InvalidRuleSet(format!(
            "CIDR slice holds {} bytes, expected {}",
            data.len(),
            expected
        )));
    }
    Ok(())
}

fn read_list(data: &[u8], count: usize) -> Result<Vec<String>> {
    let truncated = || Error::InvalidRuleSet("value list truncated".to_string());
    let mut values = Vec::with_capacity(count);
    let mut pos = 0;
    for _ in 0..count {
        let len_bytes = data.get(pos..pos + 4).ok_or_else(truncated)?;
        let mut len = [0u8; 4];
        len.copy_from_slice(len_bytes);
        pos += 4;
        let len = u32::from_le_bytes(len) as usize;
        let bytes = data.get(pos..pos + len).ok_or_else(truncated)?;
        let value = std::str::from_utf8(bytes)
            .map_err(|e| Error::InvalidRuleSet(format!("value is not UTF-8: {}", e)))?;
        values.push(value.to_string());
        pos += len;
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::super::writer::RuleSetWriter;
    use super::*;
    use crate::site::CompiledRules;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn domain_rule_set(compress: bool) -> Vec<u8> {
        let mut writer = RuleSetWriter::new().compressed(compress);
        writer
            .add_compiled(&CompiledRules {
                domain: strings(&["exact.org"]),
                domain_suffix: strings(&[".example.com", "bare.net"]),
                domain_keyword: strings(&["tracker"]),
                domain_regex: strings(&["^ads?\\d*\\."]),
            })
            .unwrap();
        writer.build().unwrap()
    }

    #[test]
    fn test_match_domain() {
        for compress in [false, true] {
            let reader = RuleSetReader::from_bytes(&domain_rule_set(compress)).unwrap();
            assert_eq!(reader.slice_count(), 4);
            assert_eq!(reader.count(SliceType::DomainSuffix), 2);

            assert!(reader.match_domain("exact.org"));
            assert!(!reader.match_domain("www.exact.org"));

            assert!(reader.match_domain("www.example.com"));
            assert!(!reader.match_domain("example.com"));
            assert!(!reader.match_domain("notexample.com"));

            assert!(reader.match_domain("bare.net"));
            assert!(reader.match_domain("a.b.bare.net"));
            assert!(!reader.match_domain("unbare.net"));

            assert!(reader.match_domain("cdn.tracker.io"));
            assert!(reader.match_domain("ads1.host.io"));
            assert!(reader.match_domain("WWW.EXAMPLE.COM"));
            assert!(!reader.match_domain("clean.io"));
        }
    }

    #[test]
    fn test_match_ip() {
        let mut writer = RuleSetWriter::new();
        let networks: Vec<ipnet::IpNet> = ["10.0.0.0/8", "2001:db8::/32"]
            .iter()
            .map(|n| n.parse().unwrap())
            .collect();
        writer.add_cidrs(&networks);
        let reader = RuleSetReader::from_bytes(&writer.build().unwrap()).unwrap();

        assert!(reader.match_ip("10.1.2.3".parse().unwrap()));
        assert!(!reader.match_ip("11.0.0.1".parse().unwrap()));
        assert!(reader.match_ip("2001:db8::1".parse().unwrap()));
        assert!(!reader.match_ip("2001:db9::1".parse().unwrap()));
        assert!(!reader.match_domain("example.com"));
    }

    #[test]
    fn test_rejects_tampered_body() {
        let mut data = domain_rule_set(false);
        let last = data.len() - 1;
        data[last] ^= 0xff;
        assert!(matches!(
            RuleSetReader::from_bytes(&data),
            Err(Error::CorruptRuleSet)
        ));
    }

    #[test]
    fn test_rejects_bad_magic() {
        let mut data = domain_rule_set(false);
        data[0] = b'X';
        assert!(matches!(
            RuleSetReader::from_bytes(&data),
            Err(Error::InvalidMagic)
        ));
        assert!(RuleSetReader::from_bytes(b"short").is_err());
    }
}
