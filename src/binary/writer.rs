//! Rule-set file writer.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use fst::Set;
use ipnet::IpNet;
use sha2::{Digest, Sha256};

use super::format::*;
use crate::error::Result;
use crate::site::CompiledRules;

/// Builder for rule-set files.
pub struct RuleSetWriter {
    compress: bool,
    slices: Vec<SliceData>,
}

struct SliceData {
    entry: SliceEntry,
    data: Vec<u8>,
}

impl RuleSetWriter {
    pub fn new() -> Self {
        Self {
            compress: false,
            slices: Vec::new(),
        }
    }

    /// Compress the body with zlib.
    pub fn compressed(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Add the four domain lists of a compiled category.
    pub fn add_compiled(&mut self, rules: &CompiledRules) -> Result<()> {
        self.add_exact_domains(&rules.domain)?;
        self.add_domain_suffixes(&rules.domain_suffix)?;
        self.add_keywords(&rules.domain_keyword);
        self.add_regexes(&rules.domain_regex);
        Ok(())
    }

    /// Add an exact-domain slice.
    pub fn add_exact_domains(&mut self, domains: &[String]) -> Result<()> {
        let keys = sorted_keys(domains.iter().map(|d| d.to_lowercase()));
        self.add_fst_slice(SliceType::DomainExact, keys)
    }

    /// Add a domain-suffix slice.
    ///
    /// Suffixes are stored reversed and verbatim, so `.example.com` (strict
    /// subdomains) and `example.com` (the domain and its subdomains) keep
    /// their distinct meaning.
    pub fn add_domain_suffixes(&mut self, suffixes: &[String]) -> Result<()> {
        let keys = sorted_keys(
            suffixes
                .iter()
                .map(|s| s.to_lowercase().chars().rev().collect::<String>()),
        );
        self.add_fst_slice(SliceType::DomainSuffix, keys)
    }

    pub fn add_keywords(&mut self, keywords: &[String]) {
        self.add_list_slice(SliceType::DomainKeyword, keywords);
    }

    pub fn add_regexes(&mut self, regexes: &[String]) {
        self.add_list_slice(SliceType::DomainRegex, regexes);
    }

    /// Add CIDR slices, IPv4 and IPv6 networks going to separate slices.
    pub fn add_cidrs(&mut self, networks: &[IpNet]) {
        let mut v4: Vec<(u32, u8)> = Vec::new();
        let mut v6: Vec<([u8; 16], u8)> = Vec::new();
        for network in networks {
            match network.trunc() {
                IpNet::V4(net) => v4.push((u32::from(net.network()), net.prefix_len())),
                IpNet::V6(net) => v6.push((net.network().octets(), net.prefix_len())),
            }
        }

        if !v4.is_empty() {
            v4.sort_unstable();
            v4.dedup();
            let mut data = Vec::with_capacity(v4.len() * CIDR_V4_SIZE);
            for (network, prefix_len) in &v4 {
                data.extend_from_slice(&network.to_be_bytes());
                data.push(*prefix_len);
                data.extend_from_slice(&[0u8; 3]);
            }
            self.push(SliceType::CidrV4, v4.len(), data);
        }

        if !v6.is_empty() {
            v6.sort_unstable();
            v6.dedup();
            let mut data = Vec::with_capacity(v6.len() * CIDR_V6_SIZE);
            for (network, prefix_len) in &v6 {
                data.extend_from_slice(network);
                data.push(*prefix_len);
                data.extend_from_slice(&[0u8; 7]);
            }
            self.push(SliceType::CidrV6, v6.len(), data);
        }
    }

    /// Build the final file.
    pub fn build(&mut self) -> Result<Vec<u8>> {
        let index_size = self.slices.len() * SLICE_ENTRY_SIZE;
        let mut offset = index_size;
        for slice in &mut self.slices {
            slice.entry.offset = offset as u32;
            slice.entry.size = slice.data.len() as u32;
            offset += slice.data.len();
        }

        let mut body = Vec::with_capacity(offset);
        for slice in &self.slices {
            body.extend_from_slice(&slice.entry.to_bytes());
        }
        for slice in &self.slices {
            body.extend_from_slice(&slice.data);
        }

        let mut flags = FormatFlags::empty();
        if self.compress {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
            encoder.write_all(&body)?;
            body = encoder.finish()?;
            flags |= FormatFlags::COMPRESSED;
        }

        let mut header = RuleSetHeader::new(flags);
        header.slice_count = self.slices.len() as u32;
        header.timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64;
        header
            .checksum
            .copy_from_slice(&Sha256::digest(&body)[..16]);

        let mut output = Vec::with_capacity(HEADER_SIZE + body.len());
        output.extend_from_slice(&header.to_bytes());
        output.extend_from_slice(&body);
        Ok(output)
    }

    fn add_fst_slice(&mut self, slice_type: SliceType, keys: Vec<String>) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let set = Set::from_iter(keys.iter())?;
        self.push(slice_type, keys.len(), set.into_fst().into_inner());
        Ok(())
    }

    /// Each value is a u32 LE length followed by its UTF-8 bytes.
    fn add_list_slice(&mut self, slice_type: SliceType, values: &[String]) {
        if values.is_empty() {
            return;
        }
        let mut data = Vec::new();
        for value in values {
            data.extend_from_slice(&(value.len() as u32).to_le_bytes());
            data.extend_from_slice(value.as_bytes());
        }
        self.push(slice_type, values.len(), data);
    }

    fn push(&mut self, slice_type: SliceType, count: usize, data: Vec<u8>) {
        let mut entry = SliceEntry::new(slice_type);
        entry.count = count as u32;
        self.slices.push(SliceData { entry, data });
    }
}

impl Default for RuleSetWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn sorted_keys(keys: impl Iterator<Item = String>) -> Vec<String> {
    let mut keys: Vec<String> = keys.collect();
    keys.sort_unstable();
    keys.dedup();
    keys
}
