//! Rule-set file layout.
//!
//! File structure:
//! ```text
//! +--------------------+
//! |  HEADER (48 bytes) |  Magic "GEOXRSET", version, flags, slice_count,
//! |                    |  timestamp, body checksum
//! +--------------------+
//! |  BODY              |  zlib-compressed when flags has COMPRESSED
//! |  +--------------+  |
//! |  | SLICE INDEX  |  |  slice_count * SliceEntry (16 bytes)
//! |  +--------------+  |
//! |  | SLICE DATA   |  |  FST, value list or CIDR array per slice
//! |  +--------------+  |
//! +--------------------+
//! ```
//!
//! All integers are little endian. Slice offsets are relative to the start
//! of the (decompressed) body.

use bitflags::bitflags;

use crate::error::{Error, Result};

/// Magic bytes for rule-set files.
pub const MAGIC: [u8; 8] = *b"GEOXRSET";

/// Current format version.
pub const FORMAT_VERSION: u32 = 1;

/// Header size in bytes.
pub const HEADER_SIZE: usize = 48;

/// Slice index entry size in bytes.
pub const SLICE_ENTRY_SIZE: usize = 16;

/// Stored size of one IPv4 CIDR: network (4) + prefix (1) + padding (3).
pub const CIDR_V4_SIZE: usize = 8;

/// Stored size of one IPv6 CIDR: network (16) + prefix (1) + padding (7).
pub const CIDR_V6_SIZE: usize = 24;

bitflags! {
    /// Rule-set format flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FormatFlags: u32 {
        /// Body is zlib compressed.
        const COMPRESSED = 0b00000001;
    }
}

/// Slice type identifiers
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SliceType {
    /// FST set of exact domains
    DomainExact = 0x01,
    /// FST set of reversed domain suffixes
    DomainSuffix = 0x02,
    /// Newline separated keywords
    DomainKeyword = 0x03,
    /// Newline separated regular expressions
    DomainRegex = 0x04,
    /// IPv4 CIDR ranges
    CidrV4 = 0x05,
    /// IPv6 CIDR ranges
    CidrV6 = 0x06,
}

impl SliceType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::DomainExact),
            0x02 => Some(Self::DomainSuffix),
            0x03 => Some(Self::DomainKeyword),
            0x04 => Some(Self::DomainRegex),
            0x05 => Some(Self::CidrV4),
            0x06 => Some(Self::CidrV6),
            _ => None,
        }
    }
}

/// File header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleSetHeader {
    pub magic: [u8; 8],
    pub version: u32,
    pub flags: u32,
    pub slice_count: u32,
    /// Unix timestamp
    pub timestamp: i64,
    /// SHA-256 of the stored body (first 16 bytes)
    pub checksum: [u8; 16],
}

impl RuleSetHeader {
    pub fn new(flags: FormatFlags) -> Self {
        Self {
            magic: MAGIC,
            version: FORMAT_VERSION,
            flags: flags.bits(),
            slice_count: 0,
            timestamp: 0,
            checksum: [0; 16],
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.magic != MAGIC {
            return Err(Error::InvalidMagic);
        }
        if self.version > FORMAT_VERSION {
            return Err(Error::UnsupportedVersion(self.version));
        }
        Ok(())
    }

    pub fn format_flags(&self) -> FormatFlags {
        FormatFlags::from_bits_truncate(self.flags)
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0..8].copy_from_slice(&self.magic);
        out[8..12].copy_from_slice(&self.version.to_le_bytes());
        out[12..16].copy_from_slice(&self.flags.to_le_bytes());
        out[16..20].copy_from_slice(&self.slice_count.to_le_bytes());
        // 20..24 reserved
        out[24..32].copy_from_slice(&self.timestamp.to_le_bytes());
        out[32..48].copy_from_slice(&self.checksum);
        out
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(Error::InvalidRuleSet(format!(
                "header needs {} bytes, got {}",
                HEADER_SIZE,
                data.len()
            )));
        }
        let mut magic = [0u8; 8];
        magic.copy_from_slice(&data[0..8]);
        let mut checksum = [0u8; 16];
        checksum.copy_from_slice(&data[32..48]);
        Ok(Self {
            magic,
            version: read_u32(data, 8),
            flags: read_u32(data, 12),
            slice_count: read_u32(data, 16),
            timestamp: i64::from_le_bytes(array(&data[24..32])),
            checksum,
        })
    }
}

/// Slice index entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceEntry {
    pub slice_type: u8,
    /// Offset from the start of the body
    pub offset: u32,
    pub size: u32,
    /// Number of values in this slice
    pub count: u32,
}

impl SliceEntry {
    pub fn new(slice_type: SliceType) -> Self {
        Self {
            slice_type: slice_type as u8,
            offset: 0,
            size: 0,
            count: 0,
        }
    }

    pub fn get_type(&self) -> Option<SliceType> {
        SliceType::from_u8(self.slice_type)
    }

    pub fn to_bytes(&self) -> [u8; SLICE_ENTRY_SIZE] {
        let mut out = [0u8; SLICE_ENTRY_SIZE];
        out[0] = self.slice_type;
        // 1..4 reserved
        out[4..8].copy_from_slice(&self.offset.to_le_bytes());
        out[8..12].copy_from_slice(&self.size.to_le_bytes());
        out[12..16].copy_from_slice(&self.count.to_le_bytes());
        out
    }

    /// Parse an entry; `data` must hold at least `SLICE_ENTRY_SIZE` bytes.
    pub fn from_bytes(data: &[u8]) -> Self {
        Self {
            slice_type: data[0],
            offset: read_u32(data, 4),
            size: read_u32(data, 8),
            count: read_u32(data, 12),
        }
    }
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(array(&data[offset..offset + 4]))
}

fn array<const N: usize>(slice: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(slice);
    out
}
