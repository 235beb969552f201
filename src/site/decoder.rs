//! Decoder for the v2ray `GeoSiteList` protobuf dataset.

use prost::Message;

use super::record::{RawDomainRecord, RawKind, RawSiteEntry};
use crate::error::Result;

/// Wire messages of the upstream dataset. Fields this crate does not need
/// are left out and skipped by the decoder.
pub mod proto {
    #[derive(Clone, PartialEq, prost::Message)]
    pub struct GeoSiteList {
        #[prost(message, repeated, tag = "1")]
        pub entry: Vec<GeoSite>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct GeoSite {
        #[prost(string, tag = "1")]
        pub country_code: String,
        #[prost(message, repeated, tag = "2")]
        pub domain: Vec<Domain>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct Domain {
        #[prost(enumeration = "DomainType", tag = "1")]
        pub r#type: i32,
        #[prost(string, tag = "2")]
        pub value: String,
        #[prost(message, repeated, tag = "3")]
        pub attribute: Vec<Attribute>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct Attribute {
        #[prost(string, tag = "1")]
        pub key: String,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
    #[repr(i32)]
    pub enum DomainType {
        Plain = 0,
        Regex = 1,
        RootDomain = 2,
        Full = 3,
    }
}

impl From<proto::Domain> for RawDomainRecord {
    fn from(domain: proto::Domain) -> Self {
        Self {
            kind: RawKind::from_code(domain.r#type),
            value: domain.value,
            tags: domain.attribute.into_iter().map(|a| a.key).collect(),
        }
    }
}

impl From<proto::GeoSite> for RawSiteEntry {
    fn from(site: proto::GeoSite) -> Self {
        Self {
            code: site.country_code,
            records: site.domain.into_iter().map(RawDomainRecord::from).collect(),
        }
    }
}

/// Decode a `GeoSiteList` into raw entries.
pub fn decode_site_list(data: &[u8]) -> Result<Vec<RawSiteEntry>> {
    let list = proto::GeoSiteList::decode(data)?;
    log::info!("decoded {} domain list entries", list.entry.len());
    Ok(list.entry.into_iter().map(RawSiteEntry::from).collect())
}
