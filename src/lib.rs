//! geox - geosite and geoip rule database generator.
//!
//! This crate re-derives routing classification databases from upstream
//! datasets: a v2ray `GeoSiteList` domain list and a MaxMind-format GeoIP
//! database.
//!
//! # Features
//!
//! - **Domain pipeline**: classify raw domain records into typed match
//!   rules, index them by category and attribute tag, fold exclusion pairs
//!   and aggregate tagged variants into a synthetic category
//! - **IP pipeline**: bucket every canonical network by its resolved
//!   country or continent code and build MMDB lookup databases
//! - **Artifacts**: geosite database, MMDB databases, sorted name listings
//!   and per-category rule-set files with a verifying reader
//! - **Fetching**: latest GitHub release lookup with SHA-256 sidecar checks
//!
//! # Quick Start
//!
//! ```ignore
//! use geox::site::{build_table, decode_site_list, AggregateRule};
//! use geox::export::{name_listing, write_geosite};
//!
//! let entries = decode_site_list(&std::fs::read("dlc.dat")?)?;
//! let table = build_table(&entries, Some(&AggregateRule::default()))?;
//!
//! std::fs::write("geosite.db", write_geosite(&table))?;
//! std::fs::write("geosite.txt", name_listing(&table.names()))?;
//! ```
//!
//! # Category Names
//!
//! - **base**: lowercase dataset code, e.g. `google`
//! - **tagged**: `base@tag`, the base records carrying attribute `tag`
//!
//! A tagged category named after the base's last `-` segment is redundant
//! and dropped; one named after its negation (`x-cn@!cn`, `x-!cn@cn`) is
//! subtracted from the base and dropped.

mod error;

pub mod binary;
pub mod config;
pub mod export;
pub mod fetch;
pub mod ip;
pub mod pipeline;
pub mod rule_type;
pub mod site;

pub use config::{GenerateConfig, GeoipJob, GeoipSubset, GeositeJob};
pub use error::{Error, Result};
pub use rule_type::{MatchKind, MatchRule};
