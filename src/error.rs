//! Error types for geox.

use thiserror::Error;

/// Error type for geox operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid rule-set file magic bytes
    #[error("invalid magic bytes: expected GEOXRSET header")]
    InvalidMagic,

    /// Unsupported rule-set format version
    #[error("unsupported format version: {0}")]
    UnsupportedVersion(u32),

    /// Downloaded asset does not match its published checksum
    #[error("{0} checksum mismatch")]
    ChecksumMismatch(String),

    /// Rule-set body does not match the checksum stored in its header
    #[error("rule-set checksum mismatch")]
    CorruptRuleSet,

    /// Rule-set file is truncated or has a malformed slice
    #[error("invalid rule-set: {0}")]
    InvalidRuleSet(String),

    /// Named asset (or its checksum sidecar) missing from a release
    #[error("{asset} not found in {release}")]
    AssetNotFound { asset: String, release: String },

    /// Repository identifier is not `owner/name`
    #[error("invalid repository: {0}")]
    InvalidRepository(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Domain dataset decoding error
    #[error("domain dataset decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    /// GeoIP dataset error
    #[error("GeoIP error: {0}")]
    GeoIp(#[from] maxminddb::MaxMindDBError),

    /// Malformed geosite database
    #[error("invalid geosite database: {0}")]
    InvalidGeosite(String),

    /// Invalid network prefix
    #[error("invalid network: {0}")]
    InvalidNetwork(String),

    /// Network trie construction error
    #[error("trie error: {0}")]
    Trie(String),

    /// A reconciliation step referenced a category that is not in the table
    #[error("category not found: {0}")]
    MissingCategory(String),

    /// FST construction error
    #[error("FST error: {0}")]
    Fst(#[from] fst::Error),

    /// Invalid regex rule
    #[error("invalid regex rule: {0}")]
    Regex(#[from] regex::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Download error
    #[error("download error: {0}")]
    Download(#[from] reqwest::Error),
}

/// Result type alias for geox operations.
pub type Result<T> = std::result::Result<T, Error>;
