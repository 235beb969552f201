//! Release fetching: latest-release lookup, asset download and checksum
//! verification, plus local dataset input.

mod github;

pub use github::{split_repository, GitHubClient, ACCESS_TOKEN_ENV, GITHUB_API};

use std::fs::File;
use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;
use memmap2::Mmap;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Suffix of the checksum sidecar published next to an asset.
pub const CHECKSUM_SUFFIX: &str = ".sha256sum";

/// Length of a hex SHA-256 digest.
const SHA256_HEX_LEN: usize = 64;

/// A published release.
#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    #[serde(default)]
    pub name: Option<String>,
    pub tag_name: String,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

impl Release {
    /// Display name, falling back to the tag.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.tag_name)
    }

    pub fn asset(&self, name: &str) -> Option<&ReleaseAsset> {
        self.assets.iter().find(|asset| asset.name == name)
    }
}

/// A downloadable file of a release.
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    pub browser_download_url: String,
}

/// Where releases come from.
pub trait ReleaseSource {
    /// Latest published release of an `owner/name` repository.
    fn latest_release(&self, repository: &str) -> Result<Release>;

    /// Raw bytes of an asset.
    fn download(&self, asset: &ReleaseAsset) -> Result<Vec<u8>>;
}

/// Download a named file of a release.
///
/// With `verify` set the `<name>.sha256sum` sidecar must exist too and its
/// first 64 characters must equal the hex SHA-256 of the file.
pub fn fetch_release_file<S: ReleaseSource + ?Sized>(
    source: &S,
    release: &Release,
    name: &str,
    verify: bool,
) -> Result<Vec<u8>> {
    let not_found = |asset: &str| Error::AssetNotFound {
        asset: asset.to_string(),
        release: release.display_name().to_string(),
    };

    let asset = release.asset(name).ok_or_else(|| not_found(name))?;
    if !verify {
        return source.download(asset);
    }

    let checksum_name = format!("{}{}", name, CHECKSUM_SUFFIX);
    let checksum_asset = release
        .asset(&checksum_name)
        .ok_or_else(|| not_found(&checksum_name))?;

    let data = source.download(asset)?;
    let sidecar = source.download(checksum_asset)?;
    verify_checksum(name, &data, &sidecar)?;
    log::info!("{}: checksum verified ({} bytes)", name, data.len());
    Ok(data)
}

/// Compare data against a `<64-hex-sha256><anything>` sidecar.
pub fn verify_checksum(name: &str, data: &[u8], sidecar: &[u8]) -> Result<()> {
    let expected = sidecar
        .get(..SHA256_HEX_LEN)
        .ok_or_else(|| Error::ChecksumMismatch(name.to_string()))?;
    let actual = format!("{:x}", Sha256::digest(data));
    if actual.as_bytes() != expected {
        return Err(Error::ChecksumMismatch(name.to_string()));
    }
    Ok(())
}

/// Dataset bytes, either owned or memory mapped.
pub enum InputData {
    Owned(Vec<u8>),
    Mapped(Mmap),
}

impl AsRef<[u8]> for InputData {
    fn as_ref(&self) -> &[u8] {
        match self {
            InputData::Owned(data) => data,
            InputData::Mapped(mmap) => mmap,
        }
    }
}

impl InputData {
    /// Gunzip the data when the name ends in `.gz`.
    pub fn decompress_if_gzip(self, name: &str) -> Result<Self> {
        if !name.ends_with(".gz") {
            return Ok(self);
        }
        let mut decompressed = Vec::new();
        GzDecoder::new(self.as_ref()).read_to_end(&mut decompressed)?;
        log::debug!("{}: {} bytes after gunzip", name, decompressed.len());
        Ok(InputData::Owned(decompressed))
    }
}

/// Memory-map a local dataset file.
pub fn read_local(path: &Path) -> Result<InputData> {
    let file = File::open(path)?;
    // SAFETY: the map is read-only and the generator does not expect the
    // input to change while it runs.
    let mmap = unsafe { Mmap::map(&file)? };
    log::info!("mapped {} ({} bytes)", path.display(), mmap.len());
    Ok(InputData::Mapped(mmap))
}
