//! GitHub release source.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION};

use super::{Release, ReleaseAsset, ReleaseSource};
use crate::error::{Error, Result};

/// Default GitHub API endpoint.
pub const GITHUB_API: &str = "https://api.github.com";

/// Environment variable holding an optional GitHub token.
pub const ACCESS_TOKEN_ENV: &str = "ACCESS_TOKEN";

const USER_AGENT: &str = concat!("geox/", env!("CARGO_PKG_VERSION"));

/// Default HTTP request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Blocking GitHub client for latest-release lookups and asset downloads.
pub struct GitHubClient {
    client: Client,
    api_base: String,
    token: Option<String>,
}

impl GitHubClient {
    /// Create a client, taking the token from `ACCESS_TOKEN` when set.
    pub fn new() -> Result<Self> {
        let token = std::env::var(ACCESS_TOKEN_ENV)
            .ok()
            .filter(|token| !token.is_empty());
        Self::with_token(token)
    }

    pub fn with_token(token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(DEFAULT_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            api_base: GITHUB_API.to_string(),
            token,
        })
    }

    /// Use another API endpoint, e.g. a GitHub Enterprise server.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn get(&self, url: &str) -> reqwest::blocking::RequestBuilder {
        let request = self.client.get(url);
        match &self.token {
            Some(token) => request.header(AUTHORIZATION, format!("Bearer {}", token)),
            None => request,
        }
    }
}

impl ReleaseSource for GitHubClient {
    fn latest_release(&self, repository: &str) -> Result<Release> {
        let (owner, name) = split_repository(repository)?;
        let url = format!("{}/repos/{}/{}/releases/latest", self.api_base, owner, name);
        log::info!("fetching latest release of {}", repository);

        let body = self
            .get(&url)
            .header(ACCEPT, "application/vnd.github+json")
            .send()?
            .error_for_status()?
            .bytes()?;
        let release: Release = serde_json::from_slice(&body)?;
        log::debug!(
            "{}: release {} with {} assets",
            repository,
            release.tag_name,
            release.assets.len()
        );
        Ok(release)
    }

    fn download(&self, asset: &ReleaseAsset) -> Result<Vec<u8>> {
        log::info!("downloading {}", asset.browser_download_url);
        let bytes = self
            .get(&asset.browser_download_url)
            .send()?
            .error_for_status()?
            .bytes()?;
        log::debug!("{}: {} bytes", asset.name, bytes.len());
        Ok(bytes.to_vec())
    }
}

/// Split `owner/name` into its two parts.
pub fn split_repository(repository: &str) -> Result<(&str, &str)> {
    match repository.split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
            Ok((owner, name))
        }
        _ => Err(Error::InvalidRepository(repository.to_string())),
    }
}
