//! Latest release lookups against the GitHub Releases API.
use std::time::Duration;

use anyhow::Context as AnyContext;
use anyhow::Result;
use reqwest::Client;
use reqwest::StatusCode;
use serde::Deserialize;

use clustermap_context::Context;

use crate::registry::send_with_cancel;

/// String set as the user agent in HTTP requests (GitHub rejects anonymous ones).
static CLIENT_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct Release {
    tag_name: String,
    #[serde(default)]
    prerelease: bool,
}

/// Client for the GitHub Releases API.
pub struct GithubClient {
    base: String,
    http: Client,
}

impl GithubClient {
    /// Initialise a client against the public GitHub API.
    pub fn new() -> Result<GithubClient> {
        GithubClient::with_base("https://api.github.com")
    }

    /// Initialise a client against a custom API base URL.
    pub fn with_base<S>(base: S) -> Result<GithubClient>
    where
        S: Into<String>,
    {
        let http = Client::builder()
            .user_agent(CLIENT_USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .context("unable to initialise GitHub HTTP client")?;
        Ok(GithubClient {
            base: base.into(),
            http,
        })
    }

    /// Tag of the latest published release of a repository.
    pub async fn latest_release(&self, context: &Context, repo: &str) -> Result<Option<String>> {
        let url = format!("{}/repos/{}/releases/latest", self.base, repo);
        let request = self.http.get(&url);
        let response = send_with_cancel(context, request).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("GitHub API responded with status {} for '{}'", status, repo);
        }
        let release: Release = response.json().await?;
        Ok(Some(release.tag_name))
    }

    /// Tags of the most recent releases of a repository, skipping pre-releases.
    pub async fn release_tags(&self, context: &Context, repo: &str) -> Result<Vec<String>> {
        let url = format!("{}/repos/{}/releases?per_page=100", self.base, repo);
        let request = self.http.get(&url);
        let response = send_with_cancel(context, request).await?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("GitHub API responded with status {} for '{}'", status, repo);
        }
        let releases: Vec<Release> = response.json().await?;
        let tags = releases
            .into_iter()
            .filter(|release| !release.prerelease)
            .map(|release| release.tag_name)
            .collect();
        Ok(tags)
    }
}
