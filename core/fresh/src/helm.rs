//! Latest chart versions from Helm HTTP repository indexes.
use anyhow::Context as AnyContext;
use anyhow::Result;
use serde_yaml::Value as Yaml;

use clustermap_context::Context;

use crate::registry::capped_body;
use crate::registry::send_with_cancel;
use crate::registry::RegistryClient;
use crate::semver::Version;

/// Maximum accepted size for a repository `index.yaml`.
pub const INDEX_BODY_LIMIT: usize = 10 * 1024 * 1024;

impl RegistryClient {
    /// Latest non pre-release version of a chart in an HTTP repository index.
    pub async fn latest_index_version(
        &self,
        context: &Context,
        repo_url: &str,
        chart: &str,
    ) -> Result<Option<String>> {
        let url = format!("{}/index.yaml", repo_url.trim_end_matches('/'));
        let request = self.http().get(&url);
        let response = send_with_cancel(context, request).await?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("chart repository '{}' responded with status {}", repo_url, status);
        }
        let body = capped_body(response, INDEX_BODY_LIMIT).await?;
        let index: Yaml = serde_yaml::from_slice(&body)
            .with_context(|| format!("malformed index.yaml from '{}'", repo_url))?;
        Ok(latest_entry_version(&index, chart))
    }
}

/// Pick the highest non pre-release version of a chart from a parsed index.
fn latest_entry_version(index: &Yaml, chart: &str) -> Option<String> {
    let entries = index.get("entries")?.get(chart)?.as_sequence()?;
    let mut best: Option<(Version, String)> = None;
    for entry in entries {
        let raw = entry.get("version").and_then(Yaml::as_str).unwrap_or("");
        let version = match Version::parse(raw) {
            Some(version) if !version.is_prerelease() => version,
            _ => continue,
        };
        let better = match &best {
            Some((current, _)) => version > *current,
            None => true,
        };
        if better {
            best = Some((version, raw.to_string()));
        }
    }
    best.map(|(_, raw)| raw)
}
