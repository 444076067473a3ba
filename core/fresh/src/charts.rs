//! Background checked cache of latest chart versions.
use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::RwLock;
use std::time::Duration;

use clustermap_context::Context;
use clustermap_models::RepositoryKind;

use crate::gate::CheckGate;
use crate::registry::is_rate_limited;
use crate::registry::RegistryClient;
use crate::semver::Version;
use crate::variant::UNKNOWN;

/// Delay between per-repository queries, to stay below upstream rate limits.
const QUERY_PACING: Duration = Duration::from_secs(1);

/// One deployed chart to resolve the latest version for.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ChartRef {
    pub repo_url: String,
    pub repo_kind: RepositoryKind,
    pub chart: String,
}

/// Background checked cache mapping `repoURL/chart` to the latest version.
///
/// One writer (the checker) and many readers (the diagram generators): entries
/// become visible per repository as the check progresses. A lookup mid-check
/// sees resolved entries for completed repositories and the `-` sentinel for
/// ones still in progress, never fragments of a previous run.
#[derive(Clone)]
pub struct ChartsCache {
    inner: Arc<ChartsInner>,
}

struct ChartsInner {
    client: RegistryClient,
    entries: RwLock<HashMap<String, String>>,
    gate: CheckGate,

    /// Hold between completed checks; the refresh interval of the orchestrator.
    hold: Duration,

    /// Pull-through proxy host chart URLs are rewritten around, if configured.
    proxy: String,
}

impl ChartsCache {
    pub fn new(client: RegistryClient, proxy: String, hold: Duration) -> ChartsCache {
        ChartsCache {
            inner: Arc::new(ChartsInner {
                client,
                entries: RwLock::new(HashMap::new()),
                gate: CheckGate::new(),
                hold,
                proxy,
            }),
        }
    }

    /// Cache key for a deployed chart.
    pub fn key(repo_url: &str, chart: &str) -> String {
        format!("{}/{}", repo_url.trim_end_matches('/'), chart)
    }

    /// Latest known version for a chart, `-` when unresolved.
    pub fn latest(&self, repo_url: &str, chart: &str) -> String {
        let key = ChartsCache::key(repo_url, chart);
        self.inner
            .entries
            .read()
            .expect("ChartsCache entries lock poisoned")
            .get(&key)
            .cloned()
            .unwrap_or_else(|| UNKNOWN.to_string())
    }

    /// Resolve the latest version of every deployed chart.
    ///
    /// Single-flight and time gated: overlapping calls and calls within the
    /// hold window return immediately. Failures only log; the cache keeps the
    /// sentinel for charts that could not be resolved.
    pub async fn check(&self, context: &Context, mut charts: Vec<ChartRef>) {
        if !self.inner.gate.begin(self.inner.hold) {
            slog::debug!(context.logger, "Chart freshness check skipped by gate");
            return;
        }

        charts.sort_by(|a, b| {
            ChartsCache::key(&a.repo_url, &a.chart).cmp(&ChartsCache::key(&b.repo_url, &b.chart))
        });
        charts.dedup();

        // Start the cycle from sentinels so readers never see entries of a
        // previous run mixed with this one.
        {
            let mut entries = self
                .inner
                .entries
                .write()
                .expect("ChartsCache entries lock poisoned");
            entries.clear();
            for chart in &charts {
                entries.insert(ChartsCache::key(&chart.repo_url, &chart.chart), UNKNOWN.into());
            }
        }

        let mut skip_hosts: HashSet<String> = HashSet::new();
        let mut first = true;
        for chart in &charts {
            if context.check_shutdown().is_err() {
                break;
            }
            if !first {
                tokio::select! {
                    biased;
                    _ = context.cancel.cancelled() => break,
                    _ = tokio::time::sleep(QUERY_PACING) => (),
                }
            }
            first = false;

            let latest = match chart.repo_kind {
                RepositoryKind::Oci => self.check_oci(context, chart, &mut skip_hosts).await,
                RepositoryKind::Default => self.check_index(context, chart).await,
            };
            if let Some(latest) = latest {
                let key = ChartsCache::key(&chart.repo_url, &chart.chart);
                self.inner
                    .entries
                    .write()
                    .expect("ChartsCache entries lock poisoned")
                    .insert(key, latest);
            }
        }

        self.inner.gate.finish();
        slog::debug!(
            context.logger, "Chart freshness check completed";
            "charts" => charts.len(),
        );
    }

    /// Latest version of a chart stored in an OCI registry.
    async fn check_oci(
        &self,
        context: &Context,
        chart: &ChartRef,
        skip_hosts: &mut HashSet<String>,
    ) -> Option<String> {
        let (host, path) = split_oci_url(&chart.repo_url)?;
        let (host, path) = rewrite_for_proxy(&self.inner.proxy, host, path);
        if skip_hosts.contains(&host) {
            return None;
        }
        let repository = if path.is_empty() {
            chart.chart.clone()
        } else {
            format!("{}/{}", path, chart.chart)
        };

        let tags = match self.inner.client.list_tags(context, &host, &repository).await {
            Ok(tags) => tags,
            Err(error) if is_rate_limited(&error) => {
                slog::warn!(
                    context.logger, "Registry rate limited chart check, skipping host this cycle";
                    "host" => &host,
                );
                skip_hosts.insert(host);
                return None;
            }
            Err(error) => {
                slog::warn!(
                    context.logger, "Unable to list chart versions";
                    "chart" => &chart.chart,
                    "host" => &host,
                    "error" => %error,
                );
                return None;
            }
        };
        highest_release(&tags)
    }

    /// Latest version of a chart served from an HTTP repository index.
    async fn check_index(&self, context: &Context, chart: &ChartRef) -> Option<String> {
        match self
            .inner
            .client
            .latest_index_version(context, &chart.repo_url, &chart.chart)
            .await
        {
            Ok(latest) => latest,
            Err(error) => {
                slog::warn!(
                    context.logger, "Unable to read chart repository index";
                    "chart" => &chart.chart,
                    "repository" => &chart.repo_url,
                    "error" => %error,
                );
                None
            }
        }
    }
}

/// Split an `oci://host/path` URL into host and repository path.
fn split_oci_url(url: &str) -> Option<(String, String)> {
    let rest = url.strip_prefix("oci://")?;
    match rest.split_once('/') {
        Some((host, path)) => Some((host.to_string(), path.trim_end_matches('/').to_string())),
        None => Some((rest.to_string(), String::new())),
    }
}

/// Rewrite a pull-through proxy reference to target the upstream registry.
///
/// Applies when the URL host matches the configured proxy and the first path
/// segment contains a dot (so it reads as the upstream host).
fn rewrite_for_proxy(proxy: &str, host: String, path: String) -> (String, String) {
    if proxy.is_empty() || host != proxy {
        return (host, path);
    }
    match path.split_once('/') {
        Some((first, rest)) if first.contains('.') => (first.to_string(), rest.to_string()),
        _ => (host, path),
    }
}

/// The highest non pre-release semver tag, as charts version their OCI tags.
fn highest_release(tags: &[String]) -> Option<String> {
    let mut best: Option<(Version, String)> = None;
    for tag in tags {
        let version = match Version::parse(tag) {
            Some(version) if !version.is_prerelease() => version,
            _ => continue,
        };
        let better = match &best {
            Some((current, _)) => version > *current,
            None => true,
        };
        if better {
            best = Some((version, tag.clone()));
        }
    }
    best.map(|(_, tag)| tag)
}
