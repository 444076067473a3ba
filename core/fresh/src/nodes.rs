//! Background checked cache of latest OS and kubelet versions.
use std::collections::BTreeSet;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::RwLock;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;

use clustermap_context::Context;

use crate::gate::CheckGate;
use crate::github::GithubClient;
use crate::semver::Version;
use crate::variant::UNKNOWN;

/// Minimum time between completed node checks.
const CHECK_HOLD: Duration = Duration::from_secs(15 * 60);

/// Node OS distributions with a release feed the checker understands.
const DISTRO_REPOS: &[(&str, &str)] = &[
    ("talos", "siderolabs/talos"),
    ("flatcar", "flatcar/scripts"),
];

/// Matches the version substring inside a node `osImage` string.
static OS_VERSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"v?\d+\.\d+(?:\.\d+)?").expect("OS_VERSION regex must compile")
});

/// Version inputs gathered from the snapshot's nodes.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct NodeVersions {
    /// Raw `osImage` strings, one per node.
    pub os_images: Vec<String>,

    /// Raw kubelet versions, one per node (e.g. `v1.30.1`).
    pub kubelet_versions: Vec<String>,
}

/// Background checked cache of latest OS versions per distribution and
/// latest kubelet patch per `major.minor` line.
#[derive(Clone)]
pub struct NodesCache {
    inner: Arc<NodesInner>,
}

struct NodesInner {
    client: GithubClient,
    gate: CheckGate,
    kubelet: RwLock<HashMap<String, String>>,
    os: RwLock<HashMap<String, String>>,
}

impl NodesCache {
    pub fn new(client: GithubClient) -> NodesCache {
        NodesCache {
            inner: Arc::new(NodesInner {
                client,
                gate: CheckGate::new(),
                kubelet: RwLock::new(HashMap::new()),
                os: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Latest known OS release for the distribution of an `osImage`, `-` when unresolved.
    pub fn latest_os(&self, os_image: &str) -> String {
        let distro = match distro_of(os_image) {
            Some((distro, _)) => distro,
            None => return UNKNOWN.to_string(),
        };
        self.inner
            .os
            .read()
            .expect("NodesCache os lock poisoned")
            .get(distro)
            .cloned()
            .unwrap_or_else(|| UNKNOWN.to_string())
    }

    /// Latest known kubelet patch for a deployed kubelet's minor line.
    pub fn latest_kubelet(&self, kubelet_version: &str) -> String {
        let minor = match kubelet_minor(kubelet_version) {
            Some(minor) => minor,
            None => return UNKNOWN.to_string(),
        };
        self.inner
            .kubelet
            .read()
            .expect("NodesCache kubelet lock poisoned")
            .get(&minor)
            .cloned()
            .unwrap_or_else(|| UNKNOWN.to_string())
    }

    /// Resolve latest OS and kubelet versions for the given node inputs.
    ///
    /// Single-flight and held for fifteen minutes after each completion.
    pub async fn check(&self, context: &Context, inputs: NodeVersions) {
        if !self.inner.gate.begin(CHECK_HOLD) {
            slog::debug!(context.logger, "Node freshness check skipped by gate");
            return;
        }

        let distros: BTreeSet<(&str, &str)> = inputs
            .os_images
            .iter()
            .filter_map(|os_image| distro_of(os_image))
            .collect();
        let minors: BTreeSet<String> = inputs
            .kubelet_versions
            .iter()
            .filter_map(|version| kubelet_minor(version))
            .collect();

        {
            let mut os = self.inner.os.write().expect("NodesCache os lock poisoned");
            os.clear();
            for (distro, _) in &distros {
                os.insert(distro.to_string(), UNKNOWN.into());
            }
            let mut kubelet = self
                .inner
                .kubelet
                .write()
                .expect("NodesCache kubelet lock poisoned");
            kubelet.clear();
            for minor in &minors {
                kubelet.insert(minor.clone(), UNKNOWN.into());
            }
        }

        for (distro, repo) in &distros {
            if context.check_shutdown().is_err() {
                break;
            }
            match self.inner.client.latest_release(context, repo).await {
                Ok(Some(tag)) => {
                    self.inner
                        .os
                        .write()
                        .expect("NodesCache os lock poisoned")
                        .insert(distro.to_string(), tag);
                }
                Ok(None) => (),
                Err(error) => {
                    slog::warn!(
                        context.logger, "Unable to resolve latest OS release";
                        "distro" => *distro,
                        "error" => %error,
                    );
                }
            }
        }

        if !minors.is_empty() && context.check_shutdown().is_ok() {
            match self
                .inner
                .client
                .release_tags(context, "kubernetes/kubernetes")
                .await
            {
                Ok(tags) => {
                    for minor in &minors {
                        if let Some(latest) = latest_patch(&tags, minor) {
                            self.inner
                                .kubelet
                                .write()
                                .expect("NodesCache kubelet lock poisoned")
                                .insert(minor.clone(), latest);
                        }
                    }
                }
                Err(error) => {
                    slog::warn!(
                        context.logger, "Unable to resolve latest kubelet releases";
                        "error" => %error,
                    );
                }
            }
        }

        self.inner.gate.finish();
        slog::debug!(context.logger, "Node freshness check completed");
    }
}

/// The release feed for the distribution named in an `osImage` string.
fn distro_of(os_image: &str) -> Option<(&'static str, &'static str)> {
    let os_image = os_image.to_lowercase();
    DISTRO_REPOS
        .iter()
        .copied()
        .find(|(distro, _)| os_image.contains(distro))
}

/// The version substring of an `osImage` string (e.g. `v1.7.4`).
pub fn os_version(os_image: &str) -> Option<String> {
    OS_VERSION
        .find(os_image)
        .map(|found| found.as_str().to_string())
}

/// The `major.minor` line of a kubelet version string.
pub fn kubelet_minor(version: &str) -> Option<String> {
    let version = Version::parse(version)?;
    Some(format!("{}.{}", version.major, version.minor))
}

/// Whether a deployed OS version trails the latest release.
///
/// This deliberately compares the strings left after stripping a leading `v`,
/// not parsed versions, matching the long-standing observed behaviour. It
/// misclassifies pairs like `1.10` vs `1.9`; comparing as semver is a known
/// future change.
pub fn os_outdated(deployed: &str, latest: &str) -> bool {
    if latest == UNKNOWN || deployed.is_empty() {
        return false;
    }
    let deployed = deployed.strip_prefix('v').unwrap_or(deployed);
    let latest = latest.strip_prefix('v').unwrap_or(latest);
    deployed != latest
}

/// The highest release tag on a `major.minor` line.
fn latest_patch(tags: &[String], minor: &str) -> Option<String> {
    let prefix = format!("v{}.", minor);
    let mut best: Option<(Version, String)> = None;
    for tag in tags {
        if !tag.starts_with(&prefix) {
            continue;
        }
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
