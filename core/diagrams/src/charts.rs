//! Helm release table with deployed and latest chart versions.
use serde::Serialize;

use clustermap_fresh::ChartsCache;
use clustermap_fresh::Version;
use clustermap_fresh::UNKNOWN;
use clustermap_models::DiagramArtifact;
use clustermap_models::DiagramKind;
use clustermap_models::Snapshot;

#[derive(Debug, Serialize)]
struct ChartRow {
    cluster: String,
    namespace: String,
    name: String,
    chart: String,
    version: String,
    app_version: String,
    repository: String,
    latest: String,
    outdated: bool,
}

/// Render the Helm releases table.
pub fn generate(snapshot: &Snapshot, cache: &ChartsCache) -> DiagramArtifact {
    if snapshot.helm_releases.is_empty() {
        return crate::placeholder(
            "charts",
            "Helm Releases",
            "No Helm releases discovered yet.",
        );
    }

    let mut rows: Vec<ChartRow> = snapshot
        .helm_releases
        .iter()
        .map(|release| {
            // Resolve the release's chart source within the same cluster.
            let repository = snapshot
                .helm_repositories
                .iter()
                .find(|repository| {
                    repository.cluster == release.cluster
                        && repository.namespace == release.source_namespace
                        && repository.name == release.source_name
                })
                .map(|repository| repository.url.clone())
                .unwrap_or_default();
            let latest = if repository.is_empty() {
                UNKNOWN.to_string()
            } else {
                cache.latest(&repository, &release.chart)
            };
            let outdated = is_outdated(&release.version, &latest);
            ChartRow {
                cluster: release.cluster.clone(),
                namespace: release.namespace.clone(),
                name: release.name.clone(),
                chart: release.chart.clone(),
                version: release.version.clone(),
                app_version: release.app_version.clone(),
                repository,
                latest,
                outdated,
            }
        })
        .collect();
    rows.sort_by(|a, b| {
        (&a.cluster, &a.namespace, &a.name).cmp(&(&b.cluster, &b.namespace, &b.name))
    });

    let content = serde_json::to_string(&rows).expect("chart rows must serialise");
    DiagramArtifact::new("charts", "Helm Releases", DiagramKind::Table, content)
}

/// Whether the latest known version is newer than the deployed one.
fn is_outdated(deployed: &str, latest: &str) -> bool {
    if latest == UNKNOWN {
        return false;
    }
    match (Version::parse(deployed), Version::parse(latest)) {
        (Some(deployed), Some(latest)) => latest > deployed,
        _ => deployed != latest,
    }
}

#[cfg(test)]
mod tests {
    use clustermap_fresh::ChartsCache;
    use clustermap_fresh::RegistryClient;
    use clustermap_models::DiagramKind;
    use clustermap_models::HelmRelease;
    use clustermap_models::HelmRepository;
    use clustermap_models::RepositoryKind;
    use clustermap_models::Snapshot;

    use super::generate;
    use super::is_outdated;

    fn cache() -> ChartsCache {
        ChartsCache::new(
            RegistryClient::new().unwrap(),
            String::new(),
            std::time::Duration::from_secs(300),
        )
    }

    #[test]
    fn outdated_comparison() {
        assert!(is_outdated("5.1.0", "5.2.0"));
        assert!(!is_outdated("5.2.0", "5.2.0"));
        assert!(!is_outdated("5.2.0", "5.1.0"));
        assert!(!is_outdated("5.2.0", "-"));
        // Unparseable versions fall back to inequality.
        assert!(is_outdated("2024-05", "2024-06"));
    }

    #[test]
    fn rows_carry_sentinels_without_freshness_data() {
        let mut snapshot = Snapshot::default();
        snapshot.helm_releases.push(HelmRelease {
            cluster: "Homelab".into(),
            namespace: "storage".into(),
            name: "minio".into(),
            chart: "minio".into(),
            version: "5.2.0".into(),
            app_version: "RELEASE.2024".into(),
            source_name: "minio-charts".into(),
            source_namespace: "flux-system".into(),
        });
        snapshot.helm_repositories.push(HelmRepository {
            cluster: "Homelab".into(),
            namespace: "flux-system".into(),
            name: "minio-charts".into(),
            url: "https://charts.min.io".into(),
            kind: RepositoryKind::Default,
        });

        let artifact = generate(&snapshot, &cache());
        assert_eq!(artifact.kind, DiagramKind::Table);
        let rows: serde_json::Value = serde_json::from_str(&artifact.content).unwrap();
        assert_eq!(rows[0]["repository"], "https://charts.min.io");
        assert_eq!(rows[0]["latest"], "-");
        assert_eq!(rows[0]["outdated"], false);
    }

    #[test]
    fn missing_repository_is_sentinel() {
        let mut snapshot = Snapshot::default();
        snapshot.helm_releases.push(HelmRelease {
            cluster: "Homelab".into(),
            namespace: "storage".into(),
            name: "orphan".into(),
            chart: "orphan".into(),
            version: "1.0.0".into(),
            ..HelmRelease::default()
        });
        let artifact = generate(&snapshot, &cache());
        let rows: serde_json::Value = serde_json::from_str(&artifact.content).unwrap();
        assert_eq!(rows[0]["repository"], "");
        assert_eq!(rows[0]["latest"], "-");
    }

    #[test]
    fn empty_releases_render_placeholder() {
        let artifact = generate(&Snapshot::default(), &cache());
        assert_eq!(artifact.kind, DiagramKind::Markdown);
    }
}
