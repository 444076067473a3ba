//! Collection steps of the refresh pipeline.
use anyhow::Error;
use anyhow::Result;

use clustermap_context::Context;
use clustermap_context::ShutdownInterrupt;
use clustermap_fresh::ChartRef;
use clustermap_fresh::NodeVersions;
use clustermap_models::ImageRef;
use clustermap_models::Snapshot;
use clustermap_source_kube::ClusterSource;

use crate::FileSpec;

/// Result of the primary cluster collection step.
pub(crate) struct PrimaryCollection {
    pub snapshot: Snapshot,

    /// Listings attempted and failed; all-failed means the cluster is down.
    pub attempted: usize,
    pub failed: usize,
}

fn is_shutdown(error: &Error) -> bool {
    error.is::<ShutdownInterrupt>() || error.chain().any(|cause| cause.is::<ShutdownInterrupt>())
}

/// Collect the full record set from the primary cluster.
///
/// Individual listing failures degrade the snapshot (the section stays
/// empty); only shutdown aborts the collection.
pub(crate) async fn primary(context: &Context, source: &ClusterSource) -> Result<PrimaryCollection> {
    let mut snapshot = Snapshot {
        cluster: source.cluster().to_string(),
        ..Snapshot::default()
    };
    let mut attempted = 0usize;
    let mut failed = 0usize;

    macro_rules! list {
        ($field:ident, $method:ident) => {
            attempted += 1;
            match source.$method(context).await {
                Ok(records) => snapshot.$field = records,
                Err(error) if is_shutdown(&error) => return Err(error),
                Err(error) => {
                    slog::warn!(
                        context.logger, "Cluster listing failed, section omitted from snapshot";
                        "cluster" => source.cluster(),
                        "section" => stringify!($field),
                        "error" => %error,
                    );
                    failed += 1;
                }
            }
        };
    }

    list!(nodes, list_nodes);
    list!(namespaces, list_namespaces);
    list!(kustomizations, list_kustomizations);
    list!(helm_releases, list_helm_releases);
    list!(helm_repositories, list_helm_repositories);
    list!(pod_images, list_pod_images);
    list!(gateways, list_gateways);
    list!(routes, list_routes);
    list!(security_policies, list_security_policies);
    list!(client_traffic_policies, list_client_traffic_policies);
    list!(service_entries, list_service_entries);
    list!(east_west_gateways, list_east_west_gateways);
    list!(load_balancers, list_load_balancers);

    Ok(PrimaryCollection {
        snapshot,
        attempted,
        failed,
    })
}

/// Append the reduced record subset of every secondary cluster.
///
/// Appended rows are sorted by `(cluster, namespace, name)` so snapshots of
/// equivalent inputs are byte-identical downstream.
pub(crate) async fn secondaries(
    context: &Context,
    sources: &[ClusterSource],
    snapshot: &mut Snapshot,
) -> Result<()> {
    let mut namespaces = Vec::new();
    let mut policies = Vec::new();
    let mut kustomizations = Vec::new();
    for source in sources {
        match source.security_data(context).await {
            Ok(data) => {
                namespaces.extend(data.namespaces);
                policies.extend(data.security_policies);
                kustomizations.extend(data.kustomizations);
            }
            Err(error) if is_shutdown(&error) => return Err(error),
            Err(error) => {
                slog::warn!(
                    context.logger, "Secondary cluster unavailable, omitted from snapshot";
                    "cluster" => source.cluster(),
                    "error" => %error,
                );
            }
        }
    }

    namespaces.sort_by(|a, b| (&a.cluster, &a.name).cmp(&(&b.cluster, &b.name)));
    policies.sort_by(|a, b| {
        (&a.cluster, &a.namespace, &a.name).cmp(&(&b.cluster, &b.namespace, &b.name))
    });
    kustomizations.sort_by(|a, b| {
        (&a.cluster, &a.namespace, &a.name).cmp(&(&b.cluster, &b.namespace, &b.name))
    });
    snapshot.namespaces.extend(namespaces);
    snapshot.security_policies.extend(policies);
    snapshot.kustomizations.extend(kustomizations);
    Ok(())
}

/// Read every configured infrastructure file into the snapshot.
pub(crate) async fn files(
    context: &Context,
    files: &[FileSpec],
    snapshot: &mut Snapshot,
) -> Result<()> {
    for spec in files {
        match clustermap_source_file::read(context, &spec.name, spec.kind, &spec.path).await {
            Ok(Some(source)) => snapshot.infra_sources.push(source),
            Ok(None) => {
                slog::debug!(
                    context.logger, "Infrastructure source file missing or empty, skipped";
                    "source" => &spec.name,
                    "path" => &spec.path,
                );
            }
            Err(error) if is_shutdown(&error) => return Err(error),
            Err(error) => {
                slog::warn!(
                    context.logger, "Infrastructure source unreadable, skipped";
                    "source" => &spec.name,
                    "path" => &spec.path,
                    "error" => %error,
                );
            }
        }
    }
    Ok(())
}

/// Derive the freshness checker inputs from a collected snapshot.
pub(crate) fn freshness_inputs(snapshot: &Snapshot) -> (Vec<ChartRef>, Vec<ImageRef>, NodeVersions) {
    let charts = snapshot
        .helm_releases
        .iter()
        .filter_map(|release| {
            let repository = snapshot.helm_repositories.iter().find(|repository| {
                repository.cluster == release.cluster
                    && repository.namespace == release.source_namespace
                    && repository.name == release.source_name
            })?;
            Some(ChartRef {
                repo_url: repository.url.clone(),
                repo_kind: repository.kind,
                chart: release.chart.clone(),
            })
        })
        .collect();

    let images = snapshot
        .pod_images
        .iter()
        .map(|pod_image| pod_image.image.clone())
        .collect();

    let nodes = NodeVersions {
        os_images: snapshot
            .nodes
            .iter()
            .map(|node| node.os_image.clone())
            .collect(),
        kubelet_versions: snapshot
            .nodes
            .iter()
            .map(|node| node.kubelet_version.clone())
            .collect(),
    };
    (charts, images, nodes)
}
