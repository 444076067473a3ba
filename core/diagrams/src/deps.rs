//! The deployment dependency graph synthesizer.
//!
//! Takes the declarative deployment graph (workload deployments and their
//! `dependsOn` lists) and produces a reduced, layer-classified DAG augmented
//! with cross-cluster edges inferred from service mesh entries. The output is
//! a flow artifact carrying a JSON payload of nodes and edges for the
//! front-end graph renderer.
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::HashSet;

use serde::Serialize;

use clustermap_models::DiagramArtifact;
use clustermap_models::DiagramKind;
use clustermap_models::Kustomization;
use clustermap_models::ServiceEntry;
use clustermap_models::Snapshot;

/// Istio location marking an endpoint outside the local mesh.
const MESH_EXTERNAL: &str = "MESH_EXTERNAL";

/// Suffix conventionally appended to mesh network labels.
const NETWORK_SUFFIX: &str = "-network";

#[derive(Debug, Serialize)]
struct FlowNode {
    id: String,
    label: String,
    cluster: String,
    layer: String,
}

#[derive(Debug, Serialize)]
struct FlowEdge {
    id: String,
    source: String,
    target: String,
    #[serde(rename = "crossCluster", skip_serializing_if = "Option::is_none")]
    cross_cluster: Option<bool>,
}

#[derive(Debug, Serialize)]
struct FlowPayload {
    nodes: Vec<FlowNode>,
    edges: Vec<FlowEdge>,
}

/// Render the deployment dependency flow artifact.
pub fn generate(snapshot: &Snapshot) -> DiagramArtifact {
    if snapshot.kustomizations.is_empty() {
        return crate::placeholder(
            "dependencies",
            "Deployment Dependencies",
            "No workload deployments discovered yet.",
        );
    }

    // Node identity is `{cluster}/{name}`.
    let mut nodes: Vec<FlowNode> = snapshot
        .kustomizations
        .iter()
        .map(|kustomization| FlowNode {
            id: node_id(&kustomization.cluster, &kustomization.name),
            label: kustomization.name.clone(),
            cluster: kustomization.cluster.clone(),
            layer: layer_of(&kustomization.path),
        })
        .collect();
    nodes.sort_by(|a, b| a.id.cmp(&b.id));
    let known: HashSet<&str> = nodes.iter().map(|node| node.id.as_str()).collect();

    // Direct edges point from dependency to dependent. References to names
    // that do not exist in the same cluster are dropped silently.
    let mut direct: BTreeSet<(String, String)> = BTreeSet::new();
    for kustomization in &snapshot.kustomizations {
        let target = node_id(&kustomization.cluster, &kustomization.name);
        for dependency in &kustomization.depends_on {
            let source = node_id(&kustomization.cluster, dependency);
            if !known.contains(source.as_str()) || source == target {
                continue;
            }
            direct.insert((source, target.clone()));
        }
    }
    let reduced = transitive_reduction(&direct);

    let cross = cross_cluster_edges(
        &snapshot.kustomizations,
        &snapshot.service_entries,
        &snapshot.cluster_names(),
    );

    let mut edges: Vec<FlowEdge> = reduced
        .into_iter()
        .map(|(source, target)| FlowEdge {
            id: format!("{}->{}", source, target),
            source,
            target,
            cross_cluster: None,
        })
        .chain(cross.into_iter().map(|(source, target)| FlowEdge {
            id: format!("{}->{}", source, target),
            source,
            target,
            cross_cluster: Some(true),
        }))
        .collect();
    edges.sort_by(|a, b| (&a.source, &a.target).cmp(&(&b.source, &b.target)));

    let payload = FlowPayload { nodes, edges };
    let content = serde_json::to_string(&payload).expect("flow payload must serialise");
    DiagramArtifact::new(
        "dependencies",
        "Deployment Dependencies",
        DiagramKind::Flow,
        content,
    )
}

fn node_id(cluster: &str, name: &str) -> String {
    format!("{}/{}", cluster, name)
}

/// Layer classification from the deployment's repository path.
///
/// The layer is the third path segment after stripping a leading `./`; paths
/// with fewer segments fall back to the first non-empty segment, empty paths
/// to the literal `unknown`.
pub fn layer_of(path: &str) -> String {
    let path = path.strip_prefix("./").unwrap_or(path);
    let segments: Vec<&str> = path.split('/').filter(|segment| !segment.is_empty()).collect();
    if segments.len() >= 3 {
        return segments[2].to_string();
    }
    segments
        .first()
        .map(|segment| segment.to_string())
        .unwrap_or_else(|| String::from("unknown"))
}

/// Remove edges whose endpoints stay connected through an alternative path.
///
/// Edges are considered in deterministic order against the surviving edge
/// set, so a dependency can never be disconnected: an edge is only dropped
/// while another path between its endpoints remains. Cycles in the input
/// terminate cleanly; surplus back-edges may survive.
fn transitive_reduction(edges: &BTreeSet<(String, String)>) -> BTreeSet<(String, String)> {
    let mut kept = edges.clone();
    for edge in edges {
        if reachable_without(&kept, edge) {
            kept.remove(edge);
        }
    }
    kept
}

/// Depth-first reachability from `edge.0` to `edge.1` avoiding `edge` itself.
fn reachable_without(edges: &BTreeSet<(String, String)>, edge: &(String, String)) -> bool {
    let mut adjacency: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (source, target) in edges {
        if (source, target) == (&edge.0, &edge.1) {
            continue;
        }
        adjacency.entry(source.as_str()).or_default().push(target.as_str());
    }

    // Explicit stack with a visited set keeps cyclic inputs from recursing.
    let mut visited: HashSet<&str> = HashSet::new();
    let mut stack: Vec<&str> = vec![edge.0.as_str()];
    while let Some(node) = stack.pop() {
        let Some(next) = adjacency.get(node) else {
            continue;
        };
        for target in next {
            if *target == edge.1 {
                return true;
            }
            if visited.insert(target) {
                stack.push(target);
            }
        }
    }
    false
}

/// Infer provider to consumer edges between clusters from mesh service entries.
fn cross_cluster_edges(
    kustomizations: &[Kustomization],
    entries: &[ServiceEntry],
    clusters: &[String],
) -> Vec<(String, String)> {
    let mut edges = Vec::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();
    for entry in entries {
        if entry.location != MESH_EXTERNAL || entry.network.is_empty() {
            continue;
        }

        // The network label names the providing cluster.
        let base = strip_suffix_ignore_case(&entry.network, NETWORK_SUFFIX);
        let target_cluster = match clusters
            .iter()
            .find(|cluster| cluster.eq_ignore_ascii_case(base))
        {
            Some(cluster) => cluster,
            None => continue,
        };
        if target_cluster.eq_ignore_ascii_case(&entry.cluster) {
            continue;
        }

        // The entry name carries the remote service, prefixed by its cluster.
        let prefix = format!("{}-", target_cluster.to_lowercase());
        let service = entry.name.strip_prefix(&prefix).unwrap_or(&entry.name);

        let consumer = match pick_workload(kustomizations, &entry.cluster, service) {
            Some(workload) => workload,
            None => continue,
        };
        let provider = match pick_workload(kustomizations, target_cluster, service) {
            Some(workload) => workload,
            None => continue,
        };

        // Provider to consumer, de-duplicated by unordered endpoint pair.
        let source = node_id(target_cluster, &provider);
        let target = node_id(&entry.cluster, &consumer);
        let pair = if source < target {
            (source.clone(), target.clone())
        } else {
            (target.clone(), source.clone())
        };
        if seen.insert(pair) {
            edges.push((source, target));
        }
    }
    edges
}

/// Pick the workload in a cluster backing a service name.
///
/// Among workloads whose name contains the service name (case-insensitive)
/// the shortest name wins as the most specific match; ties break
/// lexicographically for determinism. Falls back to any workload containing
/// `platform`.
fn pick_workload(
    kustomizations: &[Kustomization],
    cluster: &str,
    service: &str,
) -> Option<String> {
    let service = service.to_lowercase();
    let in_cluster = kustomizations
        .iter()
        .filter(|kustomization| kustomization.cluster == cluster);

    let mut matches: Vec<&str> = in_cluster
        .clone()
        .filter(|kustomization| kustomization.name.to_lowercase().contains(&service))
        .map(|kustomization| kustomization.name.as_str())
        .collect();
    if matches.is_empty() {
        matches = in_cluster
            .filter(|kustomization| kustomization.name.to_lowercase().contains("platform"))
            .map(|kustomization| kustomization.name.as_str())
            .collect();
    }
    matches.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
    matches.first().map(|name| name.to_string())
}

fn strip_suffix_ignore_case<'a>(value: &'a str, suffix: &str) -> &'a str {
    if value.len() >= suffix.len() {
        let (head, tail) = value.split_at(value.len() - suffix.len());
        if tail.eq_ignore_ascii_case(suffix) {
            return head;
        }
    }
    value
}
