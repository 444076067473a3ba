//! Node table merging cluster state, Terraform sizing and version freshness.
use serde::Serialize;

use clustermap_fresh::os_outdated;
use clustermap_fresh::os_version;
use clustermap_fresh::NodesCache;
use clustermap_fresh::UNKNOWN;
use clustermap_models::DiagramArtifact;
use clustermap_models::DiagramKind;
use clustermap_models::InfraPayload;
use clustermap_models::Snapshot;
use clustermap_models::TerraformNode;

#[derive(Debug, Serialize)]
struct NodeRow {
    name: String,

    /// `node` for cluster members, `load-balancer` for east-west gateways.
    #[serde(rename = "type")]
    kind: &'static str,

    roles: String,
    os: String,
    os_latest: String,
    os_outdated: bool,
    kubelet: String,
    kubelet_latest: String,
    kubelet_outdated: bool,
    cpu: String,
    memory: String,

    /// Name of the Terraform source backing the node, empty when unmanaged.
    source: String,

    address: String,
}

/// Render the nodes table.
pub fn generate(snapshot: &Snapshot, cache: &NodesCache) -> DiagramArtifact {
    if snapshot.nodes.is_empty() && snapshot.east_west_gateways.is_empty() {
        return crate::placeholder("nodes", "Nodes", "No cluster nodes discovered yet.");
    }

    let mut rows: Vec<NodeRow> = snapshot
        .nodes
        .iter()
        .map(|node| {
            let terraform = terraform_node(snapshot, &node.name);
            let os_latest = cache.latest_os(&node.os_image);
            let deployed_os = os_version(&node.os_image).unwrap_or_default();
            let kubelet_latest = cache.latest_kubelet(&node.kubelet_version);
            NodeRow {
                name: node.name.clone(),
                kind: "node",
                roles: node.roles.join(","),
                os: node.os_image.clone(),
                os_outdated: os_outdated(&deployed_os, &os_latest),
                os_latest,
                kubelet: node.kubelet_version.clone(),
                kubelet_outdated: os_outdated(&node.kubelet_version, &kubelet_latest),
                kubelet_latest,
                cpu: terraform
                    .map(|(_, vm)| vm.cpus.to_string())
                    .unwrap_or_else(|| node.cpu.clone()),
                memory: terraform
                    .map(|(_, vm)| format!("{}Mi", vm.memory_mb))
                    .unwrap_or_else(|| node.memory.clone()),
                source: terraform.map(|(source, _)| source.to_string()).unwrap_or_default(),
                address: node.internal_ip.clone(),
            }
        })
        .collect();

    // East-west gateways show up as synthetic load balancer rows.
    for gateway in &snapshot.east_west_gateways {
        rows.push(NodeRow {
            name: gateway.name.clone(),
            kind: "load-balancer",
            roles: String::new(),
            os: String::new(),
            os_latest: UNKNOWN.into(),
            os_outdated: false,
            kubelet: String::new(),
            kubelet_latest: UNKNOWN.into(),
            kubelet_outdated: false,
            cpu: String::new(),
            memory: String::new(),
            source: String::new(),
            address: gateway.address.clone(),
        });
    }
    rows.sort_by(|a, b| (&a.kind, &a.name).cmp(&(&b.kind, &b.name)));

    let content = serde_json::to_string(&rows).expect("node rows must serialise");
    DiagramArtifact::new("nodes", "Nodes", DiagramKind::Table, content)
}

/// Find the Terraform VM matching a cluster node by exact name.
fn terraform_node<'a>(snapshot: &'a Snapshot, name: &str) -> Option<(&'a str, &'a TerraformNode)> {
    for source in &snapshot.infra_sources {
        let InfraPayload::Tfstate(state) = &source.payload else {
            continue;
        };
        if let Some(vm) = state.nodes.iter().find(|vm| vm.name == name) {
            return Some((source.name.as_str(), vm));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use clustermap_fresh::GithubClient;
    use clustermap_fresh::NodesCache;
    use clustermap_models::DiagramKind;
    use clustermap_models::EastWestGateway;
    use clustermap_models::InfraPayload;
    use clustermap_models::InfraSource;
    use clustermap_models::Node;
    use clustermap_models::NodeRole;
    use clustermap_models::Snapshot;
    use clustermap_models::TerraformNode;
    use clustermap_models::TerraformState;

    use super::generate;

    fn cache() -> NodesCache {
        NodesCache::new(GithubClient::new().unwrap())
    }

    #[test]
    fn terraform_merge_by_exact_name() {
        let mut snapshot = Snapshot::default();
        snapshot.nodes = vec![
            Node {
                name: "talos-cp-1".into(),
                roles: vec!["control-plane".into()],
                os_image: "Talos (v1.7.4)".into(),
                kubelet_version: "v1.30.1".into(),
                cpu: "4".into(),
                memory: "8124896Ki".into(),
                internal_ip: "10.0.0.10".into(),
                ..Node::default()
            },
            Node {
                name: "bare-metal-1".into(),
                cpu: "8".into(),
                memory: "32800000Ki".into(),
                ..Node::default()
            },
        ];
        snapshot.infra_sources = vec![InfraSource {
            name: "proxmox".into(),
            payload: InfraPayload::Tfstate(TerraformState {
                nodes: vec![TerraformNode {
                    name: "talos-cp-1".into(),
                    role: NodeRole::Controlplane,
                    cpus: 4,
                    memory_mb: 8192,
                }],
            }),
        }];

        let artifact = generate(&snapshot, &cache());
        assert_eq!(artifact.kind, DiagramKind::Table);
        let rows: serde_json::Value = serde_json::from_str(&artifact.content).unwrap();
        let rows = rows.as_array().unwrap();
        assert_eq!(rows.len(), 2);

        let unmanaged = &rows[0];
        assert_eq!(unmanaged["name"], "bare-metal-1");
        assert_eq!(unmanaged["source"], "");
        assert_eq!(unmanaged["cpu"], "8");

        let managed = &rows[1];
        assert_eq!(managed["name"], "talos-cp-1");
        assert_eq!(managed["source"], "proxmox");
        assert_eq!(managed["memory"], "8192Mi");
        assert_eq!(managed["os_latest"], "-");
        assert_eq!(managed["os_outdated"], false);
    }

    #[test]
    fn east_west_gateways_append_load_balancer_rows() {
        let mut snapshot = Snapshot::default();
        snapshot.east_west_gateways = vec![EastWestGateway {
            cluster: "Homelab".into(),
            namespace: "istio-ingress".into(),
            name: "eastwest".into(),
            address: "10.0.0.200".into(),
            network: "homelab-network".into(),
        }];

        let artifact = generate(&snapshot, &cache());
        let rows: serde_json::Value = serde_json::from_str(&artifact.content).unwrap();
        assert_eq!(rows[0]["type"], "load-balancer");
        assert_eq!(rows[0]["name"], "eastwest");
        assert_eq!(rows[0]["address"], "10.0.0.200");
    }

    #[test]
    fn empty_nodes_render_placeholder() {
        let artifact = generate(&Snapshot::default(), &cache());
        assert_eq!(artifact.kind, DiagramKind::Markdown);
    }
}
