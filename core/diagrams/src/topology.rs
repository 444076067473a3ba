//! Infrastructure topology diagrams (Mermaid).
//!
//! One diagram per Terraform source covering its VMs, an "Other Nodes"
//! diagram for cluster nodes no source accounts for, and a "Mesh" diagram
//! connecting east-west gateways to cross-cluster service entries grouped by
//! network.
use std::collections::BTreeMap;
use std::collections::HashSet;

use clustermap_models::DiagramArtifact;
use clustermap_models::DiagramKind;
use clustermap_models::InfraPayload;
use clustermap_models::NodeRole;
use clustermap_models::Snapshot;
use clustermap_models::TerraformState;

use crate::mermaid;

/// Render all topology diagrams for a snapshot.
pub fn generate(snapshot: &Snapshot) -> Vec<DiagramArtifact> {
    let mut artifacts = Vec::new();
    let mut covered: HashSet<&str> = HashSet::new();

    for source in &snapshot.infra_sources {
        let InfraPayload::Tfstate(state) = &source.payload else {
            continue;
        };
        for vm in &state.nodes {
            covered.insert(vm.name.as_str());
        }
        artifacts.push(source_diagram(&source.name, state));
    }

    let mut others: Vec<&str> = snapshot
        .nodes
        .iter()
        .map(|node| node.name.as_str())
        .filter(|name| !covered.contains(name))
        .collect();
    others.sort_unstable();
    if !others.is_empty() && !artifacts.is_empty() {
        artifacts.push(other_nodes_diagram(&others));
    }

    if artifacts.is_empty() && others.is_empty() {
        artifacts.push(crate::placeholder(
            "topology",
            "Topology",
            "No infrastructure topology discovered yet.",
        ));
    } else if artifacts.is_empty() {
        // No Terraform sources at all: the cluster nodes are the topology.
        artifacts.push(other_nodes_diagram(&others));
    }

    if let Some(mesh) = mesh_diagram(snapshot) {
        artifacts.push(mesh);
    }
    artifacts
}

/// Mermaid diagram of the VMs managed by one Terraform source.
fn source_diagram(name: &str, state: &TerraformState) -> DiagramArtifact {
    let mut lines = vec![String::from("graph TB")];
    let mut nodes = state.nodes.clone();
    nodes.sort_by(|a, b| a.name.cmp(&b.name));

    for (role, title) in [
        (NodeRole::Controlplane, "Control Plane"),
        (NodeRole::Worker, "Workers"),
    ] {
        let members: Vec<_> = nodes.iter().filter(|vm| vm.role == role).collect();
        if members.is_empty() {
            continue;
        }
        lines.push(format!("  subgraph {}_{} [{}]", mermaid::ident(name), mermaid::ident(title), title));
        for vm in members {
            lines.push(format!(
                "    {}[{}<br/>{} CPU / {} MiB]",
                mermaid::ident(&vm.name),
                vm.name,
                vm.cpus,
                vm.memory_mb,
            ));
        }
        lines.push(String::from("  end"));
    }

    DiagramArtifact::new(
        format!("topology-{}", name),
        format!("Topology: {}", name),
        DiagramKind::Mermaid,
        lines.join("\n"),
    )
}

/// Mermaid diagram of cluster nodes not covered by any Terraform source.
fn other_nodes_diagram(names: &[&str]) -> DiagramArtifact {
    let mut lines = vec![String::from("graph TB")];
    for name in names {
        lines.push(format!("  {}[{}]", mermaid::ident(name), name));
    }
    DiagramArtifact::new(
        "topology-other",
        "Other Nodes",
        DiagramKind::Mermaid,
        lines.join("\n"),
    )
}

/// Mermaid diagram of east-west gateways and the remote networks they reach.
fn mesh_diagram(snapshot: &Snapshot) -> Option<DiagramArtifact> {
    let mut entries_by_network: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for entry in &snapshot.service_entries {
        if entry.location != "MESH_EXTERNAL" || entry.network.is_empty() {
            continue;
        }
        entries_by_network
            .entry(entry.network.as_str())
            .or_default()
            .push(entry.name.as_str());
    }
    if snapshot.east_west_gateways.is_empty() && entries_by_network.is_empty() {
        return None;
    }

    let mut lines = vec![String::from("flowchart LR")];
    for gateway in &snapshot.east_west_gateways {
        lines.push(format!(
            "  {}[{}<br/>{}]",
            mermaid::ident(&gateway.name),
            gateway.name,
            gateway.address,
        ));
    }
    for (network, entries) in &entries_by_network {
        lines.push(format!("  subgraph {} [{}]", mermaid::ident(network), network));
        let mut entries = entries.clone();
        entries.sort_unstable();
        entries.dedup();
        for entry in entries {
            lines.push(format!("    {}[{}]", mermaid::ident(entry), entry));
        }
        lines.push(String::from("  end"));
    }
    for gateway in &snapshot.east_west_gateways {
        for (_, entries) in &entries_by_network {
            let mut entries = entries.clone();
            entries.sort_unstable();
            entries.dedup();
            for entry in entries {
                lines.push(format!(
                    "  {} --> {}",
                    mermaid::ident(&gateway.name),
                    mermaid::ident(entry),
                ));
            }
        }
    }

    Some(DiagramArtifact::new(
        "topology-mesh",
        "Mesh",
        DiagramKind::Mermaid,
        lines.join("\n"),
    ))
}
