//! Parse Terraform state (v4 JSON) into VM records.
use anyhow::Result;
use serde_json::Value as Json;

use clustermap_models::NodeRole;
use clustermap_models::TerraformNode;
use clustermap_models::TerraformState;

/// Parse a Terraform state document into the VM records the diagrams use.
///
/// Two managed resource flavors are recognised, with different attribute
/// shapes: `proxmox_vm_qemu` (flat `name`/`cores`/`memory` attributes) and
/// `proxmox_virtual_environment_vm` (nested `cpu`/`memory` blocks). Other
/// resource types are ignored.
pub fn parse_tfstate(raw: &str) -> Result<TerraformState> {
    let document: Json = serde_json::from_str(raw)?;
    let mut nodes = Vec::new();

    let resources = document
        .get("resources")
        .and_then(Json::as_array)
        .map(|resources| resources.as_slice())
        .unwrap_or_default();
    for resource in resources {
        if resource.get("mode").and_then(Json::as_str) != Some("managed") {
            continue;
        }
        let resource_type = resource.get("type").and_then(Json::as_str).unwrap_or("");
        let resource_name = resource.get("name").and_then(Json::as_str).unwrap_or("");
        let instances = resource
            .get("instances")
            .and_then(Json::as_array)
            .map(|instances| instances.as_slice())
            .unwrap_or_default();
        for instance in instances {
            let attributes = match instance.get("attributes") {
                Some(attributes) => attributes,
                None => continue,
            };
            let node = match resource_type {
                "proxmox_vm_qemu" => qemu_node(resource_name, attributes),
                "proxmox_virtual_environment_vm" => bpg_node(resource_name, attributes),
                _ => None,
            };
            if let Some(node) = node {
                nodes.push(node);
            }
        }
    }

    nodes.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(TerraformState { nodes })
}

/// Extract a VM from the flat `proxmox_vm_qemu` attribute shape.
fn qemu_node(resource_name: &str, attributes: &Json) -> Option<TerraformNode> {
    let name = attributes.get("name").and_then(Json::as_str)?;
    let cpus = attributes.get("cores").and_then(Json::as_i64).unwrap_or(0);
    let memory_mb = attributes.get("memory").and_then(Json::as_i64).unwrap_or(0);
    Some(TerraformNode {
        name: name.to_string(),
        role: NodeRole::infer(resource_name, name),
        cpus,
        memory_mb,
    })
}

/// Extract a VM from the nested `proxmox_virtual_environment_vm` attribute shape.
fn bpg_node(resource_name: &str, attributes: &Json) -> Option<TerraformNode> {
    let name = attributes.get("name").and_then(Json::as_str)?;
    let cpus = attributes
        .get("cpu")
        .and_then(Json::as_array)
        .and_then(|blocks| blocks.first())
        .and_then(|block| block.get("cores"))
        .and_then(Json::as_i64)
        .unwrap_or(0);
    let memory_mb = attributes
        .get("memory")
        .and_then(Json::as_array)
        .and_then(|blocks| blocks.first())
        .and_then(|block| block.get("dedicated"))
        .and_then(Json::as_i64)
        .unwrap_or(0);
    Some(TerraformNode {
        name: name.to_string(),
        role: NodeRole::infer(resource_name, name),
        cpus,
        memory_mb,
    })
}
